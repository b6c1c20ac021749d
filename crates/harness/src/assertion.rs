//! Declarative expectations evaluated against an open page

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::config::{HarnessConfig, TextMatchMode};
use crate::error::{HarnessError, HarnessResult};
use crate::scenario::{Expectation, TextMatcher};
use crate::session::PageDriver;
use crate::style;

/// Why an expectation did not hold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailReason {
    ElementNotFound { selector: String },
    ElementNotVisible { selector: String, matched: usize },
    StyleMismatch { actual: String, expected: String },
    TextNotFound { text: String },
    InvalidSelector { selector: String, message: String },
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailReason::ElementNotFound { selector } => {
                write!(f, "no element matches {}", selector)
            }
            FailReason::ElementNotVisible { selector, matched } => {
                write!(f, "{} element(s) match {} but none is visible", matched, selector)
            }
            FailReason::StyleMismatch { actual, expected } => {
                write!(f, "expected {:?}, got {:?}", expected, actual)
            }
            FailReason::TextNotFound { text } => write!(f, "text {:?} not rendered", text),
            FailReason::InvalidSelector { selector, message } => {
                write!(f, "invalid selector {}: {}", selector, message)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail(FailReason),
}

impl Outcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Pass)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectationResult {
    pub expectation: Expectation,
    pub outcome: Outcome,
}

/// Evaluates expectations with a bounded wait per expectation
#[derive(Debug, Clone)]
pub struct AssertionEngine {
    timeout: Duration,
    poll_interval: Duration,
    default_text_mode: TextMatchMode,
}

impl AssertionEngine {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            timeout: config.expectation_timeout(),
            poll_interval: config.poll_interval(),
            default_text_mode: config.text_match,
        }
    }

    /// Evaluate every expectation in declared order.
    ///
    /// Unmet expectations come back as [`Outcome::Fail`]; only faults of the
    /// page itself are returned as errors.
    pub async fn evaluate(
        &self,
        page: &mut dyn PageDriver,
        expectations: &[Expectation],
    ) -> HarnessResult<Vec<ExpectationResult>> {
        let mut results = Vec::with_capacity(expectations.len());
        for expectation in expectations {
            let outcome = self.evaluate_one(page, expectation).await?;
            results.push(ExpectationResult {
                expectation: expectation.clone(),
                outcome,
            });
        }
        Ok(results)
    }

    /// Poll one expectation until it passes or the wait runs out
    pub async fn evaluate_one(
        &self,
        page: &mut dyn PageDriver,
        expectation: &Expectation,
    ) -> HarnessResult<Outcome> {
        let deadline = Instant::now() + self.timeout;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let outcome = match self.check(page, expectation).await {
                Ok(outcome) => outcome,
                Err(HarnessError::InvalidSelector { selector, reason }) => {
                    return Ok(Outcome::Fail(FailReason::InvalidSelector {
                        selector,
                        message: reason,
                    }));
                }
                Err(e) => return Err(e),
            };

            let now = Instant::now();
            if outcome.is_pass() || now >= deadline {
                debug!("{} -> {:?} after {} attempt(s)", expectation, outcome, attempts);
                return Ok(outcome);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn check(
        &self,
        page: &mut dyn PageDriver,
        expectation: &Expectation,
    ) -> HarnessResult<Outcome> {
        match expectation {
            Expectation::Visible { selector } => {
                let probe = page.probe(selector).await?;
                Ok(if probe.visible > 0 {
                    Outcome::Pass
                } else if probe.matched == 0 {
                    Outcome::Fail(FailReason::ElementNotFound {
                        selector: selector.clone(),
                    })
                } else {
                    Outcome::Fail(FailReason::ElementNotVisible {
                        selector: selector.clone(),
                        matched: probe.matched,
                    })
                })
            }
            Expectation::Style {
                selector,
                property,
                value,
            } => Ok(match page.computed_style(selector, property).await? {
                None => Outcome::Fail(FailReason::ElementNotFound {
                    selector: selector.clone(),
                }),
                Some(actual) if style::values_match(&actual, value) => Outcome::Pass,
                Some(actual) => Outcome::Fail(FailReason::StyleMismatch {
                    actual,
                    expected: value.clone(),
                }),
            }),
            Expectation::Text(matcher) => {
                let exact = self.text_mode(matcher) == TextMatchMode::Exact;
                let found = page
                    .text_present(&matcher.text, exact, matcher.case_sensitive)
                    .await?;
                Ok(if found {
                    Outcome::Pass
                } else {
                    Outcome::Fail(FailReason::TextNotFound {
                        text: matcher.text.clone(),
                    })
                })
            }
        }
    }

    fn text_mode(&self, matcher: &TextMatcher) -> TextMatchMode {
        matcher.mode.unwrap_or(self.default_text_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrowserConfig;
    use crate::session::BrowserLauncher;
    use crate::testing::{FakeDocument, FakeElement, FakeLauncher};

    fn engine() -> AssertionEngine {
        AssertionEngine::new(&HarnessConfig {
            expectation_timeout_ms: 60,
            poll_interval_ms: 5,
            ..Default::default()
        })
    }

    async fn page_for(document: FakeDocument) -> Box<dyn PageDriver> {
        let launcher = FakeLauncher::new().with_document("a.html", document);
        let mut page = launcher.launch(&BrowserConfig::default()).await.unwrap();
        page.navigate("file:///mocks/a.html", Duration::from_secs(1))
            .await
            .unwrap();
        page
    }

    #[tokio::test]
    async fn test_visible_and_style_mismatch_preserve_order() {
        let mut page = page_for(
            FakeDocument::new()
                .element(FakeElement::new(".container"))
                .element(FakeElement::new(".bar").style("color", "rgb(0, 0, 255)")),
        )
        .await;

        let results = engine()
            .evaluate(
                page.as_mut(),
                &[
                    Expectation::visible(".container"),
                    Expectation::style(".bar", "color", "rgb(0,0,128)"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].outcome, Outcome::Pass);
        assert_eq!(
            results[1].outcome,
            Outcome::Fail(FailReason::StyleMismatch {
                actual: "rgb(0, 0, 255)".into(),
                expected: "rgb(0,0,128)".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_missing_element_is_a_fail_not_an_error() {
        let mut page = page_for(FakeDocument::new()).await;

        let visible = engine()
            .evaluate_one(page.as_mut(), &Expectation::visible(".nope"))
            .await
            .unwrap();
        assert_eq!(
            visible,
            Outcome::Fail(FailReason::ElementNotFound {
                selector: ".nope".into()
            })
        );

        let style = engine()
            .evaluate_one(page.as_mut(), &Expectation::style(".nope", "color", "red"))
            .await
            .unwrap();
        assert!(matches!(style, Outcome::Fail(FailReason::ElementNotFound { .. })));
    }

    #[tokio::test]
    async fn test_hidden_element_is_not_visible() {
        let mut page =
            page_for(FakeDocument::new().element(FakeElement::new(".modal").hidden())).await;

        let outcome = engine()
            .evaluate_one(page.as_mut(), &Expectation::visible(".modal"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Fail(FailReason::ElementNotVisible {
                selector: ".modal".into(),
                matched: 1
            })
        );
    }

    #[tokio::test]
    async fn test_polls_until_element_appears() {
        let mut page =
            page_for(FakeDocument::new().element(FakeElement::new(".late").appears_after(3))).await;

        let outcome = engine()
            .evaluate_one(page.as_mut(), &Expectation::visible(".late"))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Pass);
    }

    #[tokio::test]
    async fn test_zero_timeout_checks_once() {
        let engine = AssertionEngine::new(&HarnessConfig {
            expectation_timeout_ms: 0,
            ..Default::default()
        });
        let mut page =
            page_for(FakeDocument::new().element(FakeElement::new(".late").appears_after(3))).await;

        let outcome = engine
            .evaluate_one(page.as_mut(), &Expectation::visible(".late"))
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Fail(FailReason::ElementNotFound { .. })));
    }

    #[tokio::test]
    async fn test_style_compares_normalized_colors() {
        let mut page = page_for(
            FakeDocument::new().element(
                FakeElement::new(".title-bar")
                    .style("color", "rgb(0, 0, 128)")
                    .style(
                        "background-image",
                        "linear-gradient(90deg, rgb(0, 0, 128) 0%, rgb(16, 132, 208) 100%)",
                    ),
            ),
        )
        .await;

        let results = engine()
            .evaluate(
                page.as_mut(),
                &[
                    Expectation::style(".title-bar", "color", "#000080"),
                    Expectation::style(".title-bar", "color", "navy"),
                    Expectation::style(
                        ".title-bar",
                        "background-image",
                        "linear-gradient(90deg, #000080 0%, #1084d0 100%)",
                    ),
                ],
            )
            .await
            .unwrap();

        assert!(results.iter().all(|r| r.outcome.is_pass()));
    }

    #[tokio::test]
    async fn test_text_modes() {
        let mut page = page_for(
            FakeDocument::new().element(FakeElement::new(".boot").text("LOAD KNOWLEDGE")),
        )
        .await;
        let engine = engine();

        let substring = engine
            .evaluate_one(page.as_mut(), &Expectation::text("KNOWLEDGE"))
            .await
            .unwrap();
        assert_eq!(substring, Outcome::Pass);

        let exact = engine
            .evaluate_one(
                page.as_mut(),
                &Expectation::Text(TextMatcher::new("KNOWLEDGE").exact()),
            )
            .await
            .unwrap();
        assert_eq!(
            exact,
            Outcome::Fail(FailReason::TextNotFound {
                text: "KNOWLEDGE".into()
            })
        );

        let mut folded = TextMatcher::new("load knowledge");
        folded.case_sensitive = false;
        let folded = engine
            .evaluate_one(page.as_mut(), &Expectation::Text(folded))
            .await
            .unwrap();
        assert_eq!(folded, Outcome::Pass);
    }

    #[tokio::test]
    async fn test_hidden_text_is_not_present() {
        let mut page = page_for(
            FakeDocument::new().element(FakeElement::new(".panel").text("secret").hidden()),
        )
        .await;

        let outcome = engine()
            .evaluate_one(page.as_mut(), &Expectation::text("secret"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Fail(FailReason::TextNotFound {
                text: "secret".into()
            })
        );
    }

    #[tokio::test]
    async fn test_invalid_selector_fails_immediately() {
        let mut page = page_for(FakeDocument::new()).await;

        let outcome = engine()
            .evaluate_one(page.as_mut(), &Expectation::visible("div[broken"))
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Fail(FailReason::InvalidSelector { .. })));
    }

    #[tokio::test]
    async fn test_repeated_evaluation_is_deterministic() {
        let document = FakeDocument::new()
            .element(FakeElement::new(".container"))
            .element(FakeElement::new(".bar").style("color", "red"));
        let expectations = [
            Expectation::visible(".container"),
            Expectation::style(".bar", "color", "navy"),
            Expectation::visible(".missing"),
        ];

        let mut first_page = page_for(document.clone()).await;
        let first = engine()
            .evaluate(first_page.as_mut(), &expectations)
            .await
            .unwrap();
        let mut second_page = page_for(document).await;
        let second = engine()
            .evaluate(second_page.as_mut(), &expectations)
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_fail_reason_display() {
        let reason = FailReason::StyleMismatch {
            actual: "rgb(0, 0, 255)".into(),
            expected: "navy".into(),
        };
        assert_eq!(reason.to_string(), "expected \"navy\", got \"rgb(0, 0, 255)\"");
    }
}
