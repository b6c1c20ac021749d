//! Scenario runner that sequences fixture resolution, the browser session,
//! assertions, staging and capture

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::assertion::{AssertionEngine, ExpectationResult, Outcome};
use crate::capture::ArtifactCapture;
use crate::config::{BrowserConfig, HarnessConfig, SessionMode, Viewport};
use crate::error::{HarnessError, HarnessResult};
use crate::fixture::{FixtureLocator, LoadableUri};
use crate::report::{ArtifactOutcome, ArtifactReport, RunSummary, ScenarioReport};
use crate::scenario::{ArtifactSpec, Scenario};
use crate::session::playwright::PlaywrightLauncher;
use crate::session::{BrowserLauncher, PageDriver, SessionHandle, SessionManager};

/// Runs scenarios one after another against real or scripted browsers
pub struct ScenarioRunner {
    config: HarnessConfig,
    locator: FixtureLocator,
    sessions: SessionManager,
    engine: AssertionEngine,
    capture: ArtifactCapture,
}

impl ScenarioRunner {
    /// Create a runner driving Playwright
    pub fn new(config: HarnessConfig) -> HarnessResult<Self> {
        Self::with_launcher(config, Arc::new(PlaywrightLauncher::new()))
    }

    /// Create a runner with a custom browser launcher
    pub fn with_launcher(
        config: HarnessConfig,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> HarnessResult<Self> {
        config.validate()?;
        Ok(Self {
            locator: FixtureLocator::new(&config.base_dir)?,
            sessions: SessionManager::new(launcher),
            engine: AssertionEngine::new(&config),
            capture: ArtifactCapture::new(&config.output_dir)
                .with_element_timeout(config.expectation_timeout()),
            config,
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run every scenario in order. Faults are recorded per scenario and
    /// never stop the run.
    pub async fn run(&self, scenarios: &[Scenario]) -> RunSummary {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut reports = Vec::with_capacity(scenarios.len());
        let mut shared: Option<SessionHandle> = None;

        info!("Running {} scenario(s)...", scenarios.len());

        for scenario in scenarios {
            let report = self.run_scenario(scenario, &mut shared).await;
            if report.passed() {
                info!("✓ {} ({} ms)", report.name, report.duration_ms);
            } else {
                error!(
                    "✗ {} - {}{}",
                    report.name,
                    report.status,
                    report
                        .error
                        .as_ref()
                        .map(|f| format!(": {}", f.message))
                        .unwrap_or_default()
                );
            }
            reports.push(report);
        }

        if let Some(mut session) = shared.take() {
            release(&mut session).await;
        }

        let summary = RunSummary {
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            scenarios: reports,
        };

        info!(
            "Results: {} passed, {} failed ({} ms)",
            summary.passed(),
            summary.failed(),
            summary.duration_ms
        );
        summary
    }

    /// Run one scenario with its own lifecycle. `shared` carries the reused
    /// session in shared mode and is left empty after any fault.
    async fn run_scenario(
        &self,
        scenario: &Scenario,
        shared: &mut Option<SessionHandle>,
    ) -> ScenarioReport {
        let start = Instant::now();
        let mut report = ScenarioReport::new(&scenario.name);
        debug!("Running scenario: {}", scenario.name);

        let uri = match self.locator.resolve(&scenario.fixture) {
            Ok(uri) => uri,
            Err(e) => {
                report.fault(&e);
                report.finish(start.elapsed().as_millis() as u64);
                return report;
            }
        };
        report.fixture_uri = Some(uri.uri.clone());

        let mut session = match shared.take() {
            Some(session) => session,
            None => match self.sessions.acquire(&self.browser_config(scenario)).await {
                Ok(session) => session,
                Err(e) => {
                    report.fault(&e);
                    report.finish(start.elapsed().as_millis() as u64);
                    return report;
                }
            },
        };

        let deadline = scenario
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.config.scenario_timeout());

        let outcome =
            tokio::time::timeout(deadline, self.execute(scenario, &uri, &mut session, &mut report))
                .await;

        let healthy = match outcome {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                report.fault(&e);
                false
            }
            Err(_) => {
                report.fault(&HarnessError::Timeout {
                    what: format!("scenario {}", scenario.name),
                    timeout_ms: deadline.as_millis() as u64,
                });
                false
            }
        };

        if healthy && self.config.session_mode == SessionMode::Shared {
            *shared = Some(session);
        } else {
            release(&mut session).await;
        }

        report.finish(start.elapsed().as_millis() as u64);
        report
    }

    async fn execute(
        &self,
        scenario: &Scenario,
        uri: &LoadableUri,
        session: &mut SessionHandle,
        report: &mut ScenarioReport,
    ) -> HarnessResult<()> {
        let page = session.page()?;

        if self.config.session_mode == SessionMode::Shared {
            let viewport = scenario
                .viewport
                .or(self.config.browser.viewport)
                .unwrap_or(Viewport::BROWSER_DEFAULT);
            page.set_viewport(viewport).await?;
        }

        page.navigate(uri.as_str(), self.config.navigation_timeout())
            .await?;

        if let Some(selector) = &scenario.wait_for {
            page.wait_for_selector(selector, self.config.navigation_timeout())
                .await
                .map_err(|e| match e {
                    HarnessError::Timeout { .. } | HarnessError::InvalidSelector { .. } => {
                        HarnessError::Navigation {
                            uri: uri.uri.clone(),
                            reason: format!("waiting for {}: {}", selector, e),
                        }
                    }
                    other => other,
                })?;
        }

        for expectation in &scenario.expectations {
            let outcome = self.engine.evaluate_one(page, expectation).await?;
            match &outcome {
                Outcome::Pass => debug!("  ✓ {}", expectation),
                Outcome::Fail(reason) => info!("  ✗ {}: {}", expectation, reason),
            }
            report.expectations.push(ExpectationResult {
                expectation: expectation.clone(),
                outcome,
            });
        }

        for (index, step) in scenario.stage.iter().enumerate() {
            if let Err(e) = page.stage(step).await {
                for artifact in &scenario.artifacts {
                    report.artifacts.push(ArtifactReport {
                        spec: artifact.clone(),
                        outcome: ArtifactOutcome::Skipped {
                            reason: format!("stage step {} failed", index),
                        },
                    });
                }
                return Err(HarnessError::Stage {
                    index,
                    step: step.to_string(),
                    reason: e.to_string(),
                });
            }
        }

        for artifact in &scenario.artifacts {
            let outcome = self.capture_artifact(page, artifact).await?;
            report.artifacts.push(ArtifactReport {
                spec: artifact.clone(),
                outcome,
            });
        }

        Ok(())
    }

    async fn capture_artifact(
        &self,
        page: &mut dyn PageDriver,
        artifact: &ArtifactSpec,
    ) -> HarnessResult<ArtifactOutcome> {
        if let Some(selector) = &artifact.when_visible {
            match page.probe(selector).await {
                Ok(probe) if probe.visible == 0 => {
                    debug!("Skipping {}: {} not visible", artifact.output_path.display(), selector);
                    return Ok(ArtifactOutcome::Skipped {
                        reason: format!("{} not visible", selector),
                    });
                }
                Ok(_) => {}
                Err(e @ HarnessError::InvalidSelector { .. }) => {
                    return Ok(ArtifactOutcome::Failed {
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(match self.capture.capture(page, artifact).await {
            Ok(result) => ArtifactOutcome::Captured(result),
            Err(e) => {
                warn!("{}", e);
                ArtifactOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        })
    }

    fn browser_config(&self, scenario: &Scenario) -> BrowserConfig {
        let mut config = self.config.browser.clone();
        if self.config.session_mode == SessionMode::Fresh {
            if let Some(viewport) = scenario.viewport {
                config.viewport = Some(viewport);
            }
        }
        config
    }
}

async fn release(session: &mut SessionHandle) {
    if let Err(e) = session.release().await {
        warn!("Failed to release session {}: {}", session.id(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::FailReason;
    use crate::report::{FaultKind, ScenarioStatus};
    use crate::scenario::{Expectation, StageStep};
    use crate::testing::{FakeDocument, FakeElement, FakeLauncher};
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        launcher: Arc<FakeLauncher>,
    }

    impl Fixture {
        fn new(launcher: FakeLauncher) -> Self {
            let temp = TempDir::new().unwrap();
            std::fs::create_dir_all(temp.path().join("mocks")).unwrap();
            for name in ["a.html", "b.html", "slow.html", "unknown.html"] {
                std::fs::write(temp.path().join("mocks").join(name), "<html></html>").unwrap();
            }
            Self {
                temp,
                launcher: Arc::new(launcher),
            }
        }

        fn config(&self) -> HarnessConfig {
            HarnessConfig {
                base_dir: self.temp.path().to_path_buf(),
                output_dir: self.temp.path().join("out"),
                expectation_timeout_ms: 30,
                poll_interval_ms: 5,
                ..Default::default()
            }
        }

        fn runner(&self, config: HarnessConfig) -> ScenarioRunner {
            ScenarioRunner::with_launcher(config, self.launcher.clone()).unwrap()
        }
    }

    fn mock_a() -> FakeDocument {
        FakeDocument::new()
            .element(FakeElement::new(".container"))
            .element(FakeElement::new(".bar").style("color", "rgb(0, 0, 255)"))
    }

    fn passing(name: &str) -> Scenario {
        Scenario::new(name, "mocks/b.html").expect(Expectation::visible(".window"))
    }

    fn launcher() -> FakeLauncher {
        FakeLauncher::new()
            .with_document("mocks/a.html", mock_a())
            .with_document(
                "mocks/b.html",
                FakeDocument::new().element(FakeElement::new(".window")),
            )
            .with_document("mocks/slow.html", FakeDocument::new().hangs())
    }

    #[tokio::test]
    async fn test_style_mismatch_fails_the_run() {
        let fixture = Fixture::new(launcher());
        let runner = fixture.runner(fixture.config());
        let scenario = Scenario::new("mock-a", "mocks/a.html")
            .expect(Expectation::visible(".container"))
            .expect(Expectation::style(".bar", "color", "rgb(0,0,128)"));

        let summary = runner.run(&[scenario]).await;

        assert_eq!(summary.scenarios.len(), 1);
        let report = &summary.scenarios[0];
        assert_eq!(report.status, ScenarioStatus::AssertionFailed);
        assert_eq!(report.expectations[0].outcome, Outcome::Pass);
        assert!(matches!(
            report.expectations[1].outcome,
            Outcome::Fail(FailReason::StyleMismatch { .. })
        ));
        assert!(report.fixture_uri.as_deref().unwrap().ends_with("mocks/a.html"));
        assert!(!summary.success());
    }

    #[tokio::test]
    async fn test_launch_failure_does_not_stop_later_scenarios() {
        let fixture = Fixture::new(launcher().failing_launches(1));
        let runner = fixture.runner(fixture.config());

        let summary = runner.run(&[passing("first"), passing("second")]).await;

        assert_eq!(summary.scenarios[0].status, ScenarioStatus::InfrastructureFailed);
        assert_eq!(
            summary.scenarios[0].error.as_ref().unwrap().kind,
            FaultKind::SessionLaunch
        );
        assert_eq!(summary.scenarios[1].status, ScenarioStatus::Passed);
    }

    #[tokio::test]
    async fn test_missing_fixture_never_launches_a_browser() {
        let fixture = Fixture::new(launcher());
        let runner = fixture.runner(fixture.config());

        let summary = runner
            .run(&[Scenario::new("gone", "mocks/gone.html").expect(Expectation::visible("body"))])
            .await;

        let report = &summary.scenarios[0];
        assert_eq!(report.status, ScenarioStatus::InfrastructureFailed);
        assert_eq!(report.error.as_ref().unwrap().kind, FaultKind::Fixture);
        assert_eq!(fixture.launcher.launches(), 0);
    }

    #[tokio::test]
    async fn test_navigation_failure_releases_session() {
        let fixture = Fixture::new(launcher());
        let runner = fixture.runner(fixture.config());

        let summary = runner
            .run(&[Scenario::new("nav", "mocks/unknown.html").expect(Expectation::visible("body"))])
            .await;

        let report = &summary.scenarios[0];
        assert_eq!(report.error.as_ref().unwrap().kind, FaultKind::Navigation);
        assert!(report.expectations.is_empty());
        assert_eq!(fixture.launcher.closed(), 1);
    }

    #[tokio::test]
    async fn test_deadline_expiry_times_out_and_run_continues() {
        let fixture = Fixture::new(launcher());
        let runner = fixture.runner(fixture.config());
        let mut slow = Scenario::new("slow", "mocks/slow.html").expect(Expectation::visible("body"));
        slow.timeout_ms = Some(50);

        let summary = runner.run(&[slow, passing("after")]).await;

        assert_eq!(summary.scenarios[0].status, ScenarioStatus::TimedOut);
        assert_eq!(summary.scenarios[1].status, ScenarioStatus::Passed);
        assert_eq!(fixture.launcher.launches(), 2);
        assert_eq!(fixture.launcher.closed(), 2);
    }

    #[tokio::test]
    async fn test_every_session_is_released() {
        let fixture = Fixture::new(launcher());
        let runner = fixture.runner(fixture.config());
        let scenarios = vec![
            passing("one"),
            Scenario::new("two", "mocks/a.html").expect(Expectation::visible(".missing")),
            Scenario::new("three", "mocks/unknown.html").expect(Expectation::visible("body")),
        ];

        runner.run(&scenarios).await;

        assert_eq!(fixture.launcher.launches(), 3);
        assert_eq!(fixture.launcher.closed(), 3);
    }

    #[tokio::test]
    async fn test_repeated_runs_produce_identical_results() {
        let fixture = Fixture::new(launcher());
        let runner = fixture.runner(fixture.config());
        let scenario = Scenario::new("mock-a", "mocks/a.html")
            .expect(Expectation::visible(".container"))
            .expect(Expectation::style(".bar", "color", "navy"))
            .expect(Expectation::visible(".absent"));

        let first = runner.run(std::slice::from_ref(&scenario)).await;
        let second = runner.run(std::slice::from_ref(&scenario)).await;

        assert_eq!(
            first.scenarios[0].expectations,
            second.scenarios[0].expectations
        );
    }

    #[tokio::test]
    async fn test_stage_then_capture() {
        let fixture = Fixture::new(launcher());
        let runner = fixture.runner(fixture.config());
        let scenario = Scenario::new("staged", "mocks/b.html")
            .expect(Expectation::visible(".window"))
            .stage(StageStep::AddClass {
                selector: ".window".into(),
                class: "active".into(),
            })
            .capture(ArtifactSpec::new("b/window.png"));

        let summary = runner.run(&[scenario]).await;

        let report = &summary.scenarios[0];
        assert_eq!(report.status, ScenarioStatus::Passed);
        assert_eq!(fixture.launcher.staged().len(), 1);
        match &report.artifacts[0].outcome {
            ArtifactOutcome::Captured(result) => {
                assert_eq!(result.path, fixture.temp.path().join("out/b/window.png"));
                assert!(result.path.is_file());
            }
            other => panic!("expected capture, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_stage_skips_captures() {
        let fixture = Fixture::new(launcher());
        let runner = fixture.runner(fixture.config());
        let scenario = Scenario::new("bad-stage", "mocks/b.html")
            .stage(StageStep::Remove {
                selector: ".not-there".into(),
            })
            .capture(ArtifactSpec::new("b.png"));

        let summary = runner.run(&[scenario]).await;

        let report = &summary.scenarios[0];
        assert_eq!(report.status, ScenarioStatus::InfrastructureFailed);
        assert_eq!(report.error.as_ref().unwrap().kind, FaultKind::Stage);
        assert!(matches!(
            report.artifacts[0].outcome,
            ArtifactOutcome::Skipped { .. }
        ));
        assert!(!fixture.temp.path().join("out/b.png").exists());
    }

    #[tokio::test]
    async fn test_capture_failure_is_recorded_per_artifact() {
        let fixture = Fixture::new(
            FakeLauncher::new().with_document("mocks/a.html", mock_a().broken_screenshots()),
        );
        let runner = fixture.runner(fixture.config());
        let scenario = Scenario::new("broken", "mocks/a.html")
            .expect(Expectation::visible(".container"))
            .capture(ArtifactSpec::new("one.png"))
            .capture(ArtifactSpec::new("two.png"));

        let summary = runner.run(&[scenario]).await;

        let report = &summary.scenarios[0];
        assert_eq!(report.status, ScenarioStatus::InfrastructureFailed);
        assert!(report.error.is_none());
        assert_eq!(report.artifacts.len(), 2);
        assert!(report
            .artifacts
            .iter()
            .all(|a| matches!(a.outcome, ArtifactOutcome::Failed { .. })));
    }

    #[tokio::test]
    async fn test_conditional_capture_is_skipped_when_hidden() {
        let fixture = Fixture::new(launcher());
        let runner = fixture.runner(fixture.config());
        let mut artifact = ArtifactSpec::new("modal.png");
        artifact.when_visible = Some(".modal".into());
        let scenario = Scenario::new("modal", "mocks/b.html")
            .expect(Expectation::visible(".window"))
            .capture(artifact);

        let summary = runner.run(&[scenario]).await;

        let report = &summary.scenarios[0];
        assert_eq!(report.status, ScenarioStatus::Passed);
        assert!(matches!(
            report.artifacts[0].outcome,
            ArtifactOutcome::Skipped { .. }
        ));
    }

    #[tokio::test]
    async fn test_wait_for_missing_selector_is_navigation_fault() {
        let fixture = Fixture::new(launcher());
        let runner = fixture.runner(fixture.config());
        let mut scenario = passing("waits");
        scenario.wait_for = Some(".never".into());

        let summary = runner.run(&[scenario]).await;

        let report = &summary.scenarios[0];
        assert_eq!(report.status, ScenarioStatus::InfrastructureFailed);
        assert_eq!(report.error.as_ref().unwrap().kind, FaultKind::Navigation);
    }

    #[tokio::test]
    async fn test_viewport_override_reaches_launch() {
        let fixture = Fixture::new(launcher());
        let runner = fixture.runner(fixture.config());
        let mut scenario = passing("small");
        scenario.viewport = Some(Viewport {
            width: 640,
            height: 480,
        });

        runner.run(&[scenario, passing("default")]).await;

        assert_eq!(
            fixture.launcher.launched_viewports(),
            vec![
                Some(Viewport {
                    width: 640,
                    height: 480
                }),
                None
            ]
        );
    }

    #[tokio::test]
    async fn test_shared_session_is_reused_and_replaced_after_fault() {
        let fixture = Fixture::new(launcher());
        let runner = fixture.runner(HarnessConfig {
            session_mode: SessionMode::Shared,
            ..fixture.config()
        });
        let scenarios = vec![
            passing("one"),
            passing("two"),
            Scenario::new("nav", "mocks/unknown.html").expect(Expectation::visible("body")),
            passing("three"),
        ];

        let summary = runner.run(&scenarios).await;

        assert_eq!(summary.scenarios[1].status, ScenarioStatus::Passed);
        assert_eq!(summary.scenarios[3].status, ScenarioStatus::Passed);
        assert_eq!(fixture.launcher.launches(), 2);
        assert_eq!(fixture.launcher.closed(), 2);
    }

    #[tokio::test]
    async fn test_shared_session_resets_viewport_between_scenarios() {
        let fixture = Fixture::new(launcher());
        let runner = fixture.runner(HarnessConfig {
            session_mode: SessionMode::Shared,
            ..fixture.config()
        });
        let mut small = passing("small");
        small.viewport = Some(Viewport {
            width: 640,
            height: 480,
        });

        runner.run(&[small, passing("default")]).await;

        assert_eq!(fixture.launcher.launches(), 1);
        assert_eq!(
            fixture.launcher.viewports_set(),
            vec![
                Viewport {
                    width: 640,
                    height: 480
                },
                Viewport::BROWSER_DEFAULT
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_capture_element_does_not_time_out_the_scenario() {
        let fixture = Fixture::new(launcher());
        let runner = fixture.runner(fixture.config());
        let mut gone = ArtifactSpec::new("gone.png");
        gone.selector = Some(".gone".into());
        let mut scenario = passing("captures")
            .capture(gone)
            .capture(ArtifactSpec::new("page.png"));
        scenario.timeout_ms = Some(2_000);

        let summary = runner.run(&[scenario]).await;

        let report = &summary.scenarios[0];
        assert_eq!(report.status, ScenarioStatus::InfrastructureFailed);
        assert!(report.error.is_none());
        assert!(matches!(
            report.artifacts[0].outcome,
            ArtifactOutcome::Failed { .. }
        ));
        assert!(matches!(
            report.artifacts[1].outcome,
            ArtifactOutcome::Captured(_)
        ));
        assert_eq!(fixture.launcher.closed(), 1);
    }
}
