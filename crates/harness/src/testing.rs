//! Scripted in-memory browser for unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{BrowserConfig, Viewport};
use crate::error::{HarnessError, HarnessResult};
use crate::scenario::StageStep;
use crate::session::{BrowserLauncher, ElementProbe, PageDriver, ScreenshotRequest};

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    selector: String,
    visible: bool,
    styles: HashMap<String, String>,
    text: String,
    /// Number of probes before the element shows up
    appears_after: usize,
}

impl FakeElement {
    pub fn new(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            visible: true,
            ..Default::default()
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn style(mut self, property: &str, value: &str) -> Self {
        self.styles.insert(property.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn appears_after(mut self, polls: usize) -> Self {
        self.appears_after = polls;
        self
    }

    fn matches(&self, selector: &str) -> bool {
        self.selector == selector
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeDocument {
    elements: Vec<FakeElement>,
    broken_screenshots: bool,
    hangs: bool,
}

impl FakeDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(mut self, element: FakeElement) -> Self {
        self.elements.push(element);
        self
    }

    /// Screenshots return bytes that are not an image
    pub fn broken_screenshots(mut self) -> Self {
        self.broken_screenshots = true;
        self
    }

    /// Navigation never completes
    pub fn hangs(mut self) -> Self {
        self.hangs = true;
        self
    }
}

#[derive(Default)]
struct FakeState {
    launched: Mutex<Vec<Option<Viewport>>>,
    viewports_set: Mutex<Vec<Viewport>>,
    staged: Mutex<Vec<StageStep>>,
    closed: AtomicUsize,
    fail_launches: AtomicUsize,
}

/// Launcher handing out [`FakePage`]s over a fixed set of documents,
/// keyed by a suffix of the navigated URI
#[derive(Clone, Default)]
pub struct FakeLauncher {
    documents: Arc<HashMap<String, FakeDocument>>,
    state: Arc<FakeState>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, uri_suffix: &str, document: FakeDocument) -> Self {
        Arc::make_mut(&mut self.documents).insert(uri_suffix.to_string(), document);
        self
    }

    /// The next `n` launches fail
    pub fn failing_launches(self, n: usize) -> Self {
        self.state.fail_launches.store(n, Ordering::SeqCst);
        self
    }

    pub fn launches(&self) -> usize {
        self.state.launched.lock().len()
    }

    pub fn launched_viewports(&self) -> Vec<Option<Viewport>> {
        self.state.launched.lock().clone()
    }

    pub fn viewports_set(&self) -> Vec<Viewport> {
        self.state.viewports_set.lock().clone()
    }

    pub fn staged(&self) -> Vec<StageStep> {
        self.state.staged.lock().clone()
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, config: &BrowserConfig) -> HarnessResult<Box<dyn PageDriver>> {
        let remaining = self.state.fail_launches.load(Ordering::SeqCst);
        if remaining > 0 {
            self.state.fail_launches.store(remaining - 1, Ordering::SeqCst);
            return Err(HarnessError::SessionLaunch("browser crashed on startup".into()));
        }
        self.state.launched.lock().push(config.viewport);
        Ok(Box::new(FakePage {
            documents: self.documents.clone(),
            state: self.state.clone(),
            current: None,
            polls: 0,
        }))
    }
}

pub struct FakePage {
    documents: Arc<HashMap<String, FakeDocument>>,
    state: Arc<FakeState>,
    current: Option<FakeDocument>,
    polls: usize,
}

impl FakePage {
    fn document(&self) -> HarnessResult<&FakeDocument> {
        self.current
            .as_ref()
            .ok_or_else(|| HarnessError::Driver("no document loaded".into()))
    }

    fn present<'a>(&'a self, selector: &'a str) -> HarnessResult<Vec<&'a FakeElement>> {
        if selector.contains('[') && !selector.contains(']') {
            return Err(HarnessError::InvalidSelector {
                selector: selector.to_string(),
                reason: "not a valid selector".into(),
            });
        }
        let polls = self.polls;
        Ok(self
            .document()?
            .elements
            .iter()
            .filter(|e| e.matches(selector) && polls >= e.appears_after)
            .collect())
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn set_viewport(&mut self, viewport: Viewport) -> HarnessResult<()> {
        self.state.viewports_set.lock().push(viewport);
        Ok(())
    }

    async fn navigate(&mut self, uri: &str, _timeout: Duration) -> HarnessResult<()> {
        let document = self
            .documents
            .iter()
            .find(|(suffix, _)| uri.ends_with(suffix.as_str()))
            .map(|(_, doc)| doc.clone())
            .ok_or_else(|| HarnessError::Navigation {
                uri: uri.to_string(),
                reason: "net::ERR_FILE_NOT_FOUND".into(),
            })?;

        if document.hangs {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        self.current = Some(document);
        self.polls = 0;
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> HarnessResult<()> {
        self.polls += 1;
        if self.present(selector)?.iter().any(|e| e.visible) {
            Ok(())
        } else {
            Err(HarnessError::Timeout {
                what: format!("selector {}", selector),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }

    async fn probe(&mut self, selector: &str) -> HarnessResult<ElementProbe> {
        self.polls += 1;
        let found = self.present(selector)?;
        Ok(ElementProbe {
            matched: found.len(),
            visible: found.iter().filter(|e| e.visible).count(),
        })
    }

    async fn computed_style(
        &mut self,
        selector: &str,
        property: &str,
    ) -> HarnessResult<Option<String>> {
        self.polls += 1;
        Ok(self
            .present(selector)?
            .first()
            .map(|e| e.styles.get(property).cloned().unwrap_or_default()))
    }

    async fn text_present(
        &mut self,
        text: &str,
        exact: bool,
        case_sensitive: bool,
    ) -> HarnessResult<bool> {
        self.polls += 1;
        let polls = self.polls;
        let fold = |s: &str| {
            if case_sensitive {
                s.to_string()
            } else {
                s.to_lowercase()
            }
        };
        let needle = fold(text);
        Ok(self.document()?.elements.iter().any(|e| {
            let rendered = fold(&e.text);
            e.visible
                && polls >= e.appears_after
                && if exact {
                    rendered == needle
                } else {
                    rendered.contains(&needle)
                }
        }))
    }

    async fn stage(&mut self, step: &StageStep) -> HarnessResult<()> {
        let target = match step {
            StageStep::SetStyle { selector, .. }
            | StageStep::SetText { selector, .. }
            | StageStep::AddClass { selector, .. }
            | StageStep::RemoveClass { selector, .. }
            | StageStep::Remove { selector } => selector,
            StageStep::Insert { anchor, .. } => anchor,
        };
        if self.present(target)?.is_empty() {
            return Err(HarnessError::Driver(format!("no element matches {}", target)));
        }
        self.state.staged.lock().push(step.clone());
        Ok(())
    }

    async fn screenshot(&mut self, request: &ScreenshotRequest) -> HarnessResult<Vec<u8>> {
        let document = self.document()?;
        if document.broken_screenshots {
            return Ok(b"definitely not a png".to_vec());
        }
        if let Some(selector) = &request.selector {
            if self.present(selector)?.is_empty() {
                // like Playwright, a zero timeout waits for the element forever
                let wait = if request.timeout.is_zero() {
                    Duration::from_secs(3600)
                } else {
                    request.timeout
                };
                tokio::time::sleep(wait).await;
                return Err(HarnessError::Driver(format!(
                    "screenshot failed: timeout {} ms waiting for {}",
                    request.timeout.as_millis(),
                    selector
                )));
            }
        }
        let height = if request.full_page { 40 } else { 20 };
        Ok(png_bytes(16, height))
    }

    async fn close(&mut self) -> HarnessResult<()> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([0, 0, 128, 255]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .expect("encode png");
    bytes
}
