//! Browser session lifecycle
//!
//! A [`SessionHandle`] owns one browser process with one open page. The
//! browser itself sits behind the [`BrowserLauncher`] / [`PageDriver`] seam;
//! [`playwright`] provides the production implementation.

pub mod playwright;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{BrowserConfig, Viewport};
use crate::error::{HarnessError, HarnessResult};
use crate::scenario::StageStep;

/// What a selector currently matches in the document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementProbe {
    /// Attached elements matching the selector
    pub matched: usize,
    /// How many of those are rendered and visible
    pub visible: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenshotRequest {
    pub full_page: bool,
    pub selector: Option<String>,
    /// How long an element capture waits for its selector
    pub timeout: Duration,
}

/// Operations the harness performs on an open page.
///
/// Query methods report absence through their return value; an `Err` means
/// the page or the browser behind it is unusable, except for
/// [`HarnessError::InvalidSelector`].
#[async_trait]
pub trait PageDriver: Send {
    async fn set_viewport(&mut self, viewport: Viewport) -> HarnessResult<()>;

    async fn navigate(&mut self, uri: &str, timeout: Duration) -> HarnessResult<()>;

    /// Wait until `selector` is visible
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> HarnessResult<()>;

    async fn probe(&mut self, selector: &str) -> HarnessResult<ElementProbe>;

    /// Computed value of `property` on the first match, `None` without a match
    async fn computed_style(&mut self, selector: &str, property: &str)
        -> HarnessResult<Option<String>>;

    /// Whether any element's rendered text matches
    async fn text_present(&mut self, text: &str, exact: bool, case_sensitive: bool)
        -> HarnessResult<bool>;

    async fn stage(&mut self, step: &StageStep) -> HarnessResult<()>;

    /// Encoded PNG bytes
    async fn screenshot(&mut self, request: &ScreenshotRequest) -> HarnessResult<Vec<u8>>;

    /// Close the page and the browser
    async fn close(&mut self) -> HarnessResult<()>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, config: &BrowserConfig) -> HarnessResult<Box<dyn PageDriver>>;
}

/// Exclusive handle on a live browser page
pub struct SessionHandle {
    id: Uuid,
    driver: Option<Box<dyn PageDriver>>,
}

impl SessionHandle {
    pub fn new(driver: Box<dyn PageDriver>) -> Self {
        Self {
            id: Uuid::new_v4(),
            driver: Some(driver),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_released(&self) -> bool {
        self.driver.is_none()
    }

    /// The open page; fails once the session has been released
    pub fn page(&mut self) -> HarnessResult<&mut dyn PageDriver> {
        match self.driver.as_mut() {
            Some(driver) => Ok(driver.as_mut()),
            None => Err(HarnessError::SessionReleased),
        }
    }

    /// Close the page and browser. Calling this again is a no-op.
    pub async fn release(&mut self) -> HarnessResult<()> {
        match self.driver.take() {
            Some(mut driver) => {
                debug!("Releasing session {}", self.id);
                driver.close().await
            }
            None => Ok(()),
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if self.driver.is_some() {
            // the driver's own Drop tears down the process
            warn!("Session {} dropped without release", self.id);
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Hands out sessions from a launcher
#[derive(Clone)]
pub struct SessionManager {
    launcher: Arc<dyn BrowserLauncher>,
}

impl SessionManager {
    pub fn new(launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self { launcher }
    }

    pub async fn acquire(&self, config: &BrowserConfig) -> HarnessResult<SessionHandle> {
        let driver = self.launcher.launch(config).await.map_err(|e| match e {
            HarnessError::SessionLaunch(_) => e,
            other => HarnessError::SessionLaunch(other.to_string()),
        })?;

        let handle = SessionHandle::new(driver);
        info!(
            "Launched {} session {} (headless: {})",
            config.kind.as_str(),
            handle.id(),
            config.headless
        );
        Ok(handle)
    }
}
