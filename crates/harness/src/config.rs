//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{HarnessError, HarnessResult};

/// Config file picked up from the working directory when none is given
pub const CONFIG_FILE_NAME: &str = "mockcheck.toml";

/// Harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Directory relative fixture paths are resolved against
    pub base_dir: PathBuf,

    /// Directory relative artifact paths are written under
    pub output_dir: PathBuf,

    /// Browser launch options
    pub browser: BrowserConfig,

    /// Bounded wait applied to each expectation before it fails
    pub expectation_timeout_ms: u64,

    /// Polling interval inside the expectation wait
    pub poll_interval_ms: u64,

    /// Overall deadline for one scenario
    pub scenario_timeout_ms: u64,

    /// Deadline for loading the fixture
    pub navigation_timeout_ms: u64,

    /// How text expectations match when a scenario does not say
    pub text_match: TextMatchMode,

    /// Whether scenarios share one browser session
    pub session_mode: SessionMode,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            output_dir: PathBuf::from("verification-results"),
            browser: BrowserConfig::default(),
            expectation_timeout_ms: 1_000,
            poll_interval_ms: 100,
            scenario_timeout_ms: 30_000,
            navigation_timeout_ms: 10_000,
            text_match: TextMatchMode::Substring,
            session_mode: SessionMode::Fresh,
        }
    }
}

/// Browser launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run without a visible window
    pub headless: bool,

    /// Page viewport; Playwright's default when unset
    pub viewport: Option<Viewport>,

    /// Browser engine
    pub kind: BrowserKind,

    /// Node.js executable hosting the Playwright driver
    pub node_command: String,

    /// How long the driver may take to report ready
    pub launch_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: None,
            kind: BrowserKind::Chromium,
            node_command: "node".to_string(),
            launch_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Size Playwright gives a page when launched without a viewport
    pub const BROWSER_DEFAULT: Viewport = Viewport {
        width: 1280,
        height: 720,
    };
}

impl std::str::FromStr for Viewport {
    type Err = String;

    /// Parses `1280x720`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
        let width = w.trim().parse().map_err(|_| format!("invalid width '{}'", w))?;
        let height = h.trim().parse().map_err(|_| format!("invalid height '{}'", h))?;
        if width == 0 || height == 0 {
            return Err("viewport dimensions must be non-zero".to_string());
        }
        Ok(Viewport { width, height })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for BrowserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(BrowserKind::Chromium),
            "firefox" => Ok(BrowserKind::Firefox),
            "webkit" => Ok(BrowserKind::Webkit),
            other => Err(format!("unknown browser '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMatchMode {
    Exact,
    #[default]
    Substring,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// New browser per scenario
    #[default]
    Fresh,
    /// One browser reused across scenarios, replaced after a fault
    Shared,
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when absent.
    ///
    /// Relative `base_dir` and `output_dir` values are anchored at the
    /// directory containing the file.
    pub fn load(path: &Path) -> HarnessResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        let anchor = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.base_dir = anchor_path(&anchor, &config.base_dir);
        config.output_dir = anchor_path(&anchor, &config.output_dir);

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> HarnessResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| HarnessError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> HarnessResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(HarnessError::Config("poll_interval_ms must be > 0".into()));
        }
        if self.scenario_timeout_ms == 0 {
            return Err(HarnessError::Config("scenario_timeout_ms must be > 0".into()));
        }
        if let Some(vp) = self.browser.viewport {
            if vp.width == 0 || vp.height == 0 {
                return Err(HarnessError::Config("viewport dimensions must be non-zero".into()));
            }
        }
        Ok(())
    }

    pub fn expectation_timeout(&self) -> Duration {
        Duration::from_millis(self.expectation_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn scenario_timeout(&self) -> Duration {
        Duration::from_millis(self.scenario_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

fn anchor_path(anchor: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        anchor.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert!(config.browser.headless);
        assert_eq!(config.expectation_timeout_ms, 1_000);
        assert_eq!(config.session_mode, SessionMode::Fresh);
        assert_eq!(config.text_match, TextMatchMode::Substring);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.scenario_timeout_ms, 30_000);
    }

    #[test]
    fn test_load_anchors_relative_dirs_at_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"
base_dir = "verification"
output_dir = "/tmp/shots"
expectation_timeout_ms = 250
session_mode = "shared"

[browser]
headless = false
viewport = { width = 1024, height = 768 }
"#,
        )
        .unwrap();

        let config = HarnessConfig::load(&path).unwrap();
        assert_eq!(config.base_dir, dir.path().join("verification"));
        assert_eq!(config.output_dir, PathBuf::from("/tmp/shots"));
        assert_eq!(config.expectation_timeout_ms, 250);
        assert_eq!(config.session_mode, SessionMode::Shared);
        assert!(!config.browser.headless);
        assert_eq!(
            config.browser.viewport,
            Some(Viewport { width: 1024, height: 768 })
        );
        // untouched keys keep their defaults
        assert_eq!(config.poll_interval_ms, 100);
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/mockcheck.toml");
        let mut config = HarnessConfig::default();
        config.base_dir = dir.path().to_path_buf();
        config.output_dir = dir.path().join("out");
        config.browser.kind = BrowserKind::Firefox;
        config.save(&path).unwrap();

        let loaded = HarnessConfig::load(&path).unwrap();
        assert_eq!(loaded.browser.kind, BrowserKind::Firefox);
        assert_eq!(loaded.output_dir, dir.path().join("out"));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let config = HarnessConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(HarnessError::Config(_))));
    }

    #[test]
    fn test_viewport_from_str() {
        assert_eq!(
            "1280x720".parse::<Viewport>().unwrap(),
            Viewport { width: 1280, height: 720 }
        );
        assert!("1280".parse::<Viewport>().is_err());
        assert!("0x10".parse::<Viewport>().is_err());
    }

    #[test]
    fn test_browser_kind_from_str() {
        assert_eq!("WebKit".parse::<BrowserKind>().unwrap(), BrowserKind::Webkit);
        assert!("lynx".parse::<BrowserKind>().is_err());
    }
}
