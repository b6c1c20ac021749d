//! Configuration resolution: config file, then CLI overrides

use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::debug;

use mockcheck_harness::config::{BrowserKind, CONFIG_FILE_NAME};
use mockcheck_harness::{HarnessConfig, Scenario, SessionMode, Viewport};

/// Settings shared by commands that resolve fixtures or run browsers
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Configuration file (defaults to ./mockcheck.toml when present)
    #[arg(short, long, env = "MOCKCHECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory fixture paths are resolved against
    #[arg(long, env = "MOCKCHECK_BASE_DIR")]
    pub base_dir: Option<PathBuf>,

    /// Directory screenshots and results are written to
    #[arg(short, long, env = "MOCKCHECK_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Viewport as WIDTHxHEIGHT
    #[arg(long)]
    pub viewport: Option<Viewport>,

    /// Bounded wait per expectation, in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Overall deadline per scenario, in milliseconds
    #[arg(long)]
    pub scenario_timeout_ms: Option<u64>,

    /// Reuse one browser session across scenarios
    #[arg(long)]
    pub shared_session: bool,

    /// Browser engine (chromium, firefox, webkit)
    #[arg(long)]
    pub browser: Option<BrowserKind>,

    /// Node.js executable hosting Playwright
    #[arg(long, env = "MOCKCHECK_NODE")]
    pub node: Option<String>,
}

impl SettingsArgs {
    /// Build the effective configuration for the given scenario paths
    pub fn resolve(&self, scenario_paths: &[PathBuf]) -> Result<HarnessConfig> {
        let (mut config, from_file) = match &self.config {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found: {}", path.display());
                }
                (load(path)?, true)
            }
            None => {
                let default = Path::new(CONFIG_FILE_NAME);
                if default.exists() {
                    (load(default)?, true)
                } else {
                    (HarnessConfig::default(), false)
                }
            }
        };

        if !from_file {
            if let Some(first) = scenario_paths.first() {
                config.base_dir = scenario_dir(first);
            }
        }

        self.apply(&mut config);
        config
            .validate()
            .context("Invalid configuration after applying command-line overrides")?;

        debug!("Effective configuration: {:?}", config);
        Ok(config)
    }

    fn apply(&self, config: &mut HarnessConfig) {
        if let Some(dir) = &self.base_dir {
            config.base_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if self.headed {
            config.browser.headless = false;
        }
        if let Some(viewport) = self.viewport {
            config.browser.viewport = Some(viewport);
        }
        if let Some(ms) = self.timeout_ms {
            config.expectation_timeout_ms = ms;
        }
        if let Some(ms) = self.scenario_timeout_ms {
            config.scenario_timeout_ms = ms;
        }
        if self.shared_session {
            config.session_mode = SessionMode::Shared;
        }
        if let Some(kind) = self.browser {
            config.browser.kind = kind;
        }
        if let Some(node) = &self.node {
            config.browser.node_command = node.clone();
        }
    }
}

fn load(path: &Path) -> Result<HarnessConfig> {
    HarnessConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

/// Directory a scenario path's fixtures are relative to by default
fn scenario_dir(path: &Path) -> PathBuf {
    if path.is_dir() {
        return path.to_path_buf();
    }
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Load, validate and filter scenarios from files or directories
pub fn load_scenarios(
    paths: &[PathBuf],
    tag: Option<&str>,
    name: Option<&str>,
) -> Result<Vec<Scenario>> {
    let mut scenarios = Vec::new();
    for path in paths {
        let loaded = Scenario::load_all(path)
            .with_context(|| format!("Failed to load scenarios from {}", path.display()))?;
        scenarios.extend(loaded);
    }
    Scenario::validate_all(&scenarios)?;

    if let Some(tag) = tag {
        scenarios = Scenario::filter_by_tag(&scenarios, tag)
            .into_iter()
            .cloned()
            .collect();
    }
    if let Some(name) = name {
        scenarios.retain(|s| s.name == name);
        if scenarios.is_empty() {
            bail!("Scenario not found: {}", name);
        }
    }
    Ok(scenarios)
}
