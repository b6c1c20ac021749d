//! Error types for the verification harness

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Fixture not found: {0}")]
    FixtureNotFound(PathBuf),

    #[error("Invalid fixture reference '{reference}': {reason}")]
    InvalidFixture { reference: String, reason: String },

    #[error("Browser session failed to launch: {0}")]
    SessionLaunch(String),

    #[error("Browser session already released")]
    SessionReleased,

    #[error("Browser driver error: {0}")]
    Driver(String),

    #[error("Navigation to {uri} failed: {reason}")]
    Navigation { uri: String, reason: String },

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Stage step {index} ({step}) failed: {reason}")]
    Stage {
        index: usize,
        step: String,
        reason: String,
    },

    #[error("Capture of {path} failed: {reason}")]
    Capture { path: PathBuf, reason: String },

    #[error("Timeout after {timeout_ms} ms waiting for: {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("Scenario parse error: {0}")]
    ScenarioParse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
