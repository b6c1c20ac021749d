//! MockCheck fixture verification harness
//!
//! Loads static HTML fixtures into a headless browser, checks that key
//! elements are present and styled as declared, and captures screenshots
//! as evidence of how the fixture rendered.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  ScenarioRunner::run(&[Scenario])           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  per scenario, under scenario_timeout_ms                     │
//! │    ├── FixtureLocator::resolve(fixture) -> LoadableUri      │
//! │    ├── SessionManager::acquire() -> SessionHandle           │
//! │    ├── navigate, wait_for                                   │
//! │    ├── AssertionEngine::evaluate_one() per expectation      │
//! │    ├── stage steps                                          │
//! │    ├── ArtifactCapture::capture() per artifact              │
//! │    └── SessionHandle::release()                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenario (YAML)                                            │
//! │    ├── name, tags, fixture, wait_for, viewport              │
//! │    ├── expectations: visible | style | text                 │
//! │    ├── stage: set_style | set_text | add_class | ...        │
//! │    └── artifacts: { output_path, full_page, selector }      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod assertion;
pub mod capture;
pub mod config;
pub mod error;
pub mod fixture;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod session;
pub mod style;

#[cfg(test)]
mod testing;

pub use assertion::{AssertionEngine, ExpectationResult, FailReason, Outcome};
pub use capture::{ArtifactCapture, CaptureResult};
pub use config::{BrowserConfig, HarnessConfig, SessionMode, TextMatchMode, Viewport};
pub use error::{HarnessError, HarnessResult};
pub use fixture::{FixtureLocator, FixtureRef, LoadableUri};
pub use report::{RunSummary, ScenarioReport, ScenarioStatus};
pub use runner::ScenarioRunner;
pub use scenario::{ArtifactSpec, Expectation, Scenario, StageStep};
pub use session::{SessionHandle, SessionManager};
