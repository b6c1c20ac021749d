//! Per-scenario reports and the run summary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::path::Path;
use tracing::info;

use crate::assertion::{ExpectationResult, Outcome};
use crate::capture::CaptureResult;
use crate::error::{HarnessError, HarnessResult};
use crate::scenario::ArtifactSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Passed,
    AssertionFailed,
    InfrastructureFailed,
    TimedOut,
}

impl ScenarioStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioStatus::Passed => "passed",
            ScenarioStatus::AssertionFailed => "assertion failed",
            ScenarioStatus::InfrastructureFailed => "infrastructure failed",
            ScenarioStatus::TimedOut => "timed out",
        }
    }

    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            ScenarioStatus::InfrastructureFailed | ScenarioStatus::TimedOut
        )
    }
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Fixture,
    SessionLaunch,
    Navigation,
    Stage,
    Timeout,
    Driver,
}

/// The fault that cut a scenario short
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioFault {
    pub kind: FaultKind,
    pub message: String,
}

impl From<&HarnessError> for ScenarioFault {
    fn from(err: &HarnessError) -> Self {
        let kind = match err {
            HarnessError::FixtureNotFound(_) | HarnessError::InvalidFixture { .. } => {
                FaultKind::Fixture
            }
            HarnessError::SessionLaunch(_) => FaultKind::SessionLaunch,
            HarnessError::Navigation { .. } => FaultKind::Navigation,
            HarnessError::Stage { .. } => FaultKind::Stage,
            HarnessError::Timeout { .. } => FaultKind::Timeout,
            _ => FaultKind::Driver,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArtifactOutcome {
    Captured(CaptureResult),
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactReport {
    pub spec: ArtifactSpec,
    pub outcome: ArtifactOutcome,
}

/// Result of one scenario, built up as the scenario runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub status: ScenarioStatus,
    pub fixture_uri: Option<String>,
    pub expectations: Vec<ExpectationResult>,
    pub artifacts: Vec<ArtifactReport>,
    pub error: Option<ScenarioFault>,
    pub duration_ms: u64,
}

impl ScenarioReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ScenarioStatus::Passed,
            fixture_uri: None,
            expectations: Vec::new(),
            artifacts: Vec::new(),
            error: None,
            duration_ms: 0,
        }
    }

    /// Record the fault that ended the scenario. The first fault wins.
    pub fn fault(&mut self, err: &HarnessError) {
        if self.error.is_none() {
            self.error = Some(ScenarioFault::from(err));
        }
    }

    /// Settle the status from what was recorded
    pub fn finish(&mut self, duration_ms: u64) {
        self.duration_ms = duration_ms;
        self.status = match &self.error {
            Some(fault) if fault.kind == FaultKind::Timeout => ScenarioStatus::TimedOut,
            Some(_) => ScenarioStatus::InfrastructureFailed,
            None if self.expectations.iter().any(|r| !r.outcome.is_pass()) => {
                ScenarioStatus::AssertionFailed
            }
            None if self
                .artifacts
                .iter()
                .any(|a| matches!(a.outcome, ArtifactOutcome::Failed { .. })) =>
            {
                ScenarioStatus::InfrastructureFailed
            }
            None => ScenarioStatus::Passed,
        };
    }

    pub fn passed(&self) -> bool {
        self.status == ScenarioStatus::Passed
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub scenarios: Vec<ScenarioReport>,
}

impl RunSummary {
    /// True iff every scenario passed
    pub fn success(&self) -> bool {
        self.scenarios.iter().all(ScenarioReport::passed)
    }

    pub fn count(&self, status: ScenarioStatus) -> usize {
        self.scenarios.iter().filter(|s| s.status == status).count()
    }

    pub fn passed(&self) -> usize {
        self.count(ScenarioStatus::Passed)
    }

    pub fn failed(&self) -> usize {
        self.scenarios.len() - self.passed()
    }

    /// Write the summary as pretty JSON, creating parent directories
    pub fn write_json(&self, path: &Path) -> HarnessResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!("Results written to: {}", path.display());
        Ok(())
    }

    /// Plain-text rendering, one block per scenario
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for scenario in &self.scenarios {
            let _ = writeln!(
                out,
                "{} [{}] ({} ms)",
                scenario.name, scenario.status, scenario.duration_ms
            );
            if let Some(uri) = &scenario.fixture_uri {
                let _ = writeln!(out, "  fixture: {}", uri);
            }
            for result in &scenario.expectations {
                match &result.outcome {
                    Outcome::Pass => {
                        let _ = writeln!(out, "  PASS {}", result.expectation);
                    }
                    Outcome::Fail(reason) => {
                        let _ = writeln!(out, "  FAIL {}: {}", result.expectation, reason);
                    }
                }
            }
            for artifact in &scenario.artifacts {
                let path = artifact.spec.output_path.display();
                let _ = match &artifact.outcome {
                    ArtifactOutcome::Captured(c) => writeln!(
                        out,
                        "  CAPTURED {} ({}x{})",
                        c.path.display(),
                        c.width,
                        c.height
                    ),
                    ArtifactOutcome::Skipped { reason } => {
                        writeln!(out, "  SKIPPED {}: {}", path, reason)
                    }
                    ArtifactOutcome::Failed { reason } => {
                        writeln!(out, "  CAPTURE FAILED {}: {}", path, reason)
                    }
                };
            }
            if let Some(fault) = &scenario.error {
                let _ = writeln!(out, "  ERROR {}", fault.message);
            }
        }
        let _ = writeln!(
            out,
            "{} scenario(s): {} passed, {} assertion failure(s), {} infrastructure failure(s), {} timed out ({} ms)",
            self.scenarios.len(),
            self.passed(),
            self.count(ScenarioStatus::AssertionFailed),
            self.count(ScenarioStatus::InfrastructureFailed),
            self.count(ScenarioStatus::TimedOut),
            self.duration_ms
        );
        out
    }
}
