//! Declarative YAML scenario definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{TextMatchMode, Viewport};
use crate::error::{HarnessError, HarnessResult};
use crate::fixture::FixtureRef;

/// One fixture, the checks run against it and the screenshots taken of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Document to load
    pub fixture: FixtureRef,

    /// Selector that must appear before the fixture counts as loaded
    #[serde(default)]
    pub wait_for: Option<String>,

    /// Overrides the configured viewport
    #[serde(default)]
    pub viewport: Option<Viewport>,

    /// Checks, evaluated and reported in this order
    #[serde(default)]
    pub expectations: Vec<Expectation>,

    /// Mutations applied after the checks and before any capture
    #[serde(default)]
    pub stage: Vec<StageStep>,

    /// Screenshots to take
    #[serde(default)]
    pub artifacts: Vec<ArtifactSpec>,

    /// Overrides the configured scenario deadline
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// A single declarative check against the rendered document.
///
/// Selectors here, in `wait_for`, stage steps and artifacts all go through
/// Playwright's selector engine, so `text=OK` works wherever `.ok` does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "expect", rename_all = "snake_case")]
pub enum Expectation {
    /// At least one element matching `selector` is rendered and visible
    Visible { selector: String },

    /// The first match's computed `property` equals `value`
    Style {
        selector: String,
        property: String,
        value: String,
    },

    /// Some element's rendered text matches
    Text(TextMatcher),
}

impl Expectation {
    pub fn visible(selector: impl Into<String>) -> Self {
        Expectation::Visible {
            selector: selector.into(),
        }
    }

    pub fn style(
        selector: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Expectation::Style {
            selector: selector.into(),
            property: property.into(),
            value: value.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Expectation::Text(TextMatcher::new(text))
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Visible { selector } => write!(f, "visible {}", selector),
            Expectation::Style {
                selector,
                property,
                value,
            } => write!(f, "style {} {{ {}: {} }}", selector, property, value),
            Expectation::Text(matcher) => write!(f, "text {}", matcher),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMatcher {
    pub text: String,

    /// Falls back to the configured mode when unset
    #[serde(default)]
    pub mode: Option<TextMatchMode>,

    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
}

fn default_case_sensitive() -> bool {
    true
}

impl TextMatcher {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: None,
            case_sensitive: true,
        }
    }

    pub fn exact(mut self) -> Self {
        self.mode = Some(TextMatchMode::Exact);
        self
    }
}

impl fmt::Display for TextMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Some(TextMatchMode::Exact) => "=",
            Some(TextMatchMode::Substring) => "~",
            None => "",
        };
        write!(f, "{}{:?}", mode, self.text)?;
        if !self.case_sensitive {
            f.write_str(" (ignore case)")?;
        }
        Ok(())
    }
}

/// A named mutation that stages a visual state before capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StageStep {
    SetStyle {
        selector: String,
        property: String,
        value: String,
    },
    SetText {
        selector: String,
        text: String,
    },
    AddClass {
        selector: String,
        class: String,
    },
    RemoveClass {
        selector: String,
        class: String,
    },
    Remove {
        selector: String,
    },
    Insert {
        anchor: String,
        #[serde(default)]
        position: InsertPosition,
        tag: String,
        #[serde(default)]
        class: Option<String>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        style: Option<String>,
    },
}

impl fmt::Display for StageStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageStep::SetStyle { selector, property, .. } => {
                write!(f, "set_style {} {}", selector, property)
            }
            StageStep::SetText { selector, .. } => write!(f, "set_text {}", selector),
            StageStep::AddClass { selector, class } => write!(f, "add_class {} .{}", selector, class),
            StageStep::RemoveClass { selector, class } => {
                write!(f, "remove_class {} .{}", selector, class)
            }
            StageStep::Remove { selector } => write!(f, "remove {}", selector),
            StageStep::Insert { anchor, tag, .. } => write!(f, "insert <{}> at {}", tag, anchor),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertPosition {
    Before,
    #[default]
    After,
    Append,
}

/// A screenshot to persist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Relative paths land under the configured output directory
    pub output_path: PathBuf,

    #[serde(default)]
    pub full_page: bool,

    /// Capture only this element
    #[serde(default)]
    pub selector: Option<String>,

    /// Skip the capture unless this selector is visible
    #[serde(default)]
    pub when_visible: Option<String>,
}

impl ArtifactSpec {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            full_page: false,
            selector: None,
            when_visible: None,
        }
    }

    pub fn full_page(mut self) -> Self {
        self.full_page = true;
        self
    }
}

/// Multi-scenario file layout
#[derive(Debug, Deserialize)]
struct ScenarioFile {
    scenarios: Vec<Scenario>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, fixture: impl Into<FixtureRef>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            fixture: fixture.into(),
            wait_for: None,
            viewport: None,
            expectations: Vec::new(),
            stage: Vec::new(),
            artifacts: Vec::new(),
            timeout_ms: None,
        }
    }

    pub fn expect(mut self, expectation: Expectation) -> Self {
        self.expectations.push(expectation);
        self
    }

    pub fn stage(mut self, step: StageStep) -> Self {
        self.stage.push(step);
        self
    }

    pub fn capture(mut self, artifact: ArtifactSpec) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Parse scenarios from a YAML string.
    ///
    /// A document is either a single scenario or a mapping with a
    /// `scenarios:` list; `---` separated documents are all read.
    pub fn from_yaml(yaml: &str) -> HarnessResult<Vec<Self>> {
        let mut scenarios = Vec::new();
        for document in serde_yaml::Deserializer::from_str(yaml) {
            let value = serde_yaml::Value::deserialize(document)?;
            if value.is_null() {
                continue;
            }
            if value.get("scenarios").is_some() {
                let file: ScenarioFile = serde_yaml::from_value(value)?;
                scenarios.extend(file.scenarios);
            } else {
                scenarios.push(serde_yaml::from_value(value)?);
            }
        }
        Ok(scenarios)
    }

    /// Parse scenarios from a YAML file
    pub fn from_file(path: &Path) -> HarnessResult<Vec<Self>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            HarnessError::Yaml(inner) => {
                HarnessError::ScenarioParse(format!("{}: {}", path.display(), inner))
            }
            other => other,
        })
    }

    /// Load all scenarios from a file or, recursively, a directory.
    ///
    /// Files are read in sorted path order so runs are reproducible.
    pub fn load_all(path: &Path) -> HarnessResult<Vec<Self>> {
        if path.is_file() {
            return Self::from_file(path);
        }
        if !path.is_dir() {
            return Err(HarnessError::ScenarioParse(format!(
                "No such scenario file or directory: {}",
                path.display()
            )));
        }

        let mut scenarios = Vec::new();
        for entry in walkdir::WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_type().is_file()
                    && e.path()
                        .extension()
                        .map(|ext| ext == "yaml" || ext == "yml")
                        .unwrap_or(false)
            })
        {
            scenarios.extend(Self::from_file(entry.path())?);
        }

        Ok(scenarios)
    }

    /// Reject duplicate names and empty scenarios
    pub fn validate_all(scenarios: &[Self]) -> HarnessResult<()> {
        let mut seen = std::collections::HashSet::new();
        for scenario in scenarios {
            if scenario.name.trim().is_empty() {
                return Err(HarnessError::ScenarioParse("Scenario with empty name".into()));
            }
            if !seen.insert(scenario.name.as_str()) {
                return Err(HarnessError::ScenarioParse(format!(
                    "Duplicate scenario name: {}",
                    scenario.name
                )));
            }
            if scenario.expectations.is_empty() && scenario.artifacts.is_empty() {
                return Err(HarnessError::ScenarioParse(format!(
                    "Scenario '{}' has neither expectations nor artifacts",
                    scenario.name
                )));
            }
        }
        Ok(())
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(scenarios: &'a [Self], tag: &str) -> Vec<&'a Self> {
        scenarios
            .iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect()
    }
}
