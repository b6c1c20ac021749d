//! List scenarios without running them

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

use mockcheck_harness::Scenario;

use crate::output::{print_list, OutputFormat, TableDisplay};
use crate::settings::load_scenarios;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Scenario files or directories
    #[arg(required = true)]
    pub scenarios: Vec<PathBuf>,

    /// Only list scenarios with this tag
    #[arg(short, long)]
    pub tag: Option<String>,
}

/// Scenario display wrapper for serialization
#[derive(Serialize)]
pub struct ScenarioDisplay {
    pub name: String,
    pub fixture: String,
    pub tags: Vec<String>,
    pub expectations: usize,
    pub stage_steps: usize,
    pub artifacts: usize,
}

impl From<&Scenario> for ScenarioDisplay {
    fn from(scenario: &Scenario) -> Self {
        Self {
            name: scenario.name.clone(),
            fixture: scenario.fixture.to_string(),
            tags: scenario.tags.clone(),
            expectations: scenario.expectations.len(),
            stage_steps: scenario.stage.len(),
            artifacts: scenario.artifacts.len(),
        }
    }
}

impl TableDisplay for ScenarioDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Fixture", "Tags", "Expectations", "Stage", "Artifacts"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.fixture.clone(),
            self.tags.join(", "),
            self.expectations.to_string(),
            self.stage_steps.to_string(),
            self.artifacts.to_string(),
        ]
    }
}

pub fn execute(args: ListArgs, format: OutputFormat) -> Result<ExitCode> {
    let scenarios = load_scenarios(&args.scenarios, args.tag.as_deref(), None)?;
    let items: Vec<ScenarioDisplay> = scenarios.iter().map(ScenarioDisplay::from).collect();
    print_list(&items, format);
    Ok(ExitCode::SUCCESS)
}
