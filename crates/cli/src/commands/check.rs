//! Resolve every fixture without launching a browser

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

use mockcheck_harness::FixtureLocator;

use crate::output::{print_list, OutputFormat, TableDisplay};
use crate::settings::{load_scenarios, SettingsArgs};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Scenario files or directories
    #[arg(required = true)]
    pub scenarios: Vec<PathBuf>,

    /// Only check scenarios with this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    #[command(flatten)]
    pub settings: SettingsArgs,
}

#[derive(Serialize)]
pub struct FixtureCheck {
    pub scenario: String,
    pub fixture: String,
    pub ok: bool,
    pub detail: String,
}

impl TableDisplay for FixtureCheck {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "Fixture", "OK", "Resolved"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.scenario.clone(),
            self.fixture.clone(),
            if self.ok { "✓" } else { "✗" }.to_string(),
            self.detail.clone(),
        ]
    }
}

pub fn execute(args: CheckArgs, format: OutputFormat) -> Result<ExitCode> {
    let config = args.settings.resolve(&args.scenarios)?;
    let scenarios = load_scenarios(&args.scenarios, args.tag.as_deref(), None)?;
    let locator = FixtureLocator::new(&config.base_dir)?;
    debug!("Resolving fixtures against {}", locator.base_dir().display());

    let checks: Vec<FixtureCheck> = scenarios
        .iter()
        .map(|scenario| {
            let (ok, detail) = match locator.resolve(&scenario.fixture) {
                Ok(uri) => (true, uri.uri),
                Err(e) => (false, e.to_string()),
            };
            FixtureCheck {
                scenario: scenario.name.clone(),
                fixture: scenario.fixture.to_string(),
                ok,
                detail,
            }
        })
        .collect();

    print_list(&checks, format);

    Ok(if checks.iter().all(|c| c.ok) {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
