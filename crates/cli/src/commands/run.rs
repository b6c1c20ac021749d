//! Run scenarios against the browser

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use mockcheck_harness::ScenarioRunner;

use crate::output::{print_summary, print_warning, OutputFormat};
use crate::settings::{load_scenarios, SettingsArgs};

const RESULTS_FILE_NAME: &str = "results.json";

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario files or directories
    #[arg(required = true)]
    pub scenarios: Vec<PathBuf>,

    /// Only run scenarios with this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Only run the scenario with this name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Where to write the full results as JSON [default: <output-dir>/results.json]
    #[arg(long, value_name = "PATH", conflicts_with = "no_results")]
    pub results_file: Option<PathBuf>,

    /// Do not write a results file
    #[arg(long)]
    pub no_results: bool,

    #[command(flatten)]
    pub settings: SettingsArgs,
}

impl RunArgs {
    fn results_path(&self, output_dir: &Path) -> Option<PathBuf> {
        if self.no_results {
            return None;
        }
        Some(
            self.results_file
                .clone()
                .unwrap_or_else(|| output_dir.join(RESULTS_FILE_NAME)),
        )
    }
}

pub async fn execute(args: RunArgs, format: OutputFormat) -> Result<ExitCode> {
    let config = args.settings.resolve(&args.scenarios)?;
    let scenarios = load_scenarios(&args.scenarios, args.tag.as_deref(), args.name.as_deref())?;

    if scenarios.is_empty() {
        print_warning("No scenarios matched");
        return Ok(ExitCode::SUCCESS);
    }

    let results_path = args.results_path(&config.output_dir);

    let runner = ScenarioRunner::new(config).context("Failed to set up scenario runner")?;
    let summary = runner.run(&scenarios).await;

    print_summary(&summary, format);

    if let Some(path) = results_path {
        summary
            .write_json(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    Ok(if summary.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
