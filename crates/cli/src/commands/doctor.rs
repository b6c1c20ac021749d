//! Environment diagnostics

use anyhow::Result;
use clap::Args;
use std::process::ExitCode;

use mockcheck_harness::session::playwright::PlaywrightLauncher;

use crate::output::{print_error, print_success};

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Node.js executable hosting Playwright
    #[arg(long, env = "MOCKCHECK_NODE", default_value = "node")]
    pub node: String,
}

pub async fn execute(args: DoctorArgs) -> Result<ExitCode> {
    match PlaywrightLauncher::check_installed(&args.node).await {
        Ok(version) => {
            print_success(&format!("node {} with playwright is available", version));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            print_error(&e.to_string());
            Ok(ExitCode::from(2))
        }
    }
}
