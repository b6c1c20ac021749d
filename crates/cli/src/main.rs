//! MockCheck CLI - Main Entry Point
//!
//! Loads HTML fixtures in a headless browser, verifies declared element
//! and style expectations, and captures screenshots.

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use mockcheck_cli::commands::{check, doctor, list, run};
use mockcheck_cli::output::{self, OutputFormat};

/// MockCheck - fixture verification harness
#[derive(Parser)]
#[command(name = "mockcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios and report results
    Run(run::RunArgs),

    /// List scenarios without running them
    List(list::ListArgs),

    /// Resolve every scenario fixture without a browser
    Check(check::CheckArgs),

    /// Check that node and Playwright are available
    Doctor(doctor::DoctorArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for results
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    let result = match cli.command {
        Commands::Run(args) => run::execute(args, cli.format).await,
        Commands::List(args) => list::execute(args, cli.format),
        Commands::Check(args) => check::execute(args, cli.format),
        Commands::Doctor(args) => doctor::execute(args).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}
