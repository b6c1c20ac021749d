//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use mockcheck_harness::report::ArtifactOutcome;
use mockcheck_harness::{Outcome, RunSummary, ScenarioStatus};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() && !matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        println!("No scenarios found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(items).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

/// Print the result of a run
pub fn print_summary(summary: &RunSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(summary).unwrap_or_default());
        }
        OutputFormat::Plain => print!("{}", summary.render_text()),
        OutputFormat::Table => print_summary_table(summary),
    }
}

fn print_summary_table(summary: &RunSummary) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Scenario", "Status", "Check", "Result"]);

    for scenario in &summary.scenarios {
        let status = Cell::new(scenario.status.as_str()).fg(status_color(scenario.status));
        let mut rows: Vec<(String, String)> = Vec::new();

        for result in &scenario.expectations {
            let detail = match &result.outcome {
                Outcome::Pass => "pass".to_string(),
                Outcome::Fail(reason) => format!("FAIL: {}", reason),
            };
            rows.push((result.expectation.to_string(), detail));
        }
        for artifact in &scenario.artifacts {
            let check = format!("capture {}", artifact.spec.output_path.display());
            let detail = match &artifact.outcome {
                ArtifactOutcome::Captured(c) => format!("{} ({}x{})", c.path.display(), c.width, c.height),
                ArtifactOutcome::Skipped { reason } => format!("skipped: {}", reason),
                ArtifactOutcome::Failed { reason } => format!("FAILED: {}", reason),
            };
            rows.push((check, detail));
        }
        if let Some(fault) = &scenario.error {
            rows.push(("error".to_string(), fault.message.clone()));
        }
        if rows.is_empty() {
            rows.push((String::new(), String::new()));
        }

        for (i, (check, detail)) in rows.into_iter().enumerate() {
            if i == 0 {
                table.add_row(vec![
                    Cell::new(&scenario.name),
                    status.clone(),
                    Cell::new(check),
                    Cell::new(detail),
                ]);
            } else {
                table.add_row(vec![Cell::new(""), Cell::new(""), Cell::new(check), Cell::new(detail)]);
            }
        }
    }

    println!("{table}");
    println!("{}", summary_line(summary));
}

/// One-line tally with assertion and infrastructure failures kept apart
pub fn summary_line(summary: &RunSummary) -> String {
    let line = format!(
        "{} passed, {} assertion failed, {} infrastructure failed, {} timed out ({} ms)",
        summary.passed(),
        summary.count(ScenarioStatus::AssertionFailed),
        summary.count(ScenarioStatus::InfrastructureFailed),
        summary.count(ScenarioStatus::TimedOut),
        summary.duration_ms
    );
    if summary.success() {
        format!("{} {}", "✓".green().bold(), line)
    } else {
        format!("{} {}", "✗".red().bold(), line)
    }
}

fn status_color(status: ScenarioStatus) -> Color {
    match status {
        ScenarioStatus::Passed => Color::Green,
        ScenarioStatus::AssertionFailed => Color::Red,
        ScenarioStatus::InfrastructureFailed | ScenarioStatus::TimedOut => Color::Yellow,
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "Error:".red().bold(), message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "!".yellow().bold(), message);
}
