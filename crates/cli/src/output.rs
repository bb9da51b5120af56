//! Output formatting utilities
//!
//! Status output goes to stderr so stdout carries only the controller list.

use clap::ValueEnum;
use colored::Colorize;
use std::io::{self, IsTerminal, Write};
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};
use unmount_lib::{BatchReport, ControllerRef, ScaleOutcome, WaitHandle, WaitOutcome};

/// Log output format
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines (default)
    #[default]
    Text,
    /// JSON lines
    Json,
}

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Row for the scale-down summary table
#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Result")]
    result: String,
}

/// Print an informational message
pub fn print_info(message: &str) {
    eprintln!("{}", message.bright_cyan());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message.bright_yellow());
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.bright_red());
}

/// Print an error raised while the spinner may be drawn
pub fn print_wait_error(message: &str) {
    let mut stderr = io::stderr();
    let animate = stderr.is_terminal();
    let _ = write_over_spinner(&mut stderr, animate, message);
}

/// Write an error line, first erasing the spinner line when it is animated
fn write_over_spinner(out: &mut dyn Write, animate: bool, message: &str) -> io::Result<()> {
    if animate {
        write!(out, "\r\x1b[2K")?;
    }
    writeln!(out, "{} {}", "✗".red().bold(), message.bright_red())?;
    out.flush()
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green().bold(), message);
}

/// Print a prompt without a trailing newline
pub fn print_prompt(message: &str) {
    eprint!("\n{}", message.bright_white());
    let _ = io::stderr().flush();
}

/// Write one canonical `kind/namespace/name` line per controller
pub fn write_controllers(out: &mut dyn Write, controllers: &[ControllerRef]) -> io::Result<()> {
    for ctrl in controllers {
        writeln!(out, "{}", ctrl)?;
    }
    out.flush()
}

/// Color an outcome for the summary table
pub fn color_outcome(outcome: &ScaleOutcome) -> String {
    let text = outcome.to_string();
    match outcome {
        ScaleOutcome::Scaled { .. } | ScaleOutcome::Deleted => text.green().to_string(),
        ScaleOutcome::AlreadyScaledDown | ScaleOutcome::DryRun => text.blue().to_string(),
        ScaleOutcome::Skipped { .. } => text.yellow().to_string(),
    }
}

/// Render the per-controller summary of a batch
pub fn report_table(report: &BatchReport) -> String {
    let rows: Vec<ResultRow> = report
        .results()
        .iter()
        .map(|(ctrl, result)| ResultRow {
            kind: ctrl.kind.to_string(),
            namespace: ctrl.namespace.clone(),
            name: ctrl.name.clone(),
            result: match result {
                Ok(outcome) => color_outcome(outcome),
                Err(_) => "failed".red().to_string(),
            },
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print the batch summary and each failure on stderr
pub fn print_report(report: &BatchReport) {
    if report.results().is_empty() {
        return;
    }
    eprintln!("{}", report_table(report));
    for (_, err) in report.failures() {
        print_error(&err.to_string());
    }
}

/// Animate a spinner on stderr until the wait finishes
///
/// The spinner is only drawn when stderr is a terminal.
pub async fn spin_until(label: &str, handle: WaitHandle) -> WaitOutcome {
    let animate = io::stderr().is_terminal();
    let done = handle.wait();
    tokio::pin!(done);

    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    let mut frame = 0usize;
    let outcome = loop {
        tokio::select! {
            outcome = &mut done => break outcome,
            _ = ticker.tick(), if animate => {
                eprint!("\r{}{}", label, SPINNER_FRAMES[frame % SPINNER_FRAMES.len()].cyan());
                let _ = io::stderr().flush();
                frame += 1;
            }
        }
    };

    if animate {
        eprint!("\r{}\r", " ".repeat(label.chars().count() + 2));
    }
    outcome
}
