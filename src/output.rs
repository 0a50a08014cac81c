//! Console output for the `modpipe` binary.
//!
//! Logging goes through `tracing`; this module only renders what the user is
//! meant to read at the terminal:
//! - status lines (✓ / ✗ / ⚠)
//! - a spinner while a background run or clean is in progress
//! - per-package summary tables

use crate::cleaner::CleanReport;
use crate::runner::{PackageReport, RunReport};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use modpipe::output::OutputFormatter;
    /// OutputFormatter::success("Installed 3 packages");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message to stderr in red.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a ticking spinner showing `message`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use modpipe::output::OutputFormatter;
    /// let spinner = OutputFormatter::spinner("Installing");
    /// spinner.finish_and_clear();
    /// ```
    pub fn spinner(message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} [{elapsed}]")
                .expect("Invalid spinner template"),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Prints one row per package followed by run totals.
    pub fn run_summary(report: &RunReport) {
        Self::header(&format!(
            "RUN SUMMARY (started {})",
            report.started_at.format("%Y-%m-%d %H:%M:%S")
        ));

        let width = report
            .packages
            .iter()
            .map(|p| p.package.len())
            .max()
            .unwrap_or(0)
            .max(7);

        println!(
            "{:<width$} | {:>8} | {:>6} | {}",
            "Package".bold(),
            "Archives".bold(),
            "Files".bold(),
            "Status".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 40));

        for package in &report.packages {
            let files = package
                .outcome
                .as_ref()
                .map(|r| r.files_copied())
                .unwrap_or(0);
            println!(
                "{:<width$} | {:>8} | {:>6} | {}",
                package.package,
                package.archives,
                files,
                Self::status(package),
                width = width
            );
        }

        println!("{}", "-".repeat(width + 40));
        println!(
            "{:<width$} | {:>8} | {:>6} | {:.1?}",
            "Total".bold(),
            report.packages.iter().map(|p| p.archives).sum::<usize>(),
            report.files_copied().to_string().green().bold(),
            report.elapsed,
            width = width
        );

        for package in &report.packages {
            match &package.outcome {
                Ok(classified) => {
                    for name in &classified.unmatched {
                        Self::warning(&format!("{}: no rule matched '{}'", package.package, name));
                    }
                    for failure in &classified.failures {
                        Self::error(&format!("{}: {}", package.package, failure));
                    }
                }
                Err(e) => Self::error(&format!("{}: {}", package.package, e)),
            }
        }
    }

    fn status(package: &PackageReport) -> ColoredString {
        match &package.outcome {
            Err(_) => "failed".red(),
            Ok(r) if !r.failures.is_empty() => format!("{} errors", r.failures.len()).yellow(),
            Ok(_) => "ok".green(),
        }
    }

    pub fn clean_summary(report: &CleanReport) {
        Self::header("CLEAN SUMMARY");

        for outcome in &report.outcomes {
            match &outcome.result {
                Ok(stats) => println!(
                    "  {} [{}]: {} removed, {} kept",
                    outcome.package,
                    outcome.target,
                    stats.files_removed.to_string().green(),
                    stats.files_kept
                ),
                Err(e) => Self::error(&format!("{} [{}]: {}", outcome.package, outcome.target, e)),
            }
        }

        let removed = report.files_removed();
        println!(
            "Total: {} {} removed",
            removed.to_string().green().bold(),
            if removed == 1 { "file" } else { "files" }
        );
    }
}
