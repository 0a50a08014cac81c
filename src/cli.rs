//! Command-line interface for modpipe.
//!
//! This module handles:
//! - Argument parsing
//! - Configuration loading (a starter file is written when none exists)
//! - Starting a run or a clean and waiting for it with a spinner
//! - Printing the summary

use crate::archive::{DefaultArchiver, SevenZip};
use crate::cleaner::CleanTarget;
use crate::config::{ConfigError, ModConfig};
use crate::copier::Copier;
use crate::orchestrator::Orchestrator;
use crate::output::OutputFormatter;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Extract mod archives and route their files into place.
#[derive(Debug, Parser)]
#[command(name = "modpipe", version, about)]
pub struct Cli {
    /// Configuration file (.json, .jsonc, .toml) or a directory of them
    #[arg(short, long, default_value = "modpipe.jsonc")]
    pub config: PathBuf,

    /// Directory containing the 7z executable
    #[arg(long, value_name = "DIR")]
    pub bin: Option<PathBuf>,

    /// Also append log output to this file
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Clean the extract roots instead of running
    #[arg(long)]
    pub clean_extract: bool,

    /// Clean the export roots instead of running
    #[arg(long)]
    pub clean_export: bool,

    /// Clean the output roots instead of running
    #[arg(long)]
    pub clean_output: bool,
}

impl Cli {
    /// Targets selected by the `--clean-*` flags, in cleaning order.
    pub fn clean_targets(&self) -> Vec<CleanTarget> {
        [
            (self.clean_extract, CleanTarget::Extract),
            (self.clean_export, CleanTarget::Export),
            (self.clean_output, CleanTarget::Output),
        ]
        .into_iter()
        .filter_map(|(selected, target)| selected.then_some(target))
        .collect()
    }
}

/// Runs the command described by `cli`.
///
/// Package failures are reported but do not make this function fail; only
/// an unreadable configuration does.
///
/// # Errors
///
/// Returns the `ConfigError` if the configuration cannot be loaded.
///
/// # Example
///
/// ```no_run
/// use clap::Parser;
/// use modpipe::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["modpipe", "--config", "modpipe.jsonc"]);
/// if let Err(e) = run_cli(&cli) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(cli: &Cli) -> Result<(), ConfigError> {
    let config = ModConfig::load_or_init(&cli.config)?;
    if config.mods.is_empty() {
        OutputFormatter::warning(&format!(
            "No packages configured in {}",
            cli.config.display()
        ));
        return Ok(());
    }

    let archiver = Arc::new(DefaultArchiver::new(SevenZip::locate(cli.bin.as_deref())));
    let orchestrator = Orchestrator::new(archiver, Copier::default());

    let targets = cli.clean_targets();
    if targets.is_empty() {
        OutputFormatter::info(&format!("Installing {} package(s)", config.mods.len()));
        let spinner = OutputFormatter::spinner("Installing");
        let done = spinner.clone();
        orchestrator.register_run_update(Arc::new(move || -> anyhow::Result<()> {
            done.finish_and_clear();
            Ok(())
        }));

        match orchestrator.run(config.mods) {
            Ok(handle) => {
                if let Some(report) = wait(handle) {
                    OutputFormatter::run_summary(&report);
                    if report.failed_packages() == 0 {
                        OutputFormatter::success("All packages installed");
                    }
                }
            }
            Err(e) => OutputFormatter::error(&e.to_string()),
        }
        spinner.finish_and_clear();
    } else {
        let spinner = OutputFormatter::spinner("Cleaning");
        let done = spinner.clone();
        orchestrator.register_clean_update(Arc::new(move || -> anyhow::Result<()> {
            done.finish_and_clear();
            Ok(())
        }));

        match orchestrator.clean(config.mods, targets) {
            Ok(handle) => {
                if let Some(report) = wait(handle) {
                    OutputFormatter::clean_summary(&report);
                }
            }
            Err(e) => OutputFormatter::error(&e.to_string()),
        }
        spinner.finish_and_clear();
    }

    Ok(())
}

fn wait<T>(handle: JoinHandle<T>) -> Option<T> {
    match handle.join() {
        Ok(report) => Some(report),
        Err(_) => {
            OutputFormatter::error("Background task panicked");
            None
        }
    }
}
