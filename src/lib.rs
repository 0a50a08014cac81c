//! modpipe - extract archived mod packages and route their files into place
//!
//! Each configured package names a directory of archives and a set of
//! declarative rules. A run unpacks every archive into a scratch tree, then
//! classifies the extracted files and copies them into an output tree:
//! - [`ruleset`] holds the per-package rules and placeholder resolution
//! - [`classifier`] decides where each extracted file goes
//! - [`copier`] performs copies behind a denylist of dangerous targets
//! - [`runner`] and [`cleaner`] are the two background activities, started
//!   through the [`orchestrator`]

pub mod activity;
pub mod archive;
pub mod classifier;
pub mod cleaner;
pub mod cli;
pub mod config;
pub mod copier;
pub mod error;
pub mod fs_ops;
pub mod orchestrator;
pub mod output;
pub mod ruleset;
pub mod runner;
pub mod segments;

pub use archive::{Archiver, DefaultArchiver, SevenZip, ZipArchiver};
pub use classifier::{ClassifyReport, Classifier};
pub use cleaner::{CleanReport, CleanTarget};
pub use config::{ConfigError, ModConfig};
pub use copier::{Copier, PathCheck};
pub use error::{InstallError, InstallResult, OrchestratorError};
pub use orchestrator::Orchestrator;
pub use ruleset::RuleSet;
pub use runner::{RunReport, run_rule_sets};

pub use cli::{Cli, run_cli};
