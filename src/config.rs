//! Loading and writing package configuration.
//!
//! A configuration holds the list of package rule sets under `mods`. Three
//! file formats are accepted, chosen by extension:
//! - `.json`
//! - `.jsonc` (JSON with `//` and `/* */` comments)
//! - `.toml`
//!
//! Pointing the loader at a directory loads every supported file inside it,
//! in file-name order, and concatenates their packages.
//!
//! # Configuration File Format
//!
//! ```jsonc
//! {
//!   "mods": [
//!     {
//!       "mods": "mods",                       // directory holding archives
//!       "output": {"path": "output", "excludeClean": [["{output}", "saves"]]},
//!       "extract": {"path": "extract"},
//!       "export": {"path": ""},
//!       "expects": [{"path": ["main.xml"], "require": [], "exclusive": false, "base": 0}]
//!     }
//!   ]
//! }
//! ```

use crate::ruleset::{Expect, RootInfo, RuleSet};
use json_comments::StripComments;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while reading or writing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error on configuration {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration {}: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },

    #[error("Unsupported configuration format: {} (expected .json, .jsonc or .toml)", .0.display())]
    UnsupportedFormat(PathBuf),
}

/// On-disk configuration formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Toml,
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" | "jsonc" => Some(Format::Json),
            "toml" => Some(Format::Toml),
            _ => None,
        }
    }
}

/// The full set of packages to install.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModConfig {
    pub mods: Vec<RuleSet>,
}

impl ModConfig {
    /// Loads configuration from a file or a directory of files.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if `path` does not exist,
    /// `ConfigError::UnsupportedFormat` for a file with an unknown extension,
    /// `ConfigError::Invalid` if parsing fails and `ConfigError::Io` if a
    /// file cannot be read.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        if path.is_dir() {
            return Self::load_dir(path);
        }
        Self::load_file(path)
    }

    /// Like [`ModConfig::load`], but writes [`ModConfig::starter`] to `path`
    /// first when nothing exists there.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            Self::starter().save(path)?;
            info!(path = %path.display(), "Wrote default configuration");
        }
        Self::load(path)
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let format =
            Format::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config = Self::parse(&content, format).map_err(|reason| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason,
        })?;
        debug!(path = %path.display(), packages = config.mods.len(), "Loaded configuration");
        Ok(config)
    }

    fn load_dir(dir: &Path) -> Result<Self, ConfigError> {
        let io_error = |e| ConfigError::Io {
            path: dir.to_path_buf(),
            source: e,
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.is_file() && Format::from_path(&path).is_some() {
                files.push(path);
            }
        }
        files.sort();

        let mut config = Self::default();
        for file in &files {
            config.mods.extend(Self::load_file(file)?.mods);
        }
        Ok(config)
    }

    /// Parses configuration text in the given format.
    pub fn parse(content: &str, format: Format) -> Result<Self, String> {
        match format {
            Format::Json => serde_json::from_reader(StripComments::new(content.as_bytes()))
                .map_err(|e| e.to_string()),
            Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        }
    }

    /// Writes this configuration to `path` in the format its extension names.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let format =
            Format::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
        let invalid = |reason: String| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason,
        };
        let content = match format {
            Format::Json => serde_json::to_string_pretty(self).map_err(|e| invalid(e.to_string()))?,
            Format::Toml => toml::to_string_pretty(self).map_err(|e| invalid(e.to_string()))?,
        };

        let io_error = |e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(path, content).map_err(io_error)
    }

    /// A single-package configuration to start from.
    pub fn starter() -> Self {
        let keep = vec![
            vec!["{output}".to_string(), "saves".to_string()],
            vec!["{output}".to_string(), "logs".to_string()],
        ];
        Self {
            mods: vec![RuleSet {
                source: "mods".to_string(),
                output: RootInfo {
                    path: "output".to_string(),
                    exclude_clean: keep,
                },
                extract: RootInfo::new("extract"),
                export: RootInfo::new(""),
                expects: vec![Expect::marker(&["mod.txt"]), Expect::marker(&["main.xml"])],
                ..RuleSet::default()
            }],
        }
    }
}
