//! Clearing the extract, export and output roots.
//!
//! Cleaning removes every file under the selected root except those whose
//! path contains one of the root's `excludeClean` sequences, then prunes the
//! directories that were left empty.

use crate::error::{InstallError, InstallResult};
use crate::fs_ops::{self, DeleteStats};
use crate::ruleset::RuleSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Which root of a [`RuleSet`] to clean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanTarget {
    Extract,
    Export,
    Output,
}

impl CleanTarget {
    pub const ALL: [CleanTarget; 3] = [CleanTarget::Extract, CleanTarget::Export, CleanTarget::Output];
}

impl fmt::Display for CleanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CleanTarget::Extract => "extract",
            CleanTarget::Export => "export",
            CleanTarget::Output => "output",
        };
        write!(f, "{}", name)
    }
}

/// Cleans one root of `rules`.
///
/// An unset or missing root is not an error; there is nothing to clean.
///
/// # Errors
///
/// Returns `InstallError::Clean` if a file or directory cannot be removed.
pub fn clean_root(rules: &RuleSet, target: CleanTarget) -> InstallResult<DeleteStats> {
    let root = rules.root(target);
    if root.trim().is_empty() {
        debug!(%target, "Root not configured, nothing to clean");
        return Ok(DeleteStats::default());
    }

    let path = PathBuf::from(&root);
    if !fs_ops::exists(&path) {
        debug!(%target, path = %path.display(), "Root does not exist, nothing to clean");
        return Ok(DeleteStats::default());
    }

    clean_path(&path, rules.exclude_clean(target), target)
}

fn clean_path(
    path: &Path,
    keep: Vec<Vec<String>>,
    target: CleanTarget,
) -> InstallResult<DeleteStats> {
    let to_error = |source| InstallError::Clean {
        target,
        path: path.to_path_buf(),
        source,
    };

    let mut stats = fs_ops::delete_tree(path, fs_ops::keep_matching(keep)).map_err(to_error)?;
    stats.dirs_removed = fs_ops::delete_empty_dirs(path).map_err(to_error)?;

    debug!(
        %target,
        path = %path.display(),
        removed = stats.files_removed,
        kept = stats.files_kept,
        "Cleaned root"
    );
    Ok(stats)
}

/// Result of cleaning one root of one package.
#[derive(Debug)]
pub struct CleanOutcome {
    pub package: String,
    pub target: CleanTarget,
    pub result: InstallResult<DeleteStats>,
}

/// Everything a [`clean_all`] call did.
#[derive(Debug, Default)]
pub struct CleanReport {
    pub outcomes: Vec<CleanOutcome>,
}

impl CleanReport {
    pub fn files_removed(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(|s| s.files_removed)
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CleanOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn is_complete_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Cleans `targets` for every rule set, in order. Failures are collected,
/// never short-circuited.
pub fn clean_all(rule_sets: &[RuleSet], targets: &[CleanTarget]) -> CleanReport {
    let mut report = CleanReport::default();

    for rules in rule_sets {
        for &target in targets {
            let result = clean_root(rules, target);
            if let Err(e) = &result {
                error!(package = %rules.label(), %target, error = %e, "Failed to clean");
            }
            report.outcomes.push(CleanOutcome {
                package: rules.label(),
                target,
                result,
            });
        }
    }

    info!(removed = report.files_removed(), "Clean finished");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ruleset::RootInfo;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().expect("has parent")).expect("Failed to create dirs");
        fs::write(path, "x").expect("Failed to write file");
    }

    fn rules_in(temp: &TempDir) -> RuleSet {
        let root = temp.path().to_string_lossy().to_string();
        RuleSet {
            source: format!("{root}/mods"),
            output: RootInfo::new(format!("{root}/output")),
            extract: RootInfo::new(format!("{root}/extract")),
            ..RuleSet::default()
        }
    }

    #[test]
    fn test_clean_extract_removes_package_dirs() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let rules = rules_in(&temp);
        touch(&temp.path().join("extract/pkg1/main.xml"));

        let stats = clean_root(&rules, CleanTarget::Extract).expect("clean succeeds");

        assert_eq!(stats.files_removed, 1);
        assert!(!temp.path().join("extract/pkg1").exists());
        assert!(temp.path().join("extract").exists());
    }

    #[test]
    fn test_clean_keeps_exclude_clean_matches() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let mut rules = rules_in(&temp);
        rules.output.exclude_clean = vec![vec!["{output}".to_string(), "saves".to_string()]];
        touch(&temp.path().join("output/saves/slot.sav"));
        touch(&temp.path().join("output/mod/main.xml"));
        touch(&temp.path().join("output/mod/saves/nested.sav"));

        let stats = clean_root(&rules, CleanTarget::Output).expect("clean succeeds");

        assert_eq!(stats.files_kept, 1);
        assert_eq!(stats.files_removed, 2);
        assert!(temp.path().join("output/saves/slot.sav").exists());
        assert!(!temp.path().join("output/mod").exists());
    }

    #[test]
    fn test_clean_unset_export_is_noop() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let rules = rules_in(&temp);

        let stats = clean_root(&rules, CleanTarget::Export).expect("clean succeeds");

        assert_eq!(stats, DeleteStats::default());
    }

    #[test]
    fn test_clean_missing_root_is_noop() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let rules = rules_in(&temp);
        assert!(clean_root(&rules, CleanTarget::Output).is_ok());
    }

    #[test]
    fn test_clean_all_collects_every_target() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let rules = rules_in(&temp);
        touch(&temp.path().join("extract/a/file"));
        touch(&temp.path().join("output/a/file"));

        let report = clean_all(&[rules.clone(), rules], &CleanTarget::ALL);

        assert_eq!(report.outcomes.len(), 6);
        assert_eq!(report.files_removed(), 2);
        assert!(report.is_complete_success());
    }
}
