//! Sequential install of every configured package.
//!
//! For each [`RuleSet`], in load order:
//! 1. clean its output root (each distinct output root is cleaned once per
//!    run, before the first package that writes to it)
//! 2. clean its extract root and unpack every archive from its source root
//!    straight into it, so each top-level folder an archive carries becomes
//!    one sub-package
//! 3. classify the extracted tree
//!
//! A failing package is logged and recorded; the remaining packages still run.
//! When the run is given the cleaner's [`Activity`], that activity reads as
//! busy for the duration of each clean step.

use crate::activity::{Activity, timed};
use crate::archive::Archiver;
use crate::classifier::{ClassifyReport, Classifier};
use crate::cleaner::{CleanTarget, clean_root};
use crate::copier::Copier;
use crate::error::{InstallError, InstallResult};
use crate::fs_ops::{self, DeleteStats};
use crate::ruleset::RuleSet;
use crate::segments::SegmentPath;
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Collaborators a run needs.
pub struct RunContext<'a> {
    pub archiver: &'a dyn Archiver,
    pub copier: &'a Copier,
    /// Held without notifying while a root is being cleaned.
    pub cleaner: Option<&'a Arc<Activity>>,
}

/// What happened to one package.
#[derive(Debug)]
pub struct PackageReport {
    pub package: String,
    pub archives: usize,
    pub elapsed: Duration,
    pub outcome: InstallResult<ClassifyReport>,
}

impl PackageReport {
    pub fn is_success(&self) -> bool {
        self.outcome
            .as_ref()
            .is_ok_and(|report| report.failures.is_empty())
    }
}

/// Everything a [`run_rule_sets`] call did.
#[derive(Debug)]
pub struct RunReport {
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
    pub packages: Vec<PackageReport>,
}

impl RunReport {
    pub fn failed_packages(&self) -> usize {
        self.packages.iter().filter(|p| !p.is_success()).count()
    }

    pub fn files_copied(&self) -> usize {
        self.packages
            .iter()
            .filter_map(|p| p.outcome.as_ref().ok())
            .map(ClassifyReport::files_copied)
            .sum()
    }
}

/// Installs every package in `rule_sets`.
pub fn run_rule_sets(rule_sets: &[RuleSet], ctx: &RunContext<'_>) -> RunReport {
    let started_at = Local::now();
    let started = Instant::now();
    let mut cleaned_outputs = HashSet::new();
    let mut packages = Vec::with_capacity(rule_sets.len());

    for rules in rule_sets {
        let package = rules.label();
        let mut archives = 0;
        let (outcome, elapsed) = timed(&package, || {
            install_package(rules, ctx, &mut cleaned_outputs, &mut archives)
        });

        match &outcome {
            Ok(report) => {
                for failure in &report.failures {
                    warn!(package = %package, error = %failure, "Package installed with errors");
                }
            }
            Err(e) => error!(package = %package, error = %e, "Package failed"),
        }

        packages.push(PackageReport {
            package,
            archives,
            elapsed,
            outcome,
        });
    }

    let report = RunReport {
        started_at,
        elapsed: started.elapsed(),
        packages,
    };
    info!(
        packages = report.packages.len(),
        failed = report.failed_packages(),
        files = report.files_copied(),
        "Run finished"
    );
    report
}

fn install_package(
    rules: &RuleSet,
    ctx: &RunContext<'_>,
    cleaned_outputs: &mut HashSet<String>,
    archives: &mut usize,
) -> InstallResult<ClassifyReport> {
    rules.validate()?;

    let output_key = SegmentPath::parse(&rules.root(CleanTarget::Output)).to_string();
    if cleaned_outputs.insert(output_key) {
        clean_phase(rules, CleanTarget::Output, ctx)?;
    }
    clean_phase(rules, CleanTarget::Extract, ctx)?;

    *archives = extract_archives(rules, ctx.archiver)?;
    Classifier::new(rules, ctx.copier).classify()
}

fn clean_phase(
    rules: &RuleSet,
    target: CleanTarget,
    ctx: &RunContext<'_>,
) -> InstallResult<DeleteStats> {
    let _cleaning = ctx.cleaner.and_then(|cleaner| cleaner.try_hold());
    clean_root(rules, target)
}

/// Unpacks every file under the source root into the extract root.
///
/// Archives are unpacked into the root itself, so an archive bundling
/// several mod folders yields one sub-package per folder, and archives that
/// share a file name do not collide. The first failure aborts.
pub fn extract_archives(rules: &RuleSet, archiver: &dyn Archiver) -> InstallResult<usize> {
    let source = rules.source_root();
    let extract_root = PathBuf::from(rules.root(CleanTarget::Extract));

    let archives = fs_ops::list_files(&source).map_err(|e| InstallError::Walk {
        path: source.clone(),
        source: e,
    })?;

    info!(source = %source.display(), destination = %extract_root.display(), count = archives.len(), "Extracting");
    for archive_path in &archives {
        archiver
            .extract(archive_path, &extract_root)
            .map_err(|e| InstallError::Extract {
                archive: archive_path.clone(),
                destination: extract_root.clone(),
                source: e,
            })?;
    }

    Ok(archives.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArchiveError;
    use crate::ruleset::{Expect, RootInfo};
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Copies the archive file's lines out as `name=content` files.
    struct FakeArchiver {
        calls: Mutex<Vec<PathBuf>>,
    }

    impl FakeArchiver {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl Archiver for FakeArchiver {
        fn extract(&self, archive: &Path, destination: &Path) -> Result<(), ArchiveError> {
            self.calls.lock().expect("lock").push(archive.to_path_buf());
            let body = fs::read_to_string(archive).map_err(|e| ArchiveError::Io {
                path: archive.to_path_buf(),
                source: e,
            })?;
            if body == "broken" {
                return Err(ArchiveError::Failed {
                    program: PathBuf::from("fake"),
                    code: Some(2),
                });
            }
            for line in body.lines() {
                let (name, content) = line.split_once('=').unwrap_or((line, ""));
                let path = destination.join(name);
                fs::create_dir_all(path.parent().expect("has parent")).expect("mkdir");
                fs::write(path, content).expect("write");
            }
            Ok(())
        }
    }

    /// Records whether the cleaner was busy while archives were unpacked.
    struct CleanerAwareArchiver {
        cleaner: Arc<Activity>,
        inner: FakeArchiver,
        cleaning_seen: AtomicBool,
    }

    impl Archiver for CleanerAwareArchiver {
        fn extract(&self, archive: &Path, destination: &Path) -> Result<(), ArchiveError> {
            if self.cleaner.is_active() {
                self.cleaning_seen.store(true, Ordering::SeqCst);
            }
            self.inner.extract(archive, destination)
        }
    }

    fn package(temp: &TempDir, name: &str, output: &str) -> RuleSet {
        let root = temp.path().to_string_lossy().to_string();
        RuleSet {
            source: format!("{root}/{name}/mods"),
            output: RootInfo::new(format!("{root}/{output}")),
            extract: RootInfo::new(format!("{root}/{name}/extract")),
            expects: vec![Expect::marker(&["main.xml"])],
            ..RuleSet::default()
        }
    }

    fn write(temp: &TempDir, rel: &str, content: &str) {
        let path = temp.path().join(rel);
        fs::create_dir_all(path.parent().expect("has parent")).expect("mkdir");
        fs::write(path, content).expect("write");
    }

    #[test]
    fn test_run_installs_each_archive() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        write(&temp, "a/mods/pkg1.zip", "pkg1/main.xml=<mod/>");
        let rules = package(&temp, "a", "output");
        let archiver = FakeArchiver::new();
        let copier = Copier::default();
        let ctx = RunContext {
            archiver: &archiver,
            copier: &copier,
            cleaner: None,
        };

        let report = run_rule_sets(&[rules], &ctx);

        assert_eq!(report.packages.len(), 1);
        assert!(report.packages[0].is_success());
        assert_eq!(report.packages[0].archives, 1);
        assert!(temp.path().join("output/pkg1/main.xml").exists());
    }

    #[test]
    fn test_failing_package_does_not_stop_later_ones() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        write(&temp, "a/mods/bad.zip", "broken");
        write(&temp, "b/mods/good.zip", "good/main.xml=<mod/>");
        let archiver = FakeArchiver::new();
        let copier = Copier::default();
        let ctx = RunContext {
            archiver: &archiver,
            copier: &copier,
            cleaner: None,
        };

        let report = run_rule_sets(
            &[package(&temp, "a", "out-a"), package(&temp, "b", "out-b")],
            &ctx,
        );

        assert!(matches!(
            report.packages[0].outcome,
            Err(InstallError::Extract { .. })
        ));
        assert!(report.packages[1].is_success());
        assert_eq!(report.failed_packages(), 1);
        assert!(temp.path().join("out-b/good/main.xml").exists());
    }

    #[test]
    fn test_shared_output_root_cleaned_once() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        write(&temp, "a/mods/first.zip", "first/main.xml=1");
        write(&temp, "b/mods/second.zip", "second/main.xml=2");
        write(&temp, "shared/stale/old.txt", "stale");
        let archiver = FakeArchiver::new();
        let copier = Copier::default();
        let ctx = RunContext {
            archiver: &archiver,
            copier: &copier,
            cleaner: None,
        };

        run_rule_sets(
            &[package(&temp, "a", "shared"), package(&temp, "b", "shared")],
            &ctx,
        );

        assert!(!temp.path().join("shared/stale").exists());
        assert!(temp.path().join("shared/first/main.xml").exists());
        assert!(temp.path().join("shared/second/main.xml").exists());
    }

    #[test]
    fn test_missing_root_fails_package() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let mut rules = package(&temp, "a", "output");
        rules.output.path.clear();
        let archiver = FakeArchiver::new();
        let copier = Copier::default();
        let ctx = RunContext {
            archiver: &archiver,
            copier: &copier,
            cleaner: None,
        };

        let report = run_rule_sets(&[rules], &ctx);

        assert!(matches!(
            report.packages[0].outcome,
            Err(InstallError::MissingRoot { field: "output" })
        ));
        assert!(archiver.calls.lock().expect("lock").is_empty());
    }

    #[test]
    fn test_extract_clears_previous_extraction() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        write(&temp, "a/mods/pkg1.zip", "pkg1/main.xml=<mod/>");
        write(&temp, "a/extract/leftover/main.xml", "old");
        let archiver = FakeArchiver::new();
        let copier = Copier::default();
        let ctx = RunContext {
            archiver: &archiver,
            copier: &copier,
            cleaner: None,
        };

        run_rule_sets(&[package(&temp, "a", "output")], &ctx);

        assert!(!temp.path().join("output/leftover").exists());
        assert!(temp.path().join("output/pkg1/main.xml").exists());
    }

    #[test]
    fn test_bundle_archive_installs_every_folder() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        write(
            &temp,
            "a/mods/bundle.zip",
            "ModA/main.xml=a\nModB/main.xml=b",
        );
        let archiver = FakeArchiver::new();
        let copier = Copier::default();
        let ctx = RunContext {
            archiver: &archiver,
            copier: &copier,
            cleaner: None,
        };

        let report = run_rule_sets(&[package(&temp, "a", "output")], &ctx);

        assert!(report.packages[0].is_success());
        assert_eq!(report.files_copied(), 2);
        assert_eq!(
            fs::read_to_string(temp.path().join("output/ModA/main.xml")).expect("read"),
            "a"
        );
        assert_eq!(
            fs::read_to_string(temp.path().join("output/ModB/main.xml")).expect("read"),
            "b"
        );
        assert!(!temp.path().join("output/bundle").exists());
    }

    #[test]
    fn test_archives_sharing_a_name_both_install() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        write(&temp, "a/mods/x/pack.zip", "First/main.xml=1");
        write(&temp, "a/mods/y/pack.zip", "Second/main.xml=2");
        let archiver = FakeArchiver::new();
        let copier = Copier::default();
        let ctx = RunContext {
            archiver: &archiver,
            copier: &copier,
            cleaner: None,
        };

        let report = run_rule_sets(&[package(&temp, "a", "output")], &ctx);

        assert_eq!(report.packages[0].archives, 2);
        assert!(temp.path().join("output/First/main.xml").exists());
        assert!(temp.path().join("output/Second/main.xml").exists());
    }

    #[test]
    fn test_cleaner_held_only_while_cleaning() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        write(&temp, "a/mods/pkg1.zip", "pkg1/main.xml=<mod/>");
        write(&temp, "output/stale/old.txt", "stale");
        let cleaner = Arc::new(Activity::new("clean"));
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        cleaner.register_update(Arc::new(move || -> anyhow::Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        let archiver = CleanerAwareArchiver {
            cleaner: Arc::clone(&cleaner),
            inner: FakeArchiver::new(),
            cleaning_seen: AtomicBool::new(false),
        };
        let copier = Copier::default();
        let ctx = RunContext {
            archiver: &archiver,
            copier: &copier,
            cleaner: Some(&cleaner),
        };

        let report = run_rule_sets(&[package(&temp, "a", "output")], &ctx);

        assert!(report.packages[0].is_success());
        assert!(!temp.path().join("output/stale").exists());
        assert!(!archiver.cleaning_seen.load(Ordering::SeqCst));
        assert!(!cleaner.is_active());
        assert_eq!(notified.load(Ordering::SeqCst), 0);
    }
}
