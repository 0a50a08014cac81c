//! Rule-driven routing of extracted files.
//!
//! Each top-level directory under the extract root is one sub-package. For
//! every sub-package the classifier:
//! 1. copies each file matching an `include` entry to that entry's target
//! 2. walks the files again, skipping excluded ones, until the first file
//!    that satisfies an `expects` rule; that rule routes the sub-package and
//!    the remaining files are not examined
//!
//! Afterwards the output root is mirrored into the export root (when one is
//! configured) and the auxiliary `copy` entries run.
//!
//! Routing itself ([`Classifier::route`]) is pure: it turns a file path into
//! a [`Route`] without touching the filesystem.

use crate::cleaner::CleanTarget;
use crate::copier::{Copier, CopyStats};
use crate::error::{ClassifyError, InstallError, InstallResult};
use crate::fs_ops;
use crate::ruleset::{Expect, RuleSet};
use crate::segments::{
    SegmentPath, contains_all, contains_subsequence, normalize, replace_in_place,
};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// The rule matched the file's extension.
    File,
    /// The rule matched marker segments in the file's path.
    Directory,
}

/// Where an `expects` rule sends a file or subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Index of the matching rule in `expects`.
    pub rule: usize,
    pub kind: RouteKind,
    pub source: SegmentPath,
    pub destination: SegmentPath,
}

/// A copy performed on behalf of an `expects` rule.
#[derive(Debug, Clone)]
pub struct RoutedCopy {
    pub package: String,
    pub rule: usize,
    pub kind: RouteKind,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub stats: CopyStats,
}

/// Outcome of classifying one extract root.
#[derive(Debug, Default)]
pub struct ClassifyReport {
    /// Number of sub-packages found under the extract root.
    pub packages: usize,
    pub routed: Vec<RoutedCopy>,
    /// Sub-packages in which no file matched any rule.
    pub unmatched: Vec<String>,
    pub included: usize,
    pub excluded: usize,
    pub exported: bool,
    pub aux_copies: usize,
    /// Per-file failures. Each one abandoned the rest of its sub-package.
    pub failures: Vec<InstallError>,
}

impl ClassifyReport {
    pub fn files_copied(&self) -> usize {
        self.routed.iter().map(|r| r.stats.files).sum::<usize>() + self.included
    }
}

/// Applies one [`RuleSet`] to its extract root.
pub struct Classifier<'a> {
    rules: &'a RuleSet,
    copier: &'a Copier,
}

impl<'a> Classifier<'a> {
    pub fn new(rules: &'a RuleSet, copier: &'a Copier) -> Self {
        Self { rules, copier }
    }

    /// Classifies every sub-package, then mirrors and runs auxiliary copies.
    ///
    /// # Errors
    ///
    /// Fails when the extract root cannot be listed, or when the export
    /// mirror or an auxiliary copy fails. Failures inside a sub-package are
    /// recorded in [`ClassifyReport::failures`] instead.
    pub fn classify(&self) -> InstallResult<ClassifyReport> {
        let extract_root = PathBuf::from(self.rules.root(CleanTarget::Extract));
        let packages =
            fs_ops::list_top_level_dirs(&extract_root).map_err(|e| InstallError::ListPackages {
                path: extract_root.clone(),
                source: e,
            })?;

        let anchor = SegmentPath::from_path(&extract_root).len() + 1;
        let mut report = ClassifyReport {
            packages: packages.len(),
            ..ClassifyReport::default()
        };

        for package in &packages {
            let dir = extract_root.join(package);
            if let Err(e) = self.classify_package(&dir, package, anchor, &mut report) {
                error!(package = %package, error = %e, "Failed to classify package");
                report.failures.push(e);
            }
        }

        if self.rules.has_export() {
            report.exported = self.mirror_export()?;
        }

        self.run_aux_copies(&mut report)?;
        Ok(report)
    }

    fn classify_package(
        &self,
        dir: &Path,
        package: &str,
        anchor: usize,
        report: &mut ClassifyReport,
    ) -> InstallResult<()> {
        let files = fs_ops::list_files(dir).map_err(|e| InstallError::Walk {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let paths: Vec<SegmentPath> = files.iter().map(|f| SegmentPath::from_path(f)).collect();

        for path in &paths {
            self.apply_includes(path, report);
        }

        let excludes: Vec<Vec<String>> = self
            .rules
            .exclude
            .iter()
            .map(|pattern| self.rules.resolve_pattern(pattern))
            .collect();

        for path in &paths {
            if excludes
                .iter()
                .any(|pattern| contains_subsequence(path.segments(), pattern))
            {
                debug!(path = %path, "Excluded from expects");
                report.excluded += 1;
                continue;
            }

            if let Some(route) = self.route(path, anchor)? {
                let routed = self.execute(route, package)?;
                report.routed.push(routed);
                return Ok(());
            }
        }

        warn!(package = %package, "No expected marker found, nothing installed");
        report.unmatched.push(package.to_string());
        Ok(())
    }

    fn apply_includes(&self, path: &SegmentPath, report: &mut ClassifyReport) {
        let normalized = path.to_string();

        for include in &self.rules.include {
            let needle = normalize(&self.rules.resolve(&include.path));
            if needle.is_empty() || !normalized.contains(&needle) {
                continue;
            }

            let target = self.rules.resolve(&include.to);
            let mut destination = SegmentPath::parse(&target);
            if target.ends_with('/') || target.ends_with('\\') {
                destination = destination.join(&[path.last().unwrap_or_default()]);
            }
            let destination = self.apply_renames(path, destination);

            match self.copy("include", &path.to_path_buf(), &destination.to_path_buf()) {
                Ok(_) => report.included += 1,
                Err(e) => {
                    error!(error = %e, "Include copy failed");
                    report.failures.push(e);
                }
            }
        }
    }

    /// Decides where the first matching `expects` rule sends `file`.
    ///
    /// `anchor` is the number of leading segments that belong to the extract
    /// root and the sub-package directory; markers are only searched for
    /// below it.
    ///
    /// # Errors
    ///
    /// Returns `ClassifyError::MarkerNotFound` if a directory rule matches
    /// but its first marker cannot be located below the anchor.
    pub fn route(&self, file: &SegmentPath, anchor: usize) -> Result<Option<Route>, ClassifyError> {
        let relative = &file.segments()[anchor.min(file.len())..];

        for (index, expect) in self.rules.expects.iter().enumerate() {
            let markers = self.rules.resolve_segments(&expect.segments);
            if relative.len() < markers.len() {
                continue;
            }

            if let Some(ext) = file.extension()
                && markers.iter().any(|m| m == ext)
            {
                return Ok(Some(self.file_route(index, expect, file)));
            }

            if contains_all(relative, &markers) {
                return self
                    .directory_route(index, expect, &markers, file, anchor)
                    .map(Some);
            }
        }

        Ok(None)
    }

    fn output_root(&self) -> SegmentPath {
        SegmentPath::parse(&self.rules.root(CleanTarget::Output))
    }

    fn file_route(&self, index: usize, expect: &Expect, file: &SegmentPath) -> Route {
        let require = self.rules.resolve_pattern(&expect.require);
        let mut source = file.clone();
        let mut destination = self
            .output_root()
            .join(&require)
            .join(&[file.last().unwrap_or_default()]);

        if contains_subsequence(source.segments(), &require)
            && contains_subsequence(destination.segments(), &require)
        {
            source = source.truncated(source.len().saturating_sub(require.len()));
            destination = destination.truncated(destination.len().saturating_sub(require.len()));
        }

        Route {
            rule: index,
            kind: RouteKind::File,
            source,
            destination,
        }
    }

    fn directory_route(
        &self,
        index: usize,
        expect: &Expect,
        markers: &[String],
        file: &SegmentPath,
        anchor: usize,
    ) -> Result<Route, ClassifyError> {
        let anchor = anchor.min(file.len());
        let marker = markers.first().cloned().unwrap_or_default();
        let position = file.segments()[anchor..]
            .iter()
            .position(|s| *s == marker)
            .ok_or_else(|| ClassifyError::MarkerNotFound {
                marker: marker.clone(),
                path: file.to_path_buf(),
            })?;

        let at = anchor + position;
        let cut = if expect.exclusive { at + 1 } else { at };
        let source = file.truncated(cut);

        let mut chain = self.rules.resolve_pattern(&expect.require);
        chain.extend(source.last().map(str::to_string));
        chain.truncate(chain.len().saturating_sub(expect.base));

        Ok(Route {
            rule: index,
            kind: RouteKind::Directory,
            source,
            destination: self.output_root().join(&chain),
        })
    }

    /// Applies every `rename` rule whose match sequence occurs in `source`.
    ///
    /// Each rule replaces the first occurrence of its `from` sequence in the
    /// destination, overwriting at most `min(from, to)` segments.
    pub fn apply_renames(&self, source: &SegmentPath, mut destination: SegmentPath) -> SegmentPath {
        for rename in &self.rules.rename {
            let matches = self.rules.resolve_pattern(&rename.matches);
            if !contains_subsequence(source.segments(), &matches) {
                continue;
            }
            let from = self.rules.resolve_pattern(&rename.from);
            let to = self.rules.resolve_pattern(&rename.to);
            if replace_in_place(destination.segments_mut(), &from, &to) {
                debug!(destination = %destination, "Renamed destination");
            }
        }
        destination
    }

    fn execute(&self, route: Route, package: &str) -> InstallResult<RoutedCopy> {
        let destination = self.apply_renames(&route.source, route.destination);
        let src = route.source.to_path_buf();
        let dst = destination.to_path_buf();

        info!(source = %src.display(), destination = %dst.display(), rule = route.rule, "Copying");
        let stats = self.copy("expects", &src, &dst)?;

        Ok(RoutedCopy {
            package: package.to_string(),
            rule: route.rule,
            kind: route.kind,
            source: src,
            destination: dst,
            stats,
        })
    }

    fn copy(&self, operation: &'static str, src: &Path, dst: &Path) -> InstallResult<CopyStats> {
        self.copier
            .copy(src, dst)
            .map_err(|e| InstallError::Copy {
                operation,
                src: src.to_path_buf(),
                dst: dst.to_path_buf(),
                source: e,
            })
    }

    fn mirror_export(&self) -> InstallResult<bool> {
        let output = PathBuf::from(self.rules.root(CleanTarget::Output));
        let export = PathBuf::from(self.rules.root(CleanTarget::Export));

        if !fs_ops::exists(&output) {
            debug!(output = %output.display(), "Output root missing, skipping export mirror");
            return Ok(false);
        }

        info!(output = %output.display(), export = %export.display(), "Mirroring output to export");
        self.copy("export", &output, &export)?;
        Ok(true)
    }

    fn run_aux_copies(&self, report: &mut ClassifyReport) -> InstallResult<()> {
        for aux in &self.rules.copy {
            let source = SegmentPath::parse(&self.rules.resolve(&aux.from));
            let destination = self.apply_renames(&source, SegmentPath::parse(&self.rules.resolve(&aux.to)));
            let (src, dst) = (source.to_path_buf(), destination.to_path_buf());

            info!(source = %src.display(), destination = %dst.display(), "Copying");
            self.copy("copy", &src, &dst)?;
            report.aux_copies += 1;
        }
        Ok(())
    }
}
