//! Routing rules for a single mod package.
//!
//! A `RuleSet` is deserialized straight from one entry of the `mods` list in a
//! configuration file. All string fields may carry the placeholders listed in
//! [`Placeholder`]; they are stored verbatim and resolved on every read.

use crate::cleaner::CleanTarget;
use crate::error::InstallError;
use crate::segments::SegmentPath;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The four placeholders recognised inside templated fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// `{path}`, the package source root.
    Path,
    /// `{output}`
    Output,
    /// `{extract}`
    Extract,
    /// `{export}`
    Export,
}

impl Placeholder {
    pub const ALL: [Placeholder; 4] = [
        Placeholder::Path,
        Placeholder::Output,
        Placeholder::Extract,
        Placeholder::Export,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Placeholder::Path => "{path}",
            Placeholder::Output => "{output}",
            Placeholder::Extract => "{extract}",
            Placeholder::Export => "{export}",
        }
    }
}

/// A root directory plus the segment sequences protected from cleaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RootInfo {
    pub path: String,
    pub exclude_clean: Vec<Vec<String>>,
}

impl RootInfo {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            exclude_clean: Vec::new(),
        }
    }
}

/// Unconditional copy of any file whose path contains `path`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Include {
    pub path: String,
    pub to: String,
}

/// A classification rule. See [`crate::classifier`] for how it routes files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Expect {
    /// Marker segments, or dotted extensions for file-based rules.
    #[serde(rename = "path")]
    pub segments: Vec<String>,
    pub require: Vec<String>,
    pub exclusive: bool,
    /// Trailing elements dropped from the destination chain.
    pub base: usize,
}

impl Expect {
    pub fn marker(segments: &[&str]) -> Self {
        Self {
            segments: segments.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rename {
    /// Applied only when the copy source contains this sequence.
    #[serde(rename = "path")]
    pub matches: Vec<String>,
    pub from: Vec<String>,
    pub to: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuxCopy {
    pub from: String,
    pub to: String,
}

/// Routing configuration for one mod package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    /// Directory holding the package archives.
    #[serde(rename = "mods")]
    pub source: String,
    pub output: RootInfo,
    pub extract: RootInfo,
    pub export: RootInfo,
    pub include: Vec<Include>,
    pub exclude: Vec<Vec<String>>,
    pub expects: Vec<Expect>,
    pub copy: Vec<AuxCopy>,
    pub rename: Vec<Rename>,
}

impl RuleSet {
    /// Substitutes placeholders in a templated string.
    ///
    /// Substitution is a single left-to-right pass: text produced by a
    /// substitution is never rescanned, and unknown `{...}` sequences are
    /// left verbatim.
    ///
    /// # Example
    ///
    /// ```
    /// use modpipe::ruleset::{RootInfo, RuleSet};
    /// let rules = RuleSet {
    ///     output: RootInfo::new("game/mods"),
    ///     ..RuleSet::default()
    /// };
    /// assert_eq!(rules.resolve("{output}/saves"), "game/mods/saves");
    /// assert_eq!(rules.resolve("{unknown}"), "{unknown}");
    /// ```
    pub fn resolve(&self, templated: &str) -> String {
        let mut resolved = String::with_capacity(templated.len());
        let mut rest = templated;

        while let Some(start) = rest.find('{') {
            resolved.push_str(&rest[..start]);
            let tail = &rest[start..];
            match Placeholder::ALL.iter().find(|p| tail.starts_with(p.token())) {
                Some(placeholder) => {
                    resolved.push_str(self.placeholder_value(*placeholder));
                    rest = &tail[placeholder.token().len()..];
                }
                None => {
                    resolved.push('{');
                    rest = &tail[1..];
                }
            }
        }
        resolved.push_str(rest);
        resolved
    }

    /// Element-wise [`RuleSet::resolve`].
    pub fn resolve_segments(&self, segments: &[String]) -> Vec<String> {
        segments.iter().map(|s| self.resolve(s)).collect()
    }

    /// Resolves a segment pattern and splits every element into path
    /// segments, so `["{output}", "saves"]` matches against a split path.
    pub fn resolve_pattern(&self, pattern: &[String]) -> Vec<String> {
        pattern
            .iter()
            .flat_map(|s| SegmentPath::parse(&self.resolve(s)).segments().to_vec())
            .collect()
    }

    fn placeholder_value(&self, placeholder: Placeholder) -> &str {
        match placeholder {
            Placeholder::Path => &self.source,
            Placeholder::Output => &self.output.path,
            Placeholder::Extract => &self.extract.path,
            Placeholder::Export => &self.export.path,
        }
    }

    fn root_info(&self, target: CleanTarget) -> &RootInfo {
        match target {
            CleanTarget::Extract => &self.extract,
            CleanTarget::Export => &self.export,
            CleanTarget::Output => &self.output,
        }
    }

    /// Name used for this package in logs and reports.
    pub fn label(&self) -> String {
        self.resolve(&self.source)
    }

    pub fn source_root(&self) -> PathBuf {
        PathBuf::from(self.resolve(&self.source))
    }

    /// Resolved root for `target`. Empty when the root is unset.
    pub fn root(&self, target: CleanTarget) -> String {
        self.resolve(&self.root_info(target).path)
    }

    /// Resolved `excludeClean` patterns for `target`.
    pub fn exclude_clean(&self, target: CleanTarget) -> Vec<Vec<String>> {
        self.root_info(target)
            .exclude_clean
            .iter()
            .map(|pattern| self.resolve_pattern(pattern))
            .collect()
    }

    pub fn has_export(&self) -> bool {
        !self.root(CleanTarget::Export).trim().is_empty()
    }

    /// Checks that the roots a run depends on are set.
    pub fn validate(&self) -> Result<(), InstallError> {
        let required = [
            ("mods", self.source.as_str()),
            ("output", self.output.path.as_str()),
            ("extract", self.extract.path.as_str()),
        ];
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(InstallError::MissingRoot { field: *field }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RuleSet {
        RuleSet {
            source: "mods".to_string(),
            output: RootInfo::new("game/output"),
            extract: RootInfo::new("scratch/extract"),
            export: RootInfo::new(""),
            ..RuleSet::default()
        }
    }

    #[test]
    fn test_resolve_all_placeholders() {
        let rules = sample();
        assert_eq!(
            rules.resolve("{path}|{output}|{extract}|{export}"),
            "mods|game/output|scratch/extract|"
        );
    }

    #[test]
    fn test_resolve_leaves_unknown_tokens() {
        let rules = sample();
        assert_eq!(rules.resolve("{outputs}/{"), "{outputs}/{");
        assert_eq!(rules.resolve("plain"), "plain");
    }

    #[test]
    fn test_resolve_is_single_pass() {
        let mut rules = sample();
        rules.source = "{output}".to_string();
        assert_eq!(rules.resolve("{path}/x"), "{output}/x");
    }

    #[test]
    fn test_resolve_reads_current_roots() {
        let mut rules = sample();
        let before = rules.resolve("{output}");
        rules.output.path = "elsewhere".to_string();
        assert_eq!(before, "game/output");
        assert_eq!(rules.resolve("{output}"), "elsewhere");
    }

    #[test]
    fn test_resolve_segments_element_wise() {
        let rules = sample();
        let resolved = rules.resolve_segments(&["{extract}".to_string(), "docs".to_string()]);
        assert_eq!(resolved, ["scratch/extract", "docs"]);
    }

    #[test]
    fn test_resolve_pattern_splits_roots() {
        let rules = sample();
        let pattern = rules.resolve_pattern(&["{output}".to_string(), "saves".to_string()]);
        assert_eq!(pattern, ["game", "output", "saves"]);
    }

    #[test]
    fn test_exclude_clean_resolved_per_target() {
        let mut rules = sample();
        rules.output.exclude_clean = vec![vec!["{output}".to_string(), "logs".to_string()]];
        assert_eq!(
            rules.exclude_clean(CleanTarget::Output),
            vec![vec!["game", "output", "logs"]]
        );
        assert!(rules.exclude_clean(CleanTarget::Extract).is_empty());
    }

    #[test]
    fn test_has_export() {
        let mut rules = sample();
        assert!(!rules.has_export());
        rules.export.path = "{output}-mirror".to_string();
        assert!(rules.has_export());
    }

    #[test]
    fn test_validate_reports_missing_root() {
        let mut rules = sample();
        assert!(rules.validate().is_ok());
        rules.extract.path.clear();
        let err = rules.validate().unwrap_err();
        assert!(err.to_string().contains("extract"));
    }

    #[test]
    fn test_deserialize_config_entry() {
        let json = r#"{
            "mods": "src",
            "output": {"path": "out", "excludeClean": [["{output}", "saves"]]},
            "extract": {"path": "ext"},
            "expects": [{"path": ["units"], "require": ["mods"], "exclusive": true, "base": 1}],
            "rename": [{"path": ["a"], "from": ["b"], "to": ["c"]}]
        }"#;
        let rules: RuleSet = serde_json::from_str(json).expect("valid entry");
        assert_eq!(rules.source, "src");
        assert_eq!(rules.output.exclude_clean, vec![vec!["{output}", "saves"]]);
        assert_eq!(rules.expects[0].segments, ["units"]);
        assert!(rules.expects[0].exclusive);
        assert_eq!(rules.expects[0].base, 1);
        assert_eq!(rules.rename[0].matches, ["a"]);
        assert!(rules.export.path.is_empty());
    }
}
