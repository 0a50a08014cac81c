//! Copying guarded by a denylist of sensitive locations.
//!
//! Both ends of every copy are checked against a list of [`PathCheck`]s before
//! anything touches the filesystem:
//! - `Deny` on either side aborts the copy with [`CopyError::Denied`]
//! - `Warn` is logged and the copy proceeds
//!
//! Checks compare lowercased path segments, so `C:\Users\me\DESKTOP` and
//! `/home/me/Desktop` are treated alike. The first matching check wins.

use crate::error::CopyError;
use crate::segments::normalize;
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, error, warn};
use walkdir::WalkDir;

static DRIVE_ROOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[a-z]:/?|/)$").expect("drive root pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// The last segment equals the target.
    EndsWith,
    /// Any segment equals the target.
    Contains,
    /// The path is a bare drive or filesystem root.
    DriveRoot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckAction {
    Warn,
    Deny,
}

/// One denylist entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCheck {
    pub kind: CheckKind,
    pub target: String,
    pub action: CheckAction,
}

impl PathCheck {
    pub fn new(kind: CheckKind, target: &str, action: CheckAction) -> Self {
        Self {
            kind,
            target: target.to_lowercase(),
            action,
        }
    }

    fn matches(&self, lowered: &str, segments: &[&str]) -> bool {
        match self.kind {
            CheckKind::EndsWith => segments.last().is_some_and(|last| *last == self.target),
            CheckKind::Contains => segments.contains(&self.target.as_str()),
            CheckKind::DriveRoot => DRIVE_ROOT.is_match(lowered),
        }
    }
}

impl fmt::Display for PathCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.action {
            CheckAction::Warn => "warn",
            CheckAction::Deny => "deny",
        };
        match self.kind {
            CheckKind::EndsWith => write!(f, "{}: ends with '{}'", action, self.target),
            CheckKind::Contains => write!(f, "{}: contains '{}'", action, self.target),
            CheckKind::DriveRoot => write!(f, "{}: drive root", action),
        }
    }
}

/// The built-in denylist.
///
/// Covers user-profile folders, cloud-sync clients, program install folders,
/// bare drive roots and Windows reserved device names.
pub fn default_checks() -> Vec<PathCheck> {
    use CheckAction::{Deny, Warn};
    use CheckKind::{Contains, DriveRoot, EndsWith};

    let mut checks = vec![
        PathCheck::new(EndsWith, "SteamApps", Warn),
        PathCheck::new(EndsWith, "Documents", Warn),
        PathCheck::new(EndsWith, "Desktop", Deny),
        PathCheck::new(Contains, "Desktop", Warn),
        PathCheck::new(Contains, "SteamApps", Warn),
        PathCheck::new(Contains, "scoped_dir", Deny),
        PathCheck::new(Contains, "Downloads", Deny),
        PathCheck::new(Contains, "OneDrive", Deny),
        PathCheck::new(Contains, "NextCloud", Deny),
        PathCheck::new(Contains, "DropBox", Deny),
        PathCheck::new(Contains, "Google", Deny),
        PathCheck::new(Contains, "Program Files", Deny),
        PathCheck::new(Contains, "Program Files (x86)", Deny),
        PathCheck::new(DriveRoot, "", Deny),
    ];

    let reserved = ["CON", "PRN", "AUX", "CLOCK$", "NUL"];
    checks.extend(reserved.iter().map(|name| PathCheck::new(EndsWith, name, Deny)));
    for prefix in ["COM", "LPT"] {
        checks.extend((0..=9).map(|n| PathCheck::new(EndsWith, &format!("{prefix}{n}"), Deny)));
    }

    checks
}

/// Counts for a single [`Copier::copy`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub files: usize,
    pub skipped: usize,
}

/// Performs copies after checking both endpoints against the denylist.
#[derive(Debug, Clone)]
pub struct Copier {
    checks: Vec<PathCheck>,
}

impl Default for Copier {
    fn default() -> Self {
        Self::new(default_checks())
    }
}

impl Copier {
    pub fn new(checks: Vec<PathCheck>) -> Self {
        Self { checks }
    }

    /// Returns the first check matching `path`, if any.
    ///
    /// # Example
    ///
    /// ```
    /// use modpipe::copier::{CheckAction, Copier};
    /// use std::path::Path;
    ///
    /// let copier = Copier::default();
    /// let hit = copier.check(Path::new("C:\\Users\\me\\Desktop")).unwrap();
    /// assert_eq!(hit.action, CheckAction::Deny);
    /// assert!(copier.check(Path::new("/games/mods")).is_none());
    /// ```
    pub fn check(&self, path: &Path) -> Option<&PathCheck> {
        let lowered = normalize(&path.to_string_lossy()).trim().to_lowercase();
        let trimmed = lowered.strip_prefix("./").unwrap_or(&lowered);
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
        self.checks
            .iter()
            .find(|check| check.matches(trimmed, &segments))
    }

    fn guard(&self, path: &Path) -> Result<(), CopyError> {
        match self.check(path) {
            Some(check) if check.action == CheckAction::Deny => Err(CopyError::Denied {
                path: path.to_path_buf(),
                check: check.clone(),
            }),
            Some(check) => {
                warn!(path = %path.display(), check = %check, "Path matches a flagged location");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Copies a file or a directory tree from `src` to `dst`.
    ///
    /// A file is written to exactly `dst`, creating parent directories. A
    /// directory is merged into `dst`, overwriting files that already exist.
    /// Nested entries whose destination hits a deny check are skipped and
    /// logged rather than failing the whole tree.
    ///
    /// # Errors
    ///
    /// Returns `CopyError::Denied` if either endpoint is denied,
    /// `CopyError::MissingSource` if `src` does not exist, and I/O or walk
    /// errors from the underlying copy.
    pub fn copy(&self, src: &Path, dst: &Path) -> Result<CopyStats, CopyError> {
        self.guard(src)?;
        self.guard(dst)?;

        let metadata = fs::metadata(src).map_err(|_| CopyError::MissingSource(src.to_path_buf()))?;
        debug!(src = %src.display(), dst = %dst.display(), "Copying");

        if metadata.is_dir() {
            self.copy_tree(src, dst)
        } else {
            copy_file(src, dst)?;
            Ok(CopyStats {
                files: 1,
                skipped: 0,
            })
        }
    }

    fn copy_tree(&self, src: &Path, dst: &Path) -> Result<CopyStats, CopyError> {
        let mut stats = CopyStats::default();
        let mut walker = WalkDir::new(src).sort_by_file_name().into_iter();

        while let Some(entry) = walker.next() {
            let entry = entry?;
            let Ok(relative) = entry.path().strip_prefix(src) else {
                continue;
            };
            let target = dst.join(relative);
            let is_dir = entry.file_type().is_dir();

            if !relative.as_os_str().is_empty()
                && let Some(check) = self.check(&target)
                && check.action == CheckAction::Deny
            {
                error!(path = %target.display(), check = %check, "Skipping protected location");
                stats.skipped += 1;
                if is_dir {
                    walker.skip_current_dir();
                }
                continue;
            }

            if is_dir {
                fs::create_dir_all(&target).map_err(|e| CopyError::Io {
                    path: target.clone(),
                    source: e,
                })?;
            } else {
                copy_file(entry.path(), &target)?;
                stats.files += 1;
            }
        }

        Ok(stats)
    }
}

fn copy_file(src: &Path, dst: &Path) -> Result<(), CopyError> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| CopyError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    fs::copy(src, dst).map_err(|e| CopyError::Io {
        path: dst.to_path_buf(),
        source: e,
    })?;
    Ok(())
}
