//! Filesystem primitives used by the classifier and cleaner.

use crate::segments::{SegmentPath, contains_subsequence};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Counts for a [`delete_tree`] / [`delete_empty_dirs`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteStats {
    pub files_removed: usize,
    pub files_kept: usize,
    pub dirs_removed: usize,
}

pub fn exists(path: &Path) -> bool {
    path.exists()
}

/// Names of the directories directly under `root`, sorted.
pub fn list_top_level_dirs(root: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Every file below `root`, in walk order.
///
/// Siblings are visited by name and a directory's own files come before the
/// files of its subdirectories, so the order is stable across runs.
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by(|a, b| {
            b.file_type()
                .is_file()
                .cmp(&a.file_type().is_file())
                .then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter()
    {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Skip predicate built from resolved segment patterns.
///
/// A file is kept when its path contains any of `patterns` as a contiguous
/// run of segments.
pub fn keep_matching(patterns: Vec<Vec<String>>) -> impl Fn(&Path) -> bool {
    move |path| {
        let path = SegmentPath::from_path(path);
        patterns
            .iter()
            .any(|pattern| contains_subsequence(path.segments(), pattern))
    }
}

/// Removes every file under `root` for which `skip` returns false.
pub fn delete_tree(root: &Path, skip: impl Fn(&Path) -> bool) -> io::Result<DeleteStats> {
    let mut stats = DeleteStats::default();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_dir() {
            continue;
        }
        if skip(entry.path()) {
            stats.files_kept += 1;
            continue;
        }
        fs::remove_file(entry.path())?;
        stats.files_removed += 1;
    }
    Ok(stats)
}

/// Removes empty directories below `root`, deepest first. `root` itself stays.
pub fn delete_empty_dirs(root: &Path) -> io::Result<usize> {
    let mut removed = 0;
    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_dir() {
            continue;
        }
        if fs::read_dir(entry.path())?.next().is_none() {
            fs::remove_dir(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("has parent")).expect("Failed to create dirs");
        fs::write(path, rel).expect("Failed to write file");
    }

    #[test]
    fn test_list_top_level_dirs_sorted() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir(temp.path().join("b")).expect("mkdir");
        fs::create_dir(temp.path().join("a")).expect("mkdir");
        touch(temp.path(), "c.txt");

        let dirs = list_top_level_dirs(temp.path()).expect("listing succeeds");

        assert_eq!(dirs, ["a", "b"]);
    }

    #[test]
    fn test_list_top_level_dirs_missing_root() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        assert!(list_top_level_dirs(&temp.path().join("missing")).is_err());
    }

    #[test]
    fn test_list_files_parent_files_first() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        touch(temp.path(), "pkg/a/deep.txt");
        touch(temp.path(), "pkg/z.txt");
        touch(temp.path(), "pkg/b.txt");

        let files = list_files(&temp.path().join("pkg")).expect("walk succeeds");
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(temp.path()).expect("under temp").to_path_buf())
            .collect();

        assert_eq!(
            names,
            [
                PathBuf::from("pkg/b.txt"),
                PathBuf::from("pkg/z.txt"),
                PathBuf::from("pkg/a/deep.txt"),
            ]
        );
    }

    #[test]
    fn test_delete_tree_respects_skip() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        touch(temp.path(), "out/saves/slot1.sav");
        touch(temp.path(), "out/mod/main.xml");

        let skip = keep_matching(vec![vec!["out".to_string(), "saves".to_string()]]);
        let stats = delete_tree(&temp.path().join("out"), skip).expect("delete succeeds");

        assert_eq!(stats.files_removed, 1);
        assert_eq!(stats.files_kept, 1);
        assert!(temp.path().join("out/saves/slot1.sav").exists());
        assert!(!temp.path().join("out/mod/main.xml").exists());
    }

    #[test]
    fn test_delete_empty_dirs_bottom_up() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(temp.path().join("root/a/b/c")).expect("mkdir");
        touch(temp.path(), "root/keep/file.txt");

        let removed = delete_empty_dirs(&temp.path().join("root")).expect("delete succeeds");

        assert_eq!(removed, 3);
        assert!(temp.path().join("root").exists());
        assert!(!temp.path().join("root/a").exists());
        assert!(temp.path().join("root/keep/file.txt").exists());
    }
}
