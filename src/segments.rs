//! Path normalization and segment-sequence matching.
//!
//! Every routing decision works on paths split into `/`-separated segments:
//! - `SegmentPath` keeps the segments plus whether the path was rooted, so a
//!   truncated or rewritten path can be turned back into a `PathBuf`
//! - the free functions implement contiguous-subsequence search, unordered
//!   membership and length-preserving in-place replacement

use std::fmt;
use std::path::{Path, PathBuf};

/// Converts Windows separators to `/`.
pub fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

/// A path broken into its non-empty segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentPath {
    rooted: bool,
    segments: Vec<String>,
}

impl SegmentPath {
    /// Parses a path string, accepting either separator.
    ///
    /// Empty and `.` segments are dropped, so `./a//b/` parses as `["a", "b"]`.
    ///
    /// # Example
    ///
    /// ```
    /// use modpipe::segments::SegmentPath;
    /// let path = SegmentPath::parse("extract\\pkg1/main.xml");
    /// assert_eq!(path.segments(), ["extract", "pkg1", "main.xml"]);
    /// ```
    pub fn parse(path: &str) -> Self {
        let normalized = normalize(path);
        Self {
            rooted: normalized.starts_with('/'),
            segments: split(&normalized),
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self::parse(&path.to_string_lossy())
    }

    pub fn new(rooted: bool, segments: Vec<String>) -> Self {
        Self { rooted, segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_rooted(&self) -> bool {
        self.rooted
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Keeps the first `keep` segments. Saturates at the full length.
    pub fn truncated(&self, keep: usize) -> Self {
        let keep = keep.min(self.segments.len());
        Self {
            rooted: self.rooted,
            segments: self.segments[..keep].to_vec(),
        }
    }

    /// Appends segments to a copy of this path.
    pub fn join<S: AsRef<str>>(&self, tail: &[S]) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(tail.iter().flat_map(|s| split(&normalize(s.as_ref()))));
        Self {
            rooted: self.rooted,
            segments,
        }
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Dotted extension of the last segment, e.g. `.lua` for `hook.lua`.
    pub fn extension(&self) -> Option<&str> {
        let last = self.last()?;
        last.rfind('.').map(|idx| &last[idx..])
    }

    pub fn segments_mut(&mut self) -> &mut Vec<String> {
        &mut self.segments
    }

    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(self.to_string())
    }
}

impl fmt::Display for SegmentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rooted {
            write!(f, "/")?;
        }
        write!(f, "{}", self.segments.join("/"))
    }
}

fn split(normalized: &str) -> Vec<String> {
    normalized
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .map(str::to_string)
        .collect()
}

/// Index of the first contiguous occurrence of `needle` in `haystack`.
///
/// An empty needle never matches.
pub fn find_subsequence<A: AsRef<str>, B: AsRef<str>>(
    haystack: &[A],
    needle: &[B],
) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| {
        window
            .iter()
            .zip(needle)
            .all(|(a, b)| a.as_ref() == b.as_ref())
    })
}

pub fn contains_subsequence<A: AsRef<str>, B: AsRef<str>>(haystack: &[A], needle: &[B]) -> bool {
    find_subsequence(haystack, needle).is_some()
}

/// True when every needle appears somewhere in `haystack`, in any order.
pub fn contains_all<A: AsRef<str>, B: AsRef<str>>(haystack: &[A], needles: &[B]) -> bool {
    !needles.is_empty()
        && needles
            .iter()
            .all(|n| haystack.iter().any(|h| h.as_ref() == n.as_ref()))
}

/// Overwrites the first occurrence of `from` with `to`, segment by segment.
///
/// Only `min(from.len(), to.len())` segments are written, so the length of
/// `seq` never changes. Returns whether a replacement happened.
pub fn replace_in_place<B: AsRef<str>, C: AsRef<str>>(
    seq: &mut [String],
    from: &[B],
    to: &[C],
) -> bool {
    let Some(start) = find_subsequence(&*seq, from) else {
        return false;
    };
    for (slot, value) in seq[start..].iter_mut().zip(to.iter().take(from.len())) {
        *slot = value.as_ref().to_string();
    }
    true
}
