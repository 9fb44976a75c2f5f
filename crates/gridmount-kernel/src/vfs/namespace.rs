//! Directory structure derived from flat keys.
//!
//! There is no directory index. The children of a virtual directory are
//! recomputed on every call by matching each key below the directory's
//! [`KeyPrefix`] and collecting the next path segment:
//!
//! ```text
//! prefix "a/"   key "a/b/c.txt"  -> directory "b"
//! prefix "a/"   key "a/d.txt"    -> file "d.txt"
//! prefix "a/"   key "a/e-f.txt"  -> nothing (segment has illegal chars)
//! ```
//!
//! Everything here is a pure function of the keys, so any store that can
//! enumerate keys by prefix can answer listings.

use std::collections::BTreeSet;

use regex::Regex;

use super::error::{VfsError, VfsResult};
use super::path::KeyPrefix;
use super::types::DirEntry;

/// Characters a derived segment may contain: ASCII word characters and space.
pub const SEGMENT_CLASS: &str = "[0-9A-Za-z_ ]";

/// Which kind of child a segment match looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentAnchor {
    /// Segment followed by a separator: an immediate subdirectory.
    Directory,
    /// Segment running to the end of the key, dotted extensions allowed.
    File,
}

/// Compiled matcher extracting the child segment of a key.
#[derive(Debug, Clone)]
pub struct SegmentMatcher {
    re: Regex,
}

impl SegmentMatcher {
    pub fn new(prefix: &KeyPrefix, anchor: SegmentAnchor) -> VfsResult<Self> {
        let class = SEGMENT_CLASS;
        let source = match anchor {
            SegmentAnchor::Directory => format!("{}({class}+)/", prefix.pattern()),
            SegmentAnchor::File => {
                format!(r"{}({class}+(?:\.{class}+)*)$", prefix.pattern())
            }
        };
        let re = Regex::new(&source)
            .map_err(|e| VfsError::invalid_argument(format!("segment pattern {source}: {e}")))?;
        Ok(Self { re })
    }

    /// The child segment of `key`, if the key matches.
    pub fn segment<'k>(&self, key: &'k str) -> Option<&'k str> {
        self.re
            .captures(key)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// Distinct child segments of `prefix` among `keys`.
pub fn distinct_segments<'k>(
    prefix: &KeyPrefix,
    anchor: SegmentAnchor,
    keys: impl IntoIterator<Item = &'k str>,
) -> VfsResult<BTreeSet<String>> {
    let matcher = SegmentMatcher::new(prefix, anchor)?;
    Ok(keys
        .into_iter()
        .filter_map(|key| matcher.segment(key))
        .map(str::to_string)
        .collect())
}

/// Immediate children of a virtual directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Children {
    pub directories: BTreeSet<String>,
    pub files: BTreeSet<String>,
}

impl Children {
    /// Derive the children of `prefix` from a snapshot of keys.
    pub fn from_keys<'k>(
        prefix: &KeyPrefix,
        keys: impl IntoIterator<Item = &'k str>,
    ) -> VfsResult<Self> {
        let dirs = SegmentMatcher::new(prefix, SegmentAnchor::Directory)?;
        let files = SegmentMatcher::new(prefix, SegmentAnchor::File)?;

        let mut children = Self::default();
        for key in keys {
            if let Some(name) = dirs.segment(key) {
                children.directories.insert(name.to_string());
            } else if let Some(name) = files.segment(key) {
                children.files.insert(name.to_string());
            }
        }
        Ok(children)
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }

    /// Typed entries, directories first.
    pub fn entries(&self) -> Vec<DirEntry> {
        self.directories
            .iter()
            .map(DirEntry::directory)
            .chain(self.files.iter().map(DirEntry::file))
            .collect()
    }

    /// Names as a directory listing: `.`, `..`, directories, files.
    pub fn listing(&self) -> Vec<String> {
        [".", ".."]
            .into_iter()
            .map(str::to_string)
            .chain(self.directories.iter().cloned())
            .chain(self.files.iter().cloned())
            .collect()
    }
}
