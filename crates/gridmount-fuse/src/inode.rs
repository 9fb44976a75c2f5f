//! Inode table.
//!
//! The kernel speaks inode numbers; the filesystem speaks paths. This table
//! hands out a stable number per path for the life of the mount and keeps
//! numbers attached to their objects across renames.

use std::collections::HashMap;

use gridmount_kernel::vfs::path;

/// Inode number of the mount root.
pub const ROOT_INO: u64 = 1;

/// Bidirectional inode ↔ path map.
///
/// Each inode carries the kernel's lookup count. An inode is dropped once
/// the kernel forgets every lookup of it; the root is never dropped.
#[derive(Debug)]
pub struct InodeTable {
    paths: HashMap<u64, String>,
    inodes: HashMap<String, u64>,
    lookups: HashMap<u64, u64>,
    next_ino: u64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    pub fn new() -> Self {
        let mut paths = HashMap::new();
        let mut inodes = HashMap::new();
        paths.insert(ROOT_INO, "/".to_string());
        inodes.insert("/".to_string(), ROOT_INO);
        Self {
            paths,
            inodes,
            lookups: HashMap::new(),
            next_ino: ROOT_INO + 1,
        }
    }

    /// Path for `ino`, if one was handed out.
    pub fn path(&self, ino: u64) -> Option<&str> {
        self.paths.get(&ino).map(String::as_str)
    }

    /// Inode for `path`, if one was handed out.
    pub fn inode(&self, path: &str) -> Option<u64> {
        self.inodes.get(path).copied()
    }

    /// Inode for `path`, allocating one on first sight.
    pub fn get_or_insert(&mut self, path: &str) -> u64 {
        if let Some(ino) = self.inodes.get(path) {
            return *ino;
        }
        let ino = self.next_ino;
        self.next_ino += 1;
        self.paths.insert(ino, path.to_string());
        self.inodes.insert(path.to_string(), ino);
        ino
    }

    /// Inode for `path`, counting one kernel lookup of it.
    pub fn lookup(&mut self, path: &str) -> u64 {
        let ino = self.get_or_insert(path);
        *self.lookups.entry(ino).or_insert(0) += 1;
        ino
    }

    /// The kernel dropped `nlookup` references to `ino`.
    pub fn forget(&mut self, ino: u64, nlookup: u64) {
        if ino == ROOT_INO {
            return;
        }
        let remaining = match self.lookups.get_mut(&ino) {
            Some(count) => {
                *count = count.saturating_sub(nlookup);
                *count
            }
            None => 0,
        };
        if remaining == 0 {
            self.lookups.remove(&ino);
            if let Some(path) = self.paths.remove(&ino) {
                if self.inodes.get(&path) == Some(&ino) {
                    self.inodes.remove(&path);
                }
            }
        }
    }

    /// Path of the entry `name` inside directory `parent`.
    pub fn child_path(&self, parent: u64, name: &str) -> Option<String> {
        self.path(parent).map(|dir| path::join(dir, name))
    }

    /// Inode of the directory containing `ino`. The root is its own parent.
    pub fn parent_of(&self, ino: u64) -> u64 {
        self.path(ino)
            .map(parent_path)
            .and_then(|parent| self.inode(parent))
            .unwrap_or(ROOT_INO)
    }

    /// Move `from` and everything below it to `to`.
    ///
    /// An inode already handed out for a moved-onto path is dropped and the
    /// moved object takes its place. Other entries below the destination
    /// keep their paths: the store merges a renamed directory into an
    /// existing one, so those keys still resolve.
    pub fn rename(&mut self, from: &str, to: &str) {
        let below = format!("{}{}", from.trim_end_matches(path::SEPARATOR), path::SEPARATOR);
        let moved: Vec<(String, u64)> = self
            .inodes
            .iter()
            .filter(|(p, _)| p.as_str() == from || p.starts_with(&below))
            .map(|(p, ino)| (p.clone(), *ino))
            .collect();

        for (old, ino) in moved {
            let new = format!("{to}{}", &old[from.len()..]);
            self.inodes.remove(&old);
            if let Some(stale) = self.inodes.insert(new.clone(), ino) {
                if stale != ino {
                    self.paths.remove(&stale);
                    self.lookups.remove(&stale);
                }
            }
            self.paths.insert(ino, new);
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Parent directory of an absolute path. `/` is its own parent.
pub fn parent_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches(path::SEPARATOR);
    match trimmed.rsplit_once(path::SEPARATOR) {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}
