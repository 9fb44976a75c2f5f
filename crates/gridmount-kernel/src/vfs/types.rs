//! Core VFS types.
//!
//! Attributes are synthesized per call; nothing here is persisted.

use std::time::SystemTime;

/// Permission bits for synthesized directories (r-xr-xr-x).
pub const DIR_PERM: u32 = 0o555;

/// Permission bits for synthesized files (r--r--r--).
pub const FILE_PERM: u32 = 0o444;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// Identity of the process issuing a filesystem call.
///
/// Supplied by the dispatcher on every call and copied into the
/// ownership fields of synthesized attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallerContext {
    pub uid: u32,
    pub gid: u32,
    pub pid: u32,
}

impl CallerContext {
    pub fn new(uid: u32, gid: u32, pid: u32) -> Self {
        Self { uid, gid, pid }
    }
}

/// File attributes (metadata).
#[derive(Debug, Clone)]
pub struct FileAttr {
    /// Size in bytes.
    pub size: u64,
    /// File type.
    pub kind: FileType,
    /// Unix permissions (e.g., 0o444).
    pub perm: u32,
    /// Last modification time.
    pub mtime: SystemTime,
    /// Last access time.
    pub atime: SystemTime,
    /// Change time.
    pub ctime: SystemTime,
    /// Number of hard links.
    pub nlink: u32,
    /// Owning user, taken from the caller.
    pub uid: u32,
    /// Owning group, taken from the caller.
    pub gid: u32,
}

impl FileAttr {
    /// Attributes for a stored record of `size` bytes.
    pub fn file(size: u64, ctx: &CallerContext) -> Self {
        let now = SystemTime::now();
        Self {
            size,
            kind: FileType::File,
            perm: FILE_PERM,
            mtime: now,
            atime: now,
            ctime: now,
            nlink: 1,
            uid: ctx.uid,
            gid: ctx.gid,
        }
    }

    /// Attributes for a derived directory.
    pub fn directory(ctx: &CallerContext) -> Self {
        let now = SystemTime::now();
        Self {
            size: 0,
            kind: FileType::Directory,
            perm: DIR_PERM,
            mtime: now,
            atime: now,
            ctime: now,
            nlink: 2, // . and ..
            uid: ctx.uid,
            gid: ctx.gid,
        }
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type.
    pub kind: FileType,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(name: impl Into<String>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FileType::File)
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, FileType::Directory)
    }
}

/// Filesystem operations a dispatcher may route to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsOperation {
    GetAttr,
    ReadDir,
    Read,
    Rename,
    Open,
    OpenDir,
    Release,
    ReleaseDir,
    Flush,
    Fsync,
    Access,
    StatFs,
    Write,
    Create,
    Mkdir,
    Unlink,
    Rmdir,
    SetAttr,
    Symlink,
    Link,
    GetXattr,
    ListXattr,
    SetXattr,
    RemoveXattr,
}

/// How a backend handles an [`FsOperation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Routed to the backend.
    Supported,
    /// Acknowledged without doing anything (open/release bookkeeping).
    NoOp,
    /// Rejected; the dispatcher should answer "not implemented".
    Unsupported,
}
