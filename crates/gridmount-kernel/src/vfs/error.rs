//! VFS error types.

use std::io;
use thiserror::Error;

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Path resolves to neither a directory nor a file.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed mount invocation, URI, or collection name.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backing store could not be opened or configured.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A directory rename stopped after moving some of its records.
    ///
    /// Records already moved stay moved.
    #[error("rename {from} -> {to} stopped after {moved} of {total} records: {reason}")]
    PartialRename {
        from: String,
        to: String,
        moved: usize,
        total: usize,
        reason: String,
    },

    /// A store call failed.
    #[error("store error: {0}")]
    Store(String),

    /// Operation is not implemented by this filesystem.
    #[error("operation not supported: {0}")]
    Unsupported(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a StoreUnavailable error.
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Create a Store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create an Unsupported error.
    pub fn unsupported(op: impl Into<String>) -> Self {
        Self::Unsupported(op.into())
    }

    /// Returns true if this is a NotFound error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<rusqlite::Error> for VfsError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(e.to_string())
    }
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::InvalidArgument(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::Unsupported(msg) => io::Error::new(io::ErrorKind::Unsupported, msg),
            VfsError::Io(e) => e,
            other => io::Error::other(other.to_string()),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = VfsError::not_found("a/b.txt");
        assert_eq!(e.to_string(), "not found: a/b.txt");

        let e = VfsError::PartialRename {
            from: "/a".into(),
            to: "/z".into(),
            moved: 1,
            total: 3,
            reason: "disk full".into(),
        };
        let display = e.to_string();
        assert!(display.contains("1 of 3"));
        assert!(display.contains("disk full"));
    }

    #[test]
    fn test_io_conversion() {
        let io_err: io::Error = VfsError::not_found("x").into();
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);

        let io_err: io::Error = VfsError::invalid_argument("bad uri").into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidInput);

        let io_err: io::Error = VfsError::store("timeout").into();
        assert_eq!(io_err.kind(), io::ErrorKind::Other);
    }

    #[test]
    fn test_sqlite_conversion() {
        let e: VfsError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(e, VfsError::Store(_)));
        assert!(!e.is_not_found());
    }
}
