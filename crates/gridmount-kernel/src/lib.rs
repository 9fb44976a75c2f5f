//! # gridmount-kernel
//!
//! Hierarchical filesystem view over a flat, GridFS-shaped blob store.
//!
//! The store holds records keyed by a flat filename such as `a/b/c.txt`.
//! This crate:
//! - Treats `/` inside filenames as a virtual directory separator
//! - Lists a directory by grouping keys under its prefix
//! - Serves attributes and byte ranges of the newest record per key
//! - Renames files and whole directory subtrees by rewriting keys

pub mod config;
pub mod store;
pub mod vfs;

pub use config::{MountConfig, StoreTarget};
pub use store::{BlobStore, MemoryStore, RecordId, SqliteStore, StoredRecord};
pub use vfs::{
    CallerContext, Children, DirEntry, Disposition, FileAttr, FileType, FlatFs, FsOperation,
    KeyPrefix, VfsError, VfsOps, VfsResult,
};
