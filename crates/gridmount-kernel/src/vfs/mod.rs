//! Virtual filesystem over a flat blob store.
//!
//! Key components:
//!
//! - [`VfsOps`] - Core trait for filesystem operations
//! - [`FlatFs`] - Derives directories, files and attributes from store keys
//! - [`KeyPrefix`] - Separator-terminated key prefix for a virtual path
//! - [`Children`] - Immediate child directories and files of a path
//!
//! ## Design Decisions
//!
//! - **Path-based, no inodes**: Operations use paths, not inode numbers.
//!   The FUSE adapter handles inode ↔ path mapping locally.
//! - **Explicit offset/size**: Reads take offset and size, so no handle
//!   state lives in the filesystem.
//! - **Stateless**: Every call re-queries the store. Directories exist only
//!   while some key lies below them.

mod error;
pub mod flatfs;
pub mod namespace;
mod ops;
pub mod path;
mod types;

pub use error::{VfsError, VfsResult};
pub use flatfs::{FlatFs, flat_disposition};
pub use namespace::{Children, SegmentAnchor};
pub use ops::VfsOps;
pub use path::KeyPrefix;
pub use types::{
    CallerContext, DIR_PERM, DirEntry, Disposition, FILE_PERM, FileAttr, FileType, FsOperation,
};
