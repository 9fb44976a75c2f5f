//! VFS operations trait.
//!
//! This is the surface a dispatcher (FUSE, tests, tools) drives. It is
//! path-based with explicit offset/size, so no handle state lives in the
//! backend.

use async_trait::async_trait;

use super::namespace::Children;
use super::types::{CallerContext, DirEntry, Disposition, FileAttr, FsOperation};
use super::VfsResult;

/// Core VFS operations trait.
///
/// Paths are absolute virtual paths (`/a/b.txt`); the root is `/`.
#[async_trait]
pub trait VfsOps: Send + Sync {
    // ========================================================================
    // Reading
    // ========================================================================

    /// Get attributes for `path`, owned by the calling user.
    async fn getattr(&self, path: &str, ctx: &CallerContext) -> VfsResult<FileAttr>;

    /// Immediate child directories and files of `path`.
    ///
    /// A path with no children yields empty sets, not an error.
    async fn list_children(&self, path: &str) -> VfsResult<Children>;

    /// Read up to `size` bytes starting at `offset`.
    ///
    /// Returns fewer bytes only at end of content.
    async fn read(&self, path: &str, offset: u64, size: u32) -> VfsResult<Vec<u8>>;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Rename a file or a whole directory subtree.
    ///
    /// An existing destination is not removed first.
    async fn rename(&self, from: &str, to: &str) -> VfsResult<()>;

    // ========================================================================
    // Metadata
    // ========================================================================

    /// How this backend handles `op`.
    fn disposition(&self, op: FsOperation) -> Disposition;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Typed directory entries for `path`, directories first.
    async fn readdir(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        Ok(self.list_children(path).await?.entries())
    }

    /// Check if a path exists.
    async fn exists(&self, path: &str) -> bool {
        self.getattr(path, &CallerContext::default()).await.is_ok()
    }

    /// Read entire file contents.
    async fn read_all(&self, path: &str) -> VfsResult<Vec<u8>> {
        let attr = self.getattr(path, &CallerContext::default()).await?;
        let size = u32::try_from(attr.size).unwrap_or(u32::MAX);
        self.read(path, 0, size).await
    }
}
