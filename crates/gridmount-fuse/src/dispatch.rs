//! Inode-addressed front end over a path-based [`VfsOps`].
//!
//! The FUSE callbacks in [`crate::fs`] are thin: they decode arguments,
//! block on one of these methods, and encode the reply. Everything that can
//! fail lives here, so it can be driven from async tests without a mount.

use gridmount_kernel::vfs::path;
use gridmount_kernel::{
    CallerContext, Disposition, FileAttr, FileType, FsOperation, VfsError, VfsOps, VfsResult,
};
use tracing::{debug, trace};

use crate::inode::{InodeTable, ROOT_INO};

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub ino: u64,
    pub kind: FileType,
    pub name: String,
}

/// Routes inode-addressed calls to a path-addressed filesystem.
pub struct Dispatcher<V> {
    vfs: V,
    inodes: InodeTable,
}

impl<V: VfsOps> Dispatcher<V> {
    pub fn new(vfs: V) -> Self {
        Self {
            vfs,
            inodes: InodeTable::new(),
        }
    }

    pub fn vfs(&self) -> &V {
        &self.vfs
    }

    pub fn inodes(&self) -> &InodeTable {
        &self.inodes
    }

    /// How the filesystem handles `op`.
    pub fn disposition(&self, op: FsOperation) -> Disposition {
        self.vfs.disposition(op)
    }

    fn path_of(&self, ino: u64) -> VfsResult<String> {
        self.inodes
            .path(ino)
            .map(str::to_string)
            .ok_or_else(|| VfsError::not_found(format!("inode {ino}")))
    }

    fn child_of(&self, parent: u64, name: &str) -> VfsResult<String> {
        self.inodes
            .child_path(parent, name)
            .ok_or_else(|| VfsError::not_found(format!("inode {parent}")))
    }

    /// Resolve `name` inside `parent`, allocating an inode on success.
    pub async fn lookup(
        &mut self,
        parent: u64,
        name: &str,
        ctx: &CallerContext,
    ) -> VfsResult<(u64, FileAttr)> {
        let path = self.child_of(parent, name)?;
        let attr = self.vfs.getattr(&path, ctx).await?;
        let ino = self.inodes.lookup(&path);
        trace!(parent = parent, name = %name, ino = ino, "lookup resolved");
        Ok((ino, attr))
    }

    /// The kernel dropped `nlookup` references to `ino`.
    pub fn forget(&mut self, ino: u64, nlookup: u64) {
        self.inodes.forget(ino, nlookup);
    }

    pub async fn getattr(&self, ino: u64, ctx: &CallerContext) -> VfsResult<FileAttr> {
        let path = self.path_of(ino)?;
        self.vfs.getattr(&path, ctx).await
    }

    /// Full listing of directory `ino`, starting with `.` and `..`.
    pub async fn readdir(&mut self, ino: u64) -> VfsResult<Vec<ListingEntry>> {
        let dir = self.path_of(ino)?;
        let children = self.vfs.list_children(&dir).await?;
        let parent = if ino == ROOT_INO {
            ROOT_INO
        } else {
            self.inodes.parent_of(ino)
        };

        let mut entries = vec![
            ListingEntry {
                ino,
                kind: FileType::Directory,
                name: ".".to_string(),
            },
            ListingEntry {
                ino: parent,
                kind: FileType::Directory,
                name: "..".to_string(),
            },
        ];
        for child in children.entries() {
            let child_ino = self.inodes.get_or_insert(&path::join(&dir, &child.name));
            entries.push(ListingEntry {
                ino: child_ino,
                kind: child.kind,
                name: child.name,
            });
        }
        debug!(path = %dir, entries = entries.len() - 2, "listed directory");
        Ok(entries)
    }

    pub async fn read(&self, ino: u64, offset: i64, size: u32) -> VfsResult<Vec<u8>> {
        let offset = u64::try_from(offset)
            .map_err(|_| VfsError::invalid_argument(format!("negative offset {offset}")))?;
        let path = self.path_of(ino)?;
        self.vfs.read(&path, offset, size).await
    }

    /// Rename `parent/name` to `newparent/newname`.
    ///
    /// Inodes follow the renamed objects only when the filesystem reports
    /// success; a partial directory rename leaves the table untouched.
    pub async fn rename(
        &mut self,
        parent: u64,
        name: &str,
        newparent: u64,
        newname: &str,
    ) -> VfsResult<()> {
        let from = self.child_of(parent, name)?;
        let to = self.child_of(newparent, newname)?;
        self.vfs.rename(&from, &to).await?;
        self.inodes.rename(&from, &to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridmount_kernel::{FlatFs, MemoryStore};

    fn dispatcher() -> Dispatcher<FlatFs<MemoryStore>> {
        let store = MemoryStore::new();
        store.put("a/b.txt", b"bee".to_vec()).unwrap();
        store.put("a/c.txt", b"sea".to_vec()).unwrap();
        store.put("d.txt", b"0123456789".to_vec()).unwrap();
        Dispatcher::new(FlatFs::new(store))
    }

    fn ctx() -> CallerContext {
        CallerContext::new(1000, 100, 7)
    }

    fn names(entries: &[ListingEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_lookup_and_getattr() {
        let mut d = dispatcher();
        let (dir_ino, dir) = d.lookup(ROOT_INO, "a", &ctx()).await.unwrap();
        assert!(dir.is_dir());

        let (file_ino, file) = d.lookup(dir_ino, "b.txt", &ctx()).await.unwrap();
        assert!(file.is_file());
        assert_eq!(file.size, 3);
        assert_eq!(file.uid, 1000);

        let again = d.getattr(file_ino, &ctx()).await.unwrap();
        assert_eq!(again.size, 3);

        let err = d.lookup(ROOT_INO, "nope", &ctx()).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(d.inodes().inode("/nope").is_none());
    }

    #[tokio::test]
    async fn test_forget_after_lookup() {
        let mut d = dispatcher();
        let (ino, _) = d.lookup(ROOT_INO, "d.txt", &ctx()).await.unwrap();
        d.forget(ino, 1);
        assert!(d.getattr(ino, &ctx()).await.unwrap_err().is_not_found());

        let (again, attr) = d.lookup(ROOT_INO, "d.txt", &ctx()).await.unwrap();
        assert_eq!(attr.size, 10);
        assert_eq!(d.read(again, 0, 2).await.unwrap(), b"01");
    }

    #[tokio::test]
    async fn test_getattr_unknown_inode() {
        let d = dispatcher();
        assert!(d.getattr(4242, &ctx()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_readdir_root() {
        let mut d = dispatcher();
        let entries = d.readdir(ROOT_INO).await.unwrap();
        assert_eq!(names(&entries), vec![".", "..", "a", "d.txt"]);
        assert_eq!(entries[0].ino, ROOT_INO);
        assert_eq!(entries[1].ino, ROOT_INO);
        assert_eq!(entries[2].kind, FileType::Directory);
        assert_eq!(entries[3].kind, FileType::File);

        // Listed children are addressable without a prior lookup.
        let a = entries[2].ino;
        assert_eq!(d.inodes().path(a), Some("/a"));
        let sub = d.readdir(a).await.unwrap();
        assert_eq!(names(&sub), vec![".", "..", "b.txt", "c.txt"]);
        assert_eq!(sub[1].ino, ROOT_INO);
    }

    #[tokio::test]
    async fn test_read() {
        let mut d = dispatcher();
        let (ino, _) = d.lookup(ROOT_INO, "d.txt", &ctx()).await.unwrap();
        assert_eq!(d.read(ino, 3, 4).await.unwrap(), b"3456");
        assert!(d.read(ino, 50, 4).await.unwrap().is_empty());

        let err = d.read(ino, -1, 4).await.unwrap_err();
        assert!(matches!(err, VfsError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_rename_directory_keeps_inodes() {
        let mut d = dispatcher();
        let (dir_ino, _) = d.lookup(ROOT_INO, "a", &ctx()).await.unwrap();
        let (file_ino, _) = d.lookup(dir_ino, "b.txt", &ctx()).await.unwrap();

        d.rename(ROOT_INO, "a", ROOT_INO, "z").await.unwrap();

        assert_eq!(d.inodes().path(dir_ino), Some("/z"));
        assert_eq!(d.inodes().path(file_ino), Some("/z/b.txt"));
        assert_eq!(d.read(file_ino, 0, 16).await.unwrap(), b"bee");
        assert!(d.lookup(ROOT_INO, "a", &ctx()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_rename_missing_source() {
        let mut d = dispatcher();
        let err = d.rename(ROOT_INO, "ghost", ROOT_INO, "x").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_disposition_passthrough() {
        let d = dispatcher();
        assert_eq!(d.disposition(FsOperation::Open), Disposition::NoOp);
        assert_eq!(d.disposition(FsOperation::Write), Disposition::Unsupported);
        assert_eq!(d.disposition(FsOperation::Read), Disposition::Supported);
    }
}
