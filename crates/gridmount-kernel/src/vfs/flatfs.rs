//! Hierarchical view over a flat blob store.
//!
//! `FlatFs` answers filesystem calls by querying the store on every call.
//! It keeps no caches and takes no locks; consistency is whatever the store
//! gives for single reads and single-record updates.

use async_trait::async_trait;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use super::error::{VfsError, VfsResult};
use super::namespace::{Children, SegmentAnchor};
use super::ops::VfsOps;
use super::path::{self, KeyPrefix};
use super::types::{CallerContext, Disposition, FileAttr, FsOperation};
use crate::store::{BlobStore, StoredRecord};

/// Disposition of every operation for a `FlatFs`.
pub fn flat_disposition(op: FsOperation) -> Disposition {
    use FsOperation::*;
    match op {
        GetAttr | ReadDir | Read | Rename => Disposition::Supported,
        Open | OpenDir | Release | ReleaseDir => Disposition::NoOp,
        Flush | Fsync | Access | StatFs | Write | Create | Mkdir | Unlink | Rmdir | SetAttr
        | Symlink | Link | GetXattr | ListXattr | SetXattr | RemoveXattr => {
            Disposition::Unsupported
        }
    }
}

/// Filesystem derived from the filenames of a [`BlobStore`].
pub struct FlatFs<S> {
    store: Arc<S>,
}

impl<S> Clone for FlatFs<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> std::fmt::Debug for FlatFs<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatFs").finish_non_exhaustive()
    }
}

impl<S: BlobStore> FlatFs<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Share an existing store handle.
    pub fn from_arc(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns true if `path` is the root or some key lies below it.
    pub async fn is_directory(&self, path: &str) -> VfsResult<bool> {
        if path::is_root(path) {
            return Ok(true);
        }
        self.store.has_prefix(&KeyPrefix::for_path(path)).await
    }

    /// The record backing the file at `path`, newest version first.
    async fn resolve_file(&self, path: &str) -> VfsResult<StoredRecord> {
        let key = path::to_store_key(path);
        self.store
            .find_by_exact_key(key)
            .await?
            .ok_or_else(|| VfsError::not_found(path))
    }

    async fn rename_file(&self, from: &str, to: &str) -> VfsResult<()> {
        let record = self.resolve_file(from).await?;
        let new_key = path::to_store_key(to);
        self.store.update_filename(record.id, new_key).await?;
        info!(from = %from, to = %to, id = record.id, "renamed file");
        Ok(())
    }

    async fn rename_dir(&self, from: &str, to: &str) -> VfsResult<()> {
        let prefix = KeyPrefix::for_path(from);
        let records = self.store.find_by_prefix(&prefix).await?;
        if records.is_empty() {
            debug!(from = %from, "directory rename matched nothing");
            return Ok(());
        }

        let new_root = path::to_store_key(to).trim_end_matches(path::SEPARATOR);
        let total = records.len();
        info!(from = %from, to = %to, records = total, "renaming directory");

        for (moved, record) in records.iter().enumerate() {
            // Every record came from a prefix scan, so the remainder exists.
            let Some(rest) = prefix.remainder(&record.filename) else {
                continue;
            };
            let new_name = format!("{new_root}{}{rest}", path::SEPARATOR);

            if let Err(e) = self.store.update_filename(record.id, &new_name).await {
                warn!(
                    from = %from,
                    to = %to,
                    moved = moved,
                    total = total,
                    error = %e,
                    "directory rename stopped"
                );
                if moved == 0 {
                    return Err(e);
                }
                return Err(VfsError::PartialRename {
                    from: from.to_string(),
                    to: to.to_string(),
                    moved,
                    total,
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<S: BlobStore + 'static> VfsOps for FlatFs<S> {
    async fn getattr(&self, path: &str, ctx: &CallerContext) -> VfsResult<FileAttr> {
        trace!(path = %path, "getattr");

        if self.is_directory(path).await? {
            return Ok(FileAttr::directory(ctx));
        }

        let record = self.resolve_file(path).await?;
        debug!(path = %path, id = record.id, size = record.length, "resolved file");
        Ok(FileAttr::file(record.length, ctx))
    }

    async fn list_children(&self, path: &str) -> VfsResult<Children> {
        trace!(path = %path, "list_children");

        let prefix = KeyPrefix::for_path(path);
        let directories = self
            .store
            .distinct_child_segments(&prefix, SegmentAnchor::Directory)
            .await?;
        let files = self
            .store
            .distinct_child_segments(&prefix, SegmentAnchor::File)
            .await?;
        Ok(Children { directories, files })
    }

    async fn read(&self, path: &str, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
        trace!(path = %path, offset = offset, size = size, "read");

        let record = self.resolve_file(path).await?;
        let mut reader = self.store.open_content(&record).await?;
        let available = record.length.saturating_sub(offset).min(u64::from(size));

        let data = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
            reader.seek(SeekFrom::Start(offset))?;
            let mut buf = Vec::with_capacity(available as usize);
            reader.take(u64::from(size)).read_to_end(&mut buf)?;
            Ok(buf)
        })
        .await
        .map_err(|e| VfsError::Io(std::io::Error::other(e)))??;

        Ok(data)
    }

    async fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        trace!(from = %from, to = %to, "rename");

        if path::is_root(from) {
            return Err(VfsError::invalid_argument("cannot rename the root directory"));
        }
        if path::is_root(to) {
            return Err(VfsError::invalid_argument("cannot rename onto the root directory"));
        }
        if self.is_directory(from).await? {
            self.rename_dir(from, to).await
        } else {
            self.rename_file(from, to).await
        }
    }

    fn disposition(&self, op: FsOperation) -> Disposition {
        flat_disposition(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BlobReader, MemoryStore, RecordId};
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx() -> CallerContext {
        CallerContext::new(501, 20, 1)
    }

    fn sample() -> FlatFs<MemoryStore> {
        let store = MemoryStore::new();
        store.put("a/b.txt", b"bee".to_vec()).unwrap();
        store.put("a/c.txt", b"sea".to_vec()).unwrap();
        store.put("d.txt", b"0123456789".to_vec()).unwrap();
        FlatFs::new(store)
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_root_is_directory() {
        let fs = FlatFs::new(MemoryStore::new());
        assert!(fs.is_directory("/").await.unwrap());
        assert!(fs.getattr("/", &ctx()).await.unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_getattr() {
        let fs = sample();

        let dir = fs.getattr("/a", &ctx()).await.unwrap();
        assert!(dir.is_dir());
        assert_eq!(dir.perm, 0o555);
        assert_eq!(dir.nlink, 2);

        let file = fs.getattr("/d.txt", &ctx()).await.unwrap();
        assert!(file.is_file());
        assert_eq!(file.size, 10);
        assert_eq!(file.perm, 0o444);
        assert_eq!((file.uid, file.gid), (501, 20));

        let err = fs.getattr("/missing", &ctx()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_hybrid_path_prefers_directory() {
        let store = MemoryStore::new();
        store.put("a", b"file".to_vec()).unwrap();
        store.put("a/b.txt", b"".to_vec()).unwrap();
        let fs = FlatFs::new(store);

        assert!(fs.getattr("/a", &ctx()).await.unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_file_name_prefix_is_not_directory() {
        let store = MemoryStore::new();
        store.put("ab.txt", b"".to_vec()).unwrap();
        store.put("ab.txt.bak", b"".to_vec()).unwrap();
        let fs = FlatFs::new(store);

        assert!(!fs.is_directory("/ab.txt").await.unwrap());
        assert!(fs.getattr("/ab.txt", &ctx()).await.unwrap().is_file());
    }

    #[tokio::test]
    async fn test_getattr_latest_version() {
        let store = MemoryStore::new();
        store.put("log.txt", b"short".to_vec()).unwrap();
        store.put("log.txt", b"much longer".to_vec()).unwrap();
        let fs = FlatFs::new(store);

        assert_eq!(fs.getattr("/log.txt", &ctx()).await.unwrap().size, 11);
        assert_eq!(fs.read_all("/log.txt").await.unwrap(), b"much longer");
    }

    #[tokio::test]
    async fn test_list_children() {
        let fs = sample();

        let root = fs.list_children("/").await.unwrap();
        assert_eq!(root.directories, set(&["a"]));
        assert_eq!(root.files, set(&["d.txt"]));

        let a = fs.list_children("/a").await.unwrap();
        assert!(a.directories.is_empty());
        assert_eq!(a.files, set(&["b.txt", "c.txt"]));

        assert!(fs.list_children("/nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_readdir_entries() {
        let fs = sample();
        let entries = fs.readdir("/").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.name == "a" && e.kind.is_dir()));
        assert!(entries.iter().any(|e| e.name == "d.txt" && e.kind.is_file()));
    }

    #[tokio::test]
    async fn test_read_ranges() {
        let fs = sample();
        assert_eq!(fs.read("/d.txt", 2, 4).await.unwrap(), b"2345");
        assert_eq!(fs.read("/d.txt", 8, 4).await.unwrap(), b"89");
        assert!(fs.read("/d.txt", 10, 4).await.unwrap().is_empty());
        assert!(fs.read("/d.txt", 1000, 4).await.unwrap().is_empty());
        assert!(fs.read("/d.txt", 0, 0).await.unwrap().is_empty());
        assert!(fs.read("/missing", 0, 4).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_rename_file() {
        let fs = sample();
        fs.rename("/d.txt", "/e.txt").await.unwrap();

        assert!(fs.getattr("/d.txt", &ctx()).await.unwrap_err().is_not_found());
        assert_eq!(fs.getattr("/e.txt", &ctx()).await.unwrap().size, 10);
        let names = fs.store().filenames().unwrap();
        assert_eq!(names.iter().filter(|n| *n == "e.txt").count(), 1);
    }

    #[tokio::test]
    async fn test_rename_missing_file() {
        let fs = sample();
        let err = fs.rename("/nope.txt", "/x.txt").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_rename_directory() {
        let store = MemoryStore::new();
        store.put("a/b.txt", b"".to_vec()).unwrap();
        store.put("a/c.txt", b"".to_vec()).unwrap();
        let fs = FlatFs::new(store);

        fs.rename("/a", "/z").await.unwrap();

        assert_eq!(fs.store().filenames().unwrap(), vec!["z/b.txt", "z/c.txt"]);
        assert!(fs.list_children("/a").await.unwrap().is_empty());
        assert_eq!(fs.list_children("/z").await.unwrap().files, set(&["b.txt", "c.txt"]));
    }

    #[tokio::test]
    async fn test_rename_nested_directory_keeps_remainder() {
        let store = MemoryStore::new();
        store.put("x/y/deep/1.txt", b"".to_vec()).unwrap();
        store.put("x/y/2.txt", b"".to_vec()).unwrap();
        store.put("x/other.txt", b"".to_vec()).unwrap();
        let fs = FlatFs::new(store);

        fs.rename("/x/y", "/moved").await.unwrap();

        assert_eq!(
            fs.store().filenames().unwrap(),
            vec!["moved/2.txt", "moved/deep/1.txt", "x/other.txt"]
        );
    }

    #[tokio::test]
    async fn test_rename_does_not_touch_sibling_with_shared_prefix() {
        let store = MemoryStore::new();
        store.put("a/b.txt", b"".to_vec()).unwrap();
        store.put("ab/c.txt", b"".to_vec()).unwrap();
        let fs = FlatFs::new(store);

        fs.rename("/a", "/z").await.unwrap();
        assert_eq!(fs.store().filenames().unwrap(), vec!["ab/c.txt", "z/b.txt"]);
    }

    #[tokio::test]
    async fn test_rename_root_rejected() {
        let fs = sample();
        let err = fs.rename("/", "/x").await.unwrap_err();
        assert!(matches!(err, VfsError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_rename_onto_root_rejected() {
        let store = MemoryStore::new();
        store.put("a/b.txt", b"".to_vec()).unwrap();
        let fs = FlatFs::new(store);

        let err = fs.rename("/a", "/").await.unwrap_err();
        assert!(matches!(err, VfsError::InvalidArgument(_)));
        let err = fs.rename("/a/b.txt", "").await.unwrap_err();
        assert!(matches!(err, VfsError::InvalidArgument(_)));
        assert_eq!(fs.store().filenames().unwrap(), vec!["a/b.txt"]);
    }

    #[tokio::test]
    async fn test_rename_dir_with_no_records_is_noop() {
        let fs = sample();
        fs.rename_dir("/nothing", "/z").await.unwrap();
        assert_eq!(
            fs.store().filenames().unwrap(),
            vec!["a/b.txt", "a/c.txt", "d.txt"]
        );
    }

    #[tokio::test]
    async fn test_read_past_small_file_with_huge_size() {
        let fs = sample();
        assert_eq!(fs.read("/d.txt", 0, u32::MAX).await.unwrap(), b"0123456789");
        assert!(fs.read("/d.txt", 20, u32::MAX).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disposition() {
        let fs = sample();
        assert_eq!(fs.disposition(FsOperation::Read), Disposition::Supported);
        assert_eq!(fs.disposition(FsOperation::Rename), Disposition::Supported);
        assert_eq!(fs.disposition(FsOperation::Open), Disposition::NoOp);
        assert_eq!(fs.disposition(FsOperation::Write), Disposition::Unsupported);
        assert_eq!(fs.disposition(FsOperation::GetXattr), Disposition::Unsupported);
        assert_eq!(fs.disposition(FsOperation::StatFs), Disposition::Unsupported);
    }

    /// Store whose updates start failing after a fixed number succeed.
    struct FlakyStore {
        inner: MemoryStore,
        budget: AtomicUsize,
    }

    #[async_trait]
    impl BlobStore for FlakyStore {
        async fn find_by_exact_key(&self, key: &str) -> VfsResult<Option<StoredRecord>> {
            self.inner.find_by_exact_key(key).await
        }

        async fn find_by_prefix(&self, prefix: &KeyPrefix) -> VfsResult<Vec<StoredRecord>> {
            self.inner.find_by_prefix(prefix).await
        }

        async fn update_filename(&self, id: RecordId, filename: &str) -> VfsResult<()> {
            let left = self.budget.load(Ordering::SeqCst);
            if left == 0 {
                return Err(VfsError::store("connection reset"));
            }
            self.budget.store(left - 1, Ordering::SeqCst);
            self.inner.update_filename(id, filename).await
        }

        async fn open_content(&self, record: &StoredRecord) -> VfsResult<Box<dyn BlobReader>> {
            self.inner.open_content(record).await
        }
    }

    fn flaky(budget: usize) -> FlatFs<FlakyStore> {
        let inner = MemoryStore::new();
        inner.put("a/1.txt", b"".to_vec()).unwrap();
        inner.put("a/2.txt", b"".to_vec()).unwrap();
        inner.put("a/3.txt", b"".to_vec()).unwrap();
        FlatFs::new(FlakyStore {
            inner,
            budget: AtomicUsize::new(budget),
        })
    }

    #[tokio::test]
    async fn test_partial_directory_rename_is_not_rolled_back() {
        let fs = flaky(2);
        let err = fs.rename("/a", "/z").await.unwrap_err();

        match err {
            VfsError::PartialRename { moved, total, .. } => {
                assert_eq!((moved, total), (2, 3));
            }
            other => panic!("expected PartialRename, got {other}"),
        }
        assert_eq!(
            fs.store().inner.filenames().unwrap(),
            vec!["a/3.txt", "z/1.txt", "z/2.txt"]
        );
    }

    #[tokio::test]
    async fn test_directory_rename_failing_first_update() {
        let fs = flaky(0);
        let err = fs.rename("/a", "/z").await.unwrap_err();
        assert!(matches!(err, VfsError::Store(_)));
        assert_eq!(
            fs.store().inner.filenames().unwrap(),
            vec!["a/1.txt", "a/2.txt", "a/3.txt"]
        );
    }
}
