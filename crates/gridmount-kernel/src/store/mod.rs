//! Blob store collaborators.
//!
//! A [`BlobStore`] is a flat collection of records keyed by filename. It
//! knows nothing about directories; [`crate::vfs::FlatFs`] derives those.

mod memory;
mod sqlite;

use std::collections::BTreeSet;
use std::io::{Read, Seek};

use async_trait::async_trait;

use crate::vfs::namespace::{self, SegmentAnchor};
use crate::vfs::path::KeyPrefix;
use crate::vfs::VfsResult;

pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, DEFAULT_CHUNK_SIZE};

/// Opaque record identifier assigned by the store.
pub type RecordId = i64;

/// Metadata of one stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: RecordId,
    /// Flat key, using `/` as the virtual separator.
    pub filename: String,
    /// Content length in bytes.
    pub length: u64,
    /// Upload time, milliseconds since the Unix epoch.
    pub uploaded_at: i64,
}

impl StoredRecord {
    /// Ordering used to pick one version among duplicate filenames.
    ///
    /// Later uploads win; equal upload times fall back to the larger id.
    pub fn recency(&self) -> (i64, RecordId) {
        (self.uploaded_at, self.id)
    }
}

/// Seekable content handle for one record.
pub trait BlobReader: Read + Seek + Send {}

impl<T: Read + Seek + Send> BlobReader for T {}

/// Flat, key-addressed blob store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// The most recent record whose filename equals `key`.
    async fn find_by_exact_key(&self, key: &str) -> VfsResult<Option<StoredRecord>>;

    /// Every record whose filename starts with `prefix`.
    async fn find_by_prefix(&self, prefix: &KeyPrefix) -> VfsResult<Vec<StoredRecord>>;

    /// Set the filename of record `id`.
    ///
    /// Fails with `NotFound` if the record no longer exists.
    async fn update_filename(&self, id: RecordId, filename: &str) -> VfsResult<()>;

    /// Open the content of `record` for seeking and reading.
    async fn open_content(&self, record: &StoredRecord) -> VfsResult<Box<dyn BlobReader>>;

    /// Returns true if any record lies below `prefix`.
    async fn has_prefix(&self, prefix: &KeyPrefix) -> VfsResult<bool> {
        Ok(!self.find_by_prefix(prefix).await?.is_empty())
    }

    /// Distinct child segments of `prefix`.
    ///
    /// Stores with a native group-by may override this; the result must be
    /// the same as this scan-and-match default.
    async fn distinct_child_segments(
        &self,
        prefix: &KeyPrefix,
        anchor: SegmentAnchor,
    ) -> VfsResult<BTreeSet<String>> {
        let records = self.find_by_prefix(prefix).await?;
        namespace::distinct_segments(prefix, anchor, records.iter().map(|r| r.filename.as_str()))
    }
}
