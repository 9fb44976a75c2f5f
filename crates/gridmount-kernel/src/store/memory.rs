//! In-memory blob store.
//!
//! Used for testing and as a scratch backend. All data is ephemeral.

use async_trait::async_trait;
use std::io::Cursor;
use std::sync::{Arc, RwLock};

use super::{BlobReader, BlobStore, RecordId, StoredRecord};
use crate::vfs::path::KeyPrefix;
use crate::vfs::{VfsError, VfsResult};

#[derive(Debug, Clone)]
struct Entry {
    record: StoredRecord,
    data: Arc<[u8]>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<Entry>,
    next_id: RecordId,
}

/// In-memory blob store.
///
/// Thread-safe via internal `RwLock`. Record ids double as upload
/// timestamps, so a later `put` of the same filename is the newer version.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, as a producer would. Returns its id.
    pub fn put(&self, filename: impl Into<String>, data: impl Into<Vec<u8>>) -> VfsResult<RecordId> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| VfsError::store("lock poisoned"))?;

        inner.next_id += 1;
        let id = inner.next_id;
        let data: Vec<u8> = data.into();
        let data: Arc<[u8]> = data.into();
        inner.entries.push(Entry {
            record: StoredRecord {
                id,
                filename: filename.into(),
                length: data.len() as u64,
                uploaded_at: id,
            },
            data,
        });
        Ok(id)
    }

    /// Snapshot of all filenames, sorted, duplicates included.
    pub fn filenames(&self) -> VfsResult<Vec<String>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| VfsError::store("lock poisoned"))?;
        let mut names: Vec<_> = inner.entries.iter().map(|e| e.record.filename.clone()).collect();
        names.sort();
        Ok(names)
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn find_by_exact_key(&self, key: &str) -> VfsResult<Option<StoredRecord>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| VfsError::store("lock poisoned"))?;

        Ok(inner
            .entries
            .iter()
            .filter(|e| e.record.filename == key)
            .max_by_key(|e| e.record.recency())
            .map(|e| e.record.clone()))
    }

    async fn find_by_prefix(&self, prefix: &KeyPrefix) -> VfsResult<Vec<StoredRecord>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| VfsError::store("lock poisoned"))?;

        Ok(inner
            .entries
            .iter()
            .filter(|e| prefix.matches(&e.record.filename))
            .map(|e| e.record.clone())
            .collect())
    }

    async fn update_filename(&self, id: RecordId, filename: &str) -> VfsResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| VfsError::store("lock poisoned"))?;

        let entry = inner
            .entries
            .iter_mut()
            .find(|e| e.record.id == id)
            .ok_or_else(|| VfsError::not_found(format!("record {id}")))?;
        entry.record.filename = filename.to_string();
        Ok(())
    }

    async fn open_content(&self, record: &StoredRecord) -> VfsResult<Box<dyn BlobReader>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| VfsError::store("lock poisoned"))?;

        let entry = inner
            .entries
            .iter()
            .find(|e| e.record.id == record.id)
            .ok_or_else(|| VfsError::not_found(record.filename.clone()))?;
        Ok(Box::new(Cursor::new(Arc::clone(&entry.data))))
    }
}
