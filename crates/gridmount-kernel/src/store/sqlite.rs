//! SQLite blob store.
//!
//! Records live in a GridFS-shaped pair of tables inside one SQLite file,
//! one pair per bucket (collection):
//!
//! ```text
//! <bucket>_files   id, filename, length, chunk_size, upload_date
//! <bucket>_chunks  files_id, n, data
//! ```
//!
//! Content is split into fixed-size chunks and read back lazily, one chunk
//! at a time, so seeking into a large blob does not load all of it.

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::{BlobReader, BlobStore, RecordId, StoredRecord};
use crate::config::validate_collection;
use crate::vfs::namespace::{self, SegmentAnchor};
use crate::vfs::path::KeyPrefix;
use crate::vfs::{VfsError, VfsResult};

/// Chunk size used for new uploads (255 KiB, as GridFS).
pub const DEFAULT_CHUNK_SIZE: usize = 255 * 1024;

/// Blob store backed by a SQLite database file.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    bucket: String,
    files: String,
    chunks: String,
    chunk_size: usize,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("bucket", &self.bucket)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

fn schema(files: &str, chunks: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {files} (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    length INTEGER NOT NULL,
    chunk_size INTEGER NOT NULL,
    upload_date INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_{files}_filename ON {files}(filename, upload_date);

CREATE TABLE IF NOT EXISTS {chunks} (
    files_id INTEGER NOT NULL,
    n INTEGER NOT NULL,
    data BLOB NOT NULL,
    PRIMARY KEY (files_id, n)
);
"#
    )
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredRecord> {
    let length: i64 = row.get(2)?;
    Ok(StoredRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        length: length.max(0) as u64,
        uploaded_at: row.get(3)?,
    })
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl SqliteStore {
    /// Open or create the bucket `bucket` in the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P, bucket: &str) -> VfsResult<Self> {
        validate_collection(bucket)?;
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| VfsError::store_unavailable(format!("{}: {e}", path.display())))?;
        Self::with_connection(conn, bucket)
    }

    /// Create a store in an in-memory database (for testing).
    pub fn in_memory(bucket: &str) -> VfsResult<Self> {
        validate_collection(bucket)?;
        let conn = Connection::open_in_memory()
            .map_err(|e| VfsError::store_unavailable(e.to_string()))?;
        Self::with_connection(conn, bucket)
    }

    fn with_connection(conn: Connection, bucket: &str) -> VfsResult<Self> {
        let files = format!("{bucket}_files");
        let chunks = format!("{bucket}_chunks");
        conn.execute_batch(&schema(&files, &chunks))
            .map_err(|e| VfsError::store_unavailable(format!("bucket {bucket}: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            bucket: bucket.to_string(),
            files,
            chunks,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Use `chunk_size` bytes per chunk for subsequent uploads.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Name of the bucket this store reads.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload a record, as a producer would. Returns its id.
    pub fn put(&self, filename: &str, data: &[u8]) -> VfsResult<RecordId> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            &format!(
                "INSERT INTO {} (filename, length, chunk_size, upload_date)
                 VALUES (?1, ?2, ?3, ?4)",
                self.files
            ),
            params![
                filename,
                data.len() as i64,
                self.chunk_size as i64,
                now_millis()
            ],
        )?;
        let id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (files_id, n, data) VALUES (?1, ?2, ?3)",
                self.chunks
            ))?;
            for (n, chunk) in data.chunks(self.chunk_size).enumerate() {
                stmt.execute(params![id, n as i64, chunk])?;
            }
        }

        tx.commit()?;
        Ok(id)
    }
}

#[async_trait]
impl BlobStore for SqliteStore {
    async fn find_by_exact_key(&self, key: &str) -> VfsResult<Option<StoredRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                &format!(
                    "SELECT id, filename, length, upload_date FROM {}
                     WHERE filename = ?1
                     ORDER BY upload_date DESC, id DESC LIMIT 1",
                    self.files
                ),
                params![key],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    async fn find_by_prefix(&self, prefix: &KeyPrefix) -> VfsResult<Vec<StoredRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, filename, length, upload_date FROM {}
             WHERE substr(filename, 1, length(?1)) = ?1
             ORDER BY id",
            self.files
        ))?;
        let records = stmt
            .query_map(params![prefix.as_str()], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    async fn update_filename(&self, id: RecordId, filename: &str) -> VfsResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            &format!("UPDATE {} SET filename = ?1 WHERE id = ?2", self.files),
            params![filename, id],
        )?;
        if changed == 0 {
            return Err(VfsError::not_found(format!("record {id}")));
        }
        Ok(())
    }

    async fn open_content(&self, record: &StoredRecord) -> VfsResult<Box<dyn BlobReader>> {
        let chunk_size: Option<i64> = {
            let conn = self.conn.lock();
            conn.query_row(
                &format!("SELECT chunk_size FROM {} WHERE id = ?1", self.files),
                params![record.id],
                |row| row.get(0),
            )
            .optional()?
        };
        let chunk_size = chunk_size.ok_or_else(|| VfsError::not_found(record.filename.clone()))?;

        Ok(Box::new(ChunkReader {
            conn: Arc::clone(&self.conn),
            select_chunk: format!(
                "SELECT data FROM {} WHERE files_id = ?1 AND n = ?2",
                self.chunks
            ),
            files_id: record.id,
            length: record.length,
            chunk_size: chunk_size.max(1) as u64,
            pos: 0,
            cached: None,
        }))
    }

    async fn has_prefix(&self, prefix: &KeyPrefix) -> VfsResult<bool> {
        let conn = self.conn.lock();
        let found: bool = conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE substr(filename, 1, length(?1)) = ?1)",
                self.files
            ),
            params![prefix.as_str()],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    async fn distinct_child_segments(
        &self,
        prefix: &KeyPrefix,
        anchor: SegmentAnchor,
    ) -> VfsResult<BTreeSet<String>> {
        let names = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(&format!(
                "SELECT DISTINCT filename FROM {} WHERE substr(filename, 1, length(?1)) = ?1",
                self.files
            ))?;
            stmt.query_map(params![prefix.as_str()], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?
        };
        namespace::distinct_segments(prefix, anchor, names.iter().map(String::as_str))
    }
}

/// Lazy reader over the chunks of one record.
struct ChunkReader {
    conn: Arc<Mutex<Connection>>,
    select_chunk: String,
    files_id: RecordId,
    length: u64,
    chunk_size: u64,
    pos: u64,
    cached: Option<(u64, Vec<u8>)>,
}

impl ChunkReader {
    fn fetch(&self, n: u64) -> io::Result<Vec<u8>> {
        let conn = self.conn.lock();
        conn.query_row(&self.select_chunk, params![self.files_id, n as i64], |row| {
            row.get::<_, Vec<u8>>(0)
        })
        .optional()
        .map_err(io::Error::other)?
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("missing chunk {n} of record {}", self.files_id),
            )
        })
    }

    fn chunk(&mut self, n: u64) -> io::Result<&[u8]> {
        let stale = !matches!(&self.cached, Some((cached, _)) if *cached == n);
        if stale {
            let data = self.fetch(n)?;
            self.cached = Some((n, data));
        }
        match &self.cached {
            Some((_, data)) => Ok(data),
            None => Ok(&[]),
        }
    }
}

impl Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.pos >= self.length {
            return Ok(0);
        }

        let n = self.pos / self.chunk_size;
        let offset = (self.pos % self.chunk_size) as usize;
        let remaining = usize::try_from(self.length - self.pos).unwrap_or(usize::MAX);
        let files_id = self.files_id;

        let chunk = self.chunk(n)?;
        if offset >= chunk.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short chunk {n} of record {files_id}"),
            ));
        }
        let count = (chunk.len() - offset).min(buf.len()).min(remaining);
        buf[..count].copy_from_slice(&chunk[offset..offset + count]);

        self.pos += count as u64;
        Ok(count)
    }
}

impl Seek for ChunkReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(delta) => self.length.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of content")
        })?;
        self.pos = target;
        Ok(target)
    }
}
