//! Mount configuration.
//!
//! A mount names a store (database + collection) and a mount point. It can be
//! given as three positionals or as a URI plus mount point:
//!
//! ```text
//! gridmount /var/lib/gridmount/files.db photos /mnt/photos
//! gridmount sqlite:///var/lib/gridmount/files.db/photos /mnt/photos
//! ```
//!
//! In the URI form the last two path segments are the database and the
//! collection.

use std::path::{Path, PathBuf};

use url::Url;

use crate::store::SqliteStore;
use crate::vfs::{VfsError, VfsResult};

/// URI scheme accepted for the single-argument store form.
pub const URI_SCHEME: &str = "sqlite";

/// Check that `name` can be used as a collection (table name prefix).
pub fn validate_collection(name: &str) -> VfsResult<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(VfsError::invalid_argument(format!(
            "collection name {name:?} must match [A-Za-z_][A-Za-z0-9_]*"
        )))
    }
}

/// Which store a mount reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreTarget {
    /// Database file.
    pub database: PathBuf,
    /// Collection (bucket) inside the database.
    pub collection: String,
}

impl StoreTarget {
    pub fn new(database: impl Into<PathBuf>, collection: impl Into<String>) -> VfsResult<Self> {
        let database = database.into();
        let collection = collection.into();
        if database.as_os_str().is_empty() {
            return Err(VfsError::invalid_argument("database must not be empty"));
        }
        validate_collection(&collection)?;
        Ok(Self {
            database,
            collection,
        })
    }

    /// Parse `sqlite://[localhost]/<path to database>/<collection>`.
    pub fn from_uri(uri: &str) -> VfsResult<Self> {
        let url = Url::parse(uri)
            .map_err(|e| VfsError::invalid_argument(format!("{uri}: {e}")))?;
        if url.scheme() != URI_SCHEME {
            return Err(VfsError::invalid_argument(format!(
                "{uri}: scheme must be {URI_SCHEME}"
            )));
        }

        let path = url.to_file_path().map_err(|()| {
            VfsError::invalid_argument(format!("{uri}: host must be empty or localhost"))
        })?;
        let collection = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| VfsError::invalid_argument(format!("{uri}: missing collection")))?;
        let database = path
            .parent()
            .filter(|db| db.file_name().is_some())
            .ok_or_else(|| VfsError::invalid_argument(format!("{uri}: missing database")))?;

        Self::new(database, collection)
    }

    /// Final component of the database path.
    pub fn database_name(&self) -> String {
        self.database
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.database.display().to_string())
    }

    /// Open the store this target names.
    pub fn open(&self) -> VfsResult<SqliteStore> {
        SqliteStore::open(&self.database, &self.collection)
    }
}

/// Everything needed to mount one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountConfig {
    pub target: StoreTarget,
    pub mount_point: PathBuf,
}

impl MountConfig {
    /// Build from positional arguments: `<db> <collection> <mount>` or
    /// `<uri> <mount>`.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> VfsResult<Self> {
        match args {
            [database, collection, mount_point] => Ok(Self {
                target: StoreTarget::new(database.as_ref(), collection.as_ref())?,
                mount_point: PathBuf::from(mount_point.as_ref()),
            }),
            [uri, mount_point] => Ok(Self {
                target: StoreTarget::from_uri(uri.as_ref())?,
                mount_point: PathBuf::from(mount_point.as_ref()),
            }),
            _ => Err(VfsError::invalid_argument(format!(
                "expected 2 or 3 arguments, got {}",
                args.len()
            ))),
        }
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }
}
