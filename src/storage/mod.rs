//! Key-value backends holding the persisted JSON documents.
//!
//! Every backend stores opaque text values under string keys, mirroring the
//! browser's local storage. Serialization lives one layer up in
//! [`crate::persistence`].

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::AppError;

mod file;
mod memory;
mod sqlite;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub const SQLITE_FILE_NAME: &str = "fincent.sqlite3";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage database failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("value for `{key}` is {size} bytes which exceeds the {limit} byte quota")]
    QuotaExceeded {
        key: String,
        size: usize,
        limit: usize,
    },
    #[error("invalid storage key `{0}`")]
    InvalidKey(String),
    #[error("storage lock poisoned")]
    Poisoned,
}

impl From<StorageError> for AppError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::Io(err) => {
                AppError::new("STORAGE/IO", "Storage read or write failed.").with_cause(err)
            }
            StorageError::Sqlite(err) => {
                AppError::new("STORAGE/SQLITE", "Storage database failed.").with_cause(err)
            }
            StorageError::QuotaExceeded { key, size, limit } => {
                AppError::new("STORAGE/QUOTA_EXCEEDED", "Storage quota exceeded.").with_contexts([
                    ("key", key),
                    ("size", size.to_string()),
                    ("limit", limit.to_string()),
                ])
            }
            StorageError::InvalidKey(key) => {
                AppError::new("STORAGE/INVALID_KEY", "Storage key is not allowed.")
                    .with_context("key", key)
            }
            StorageError::Poisoned => AppError::new("STORAGE/POISONED", "Storage lock poisoned."),
        }
    }
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    /// Short backend name used in log events.
    fn kind(&self) -> StorageBackend;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    File,
    Sqlite,
}

impl StorageBackend {
    pub const fn as_str(self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::File => "file",
            StorageBackend::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "file" => Ok(StorageBackend::File),
            "sqlite" => Ok(StorageBackend::Sqlite),
            other => Err(AppError::new(
                "CONFIG/INVALID_BACKEND",
                "Storage backend must be one of memory, file, sqlite.",
            )
            .with_context("value", other.to_string())),
        }
    }
}

/// Opens the configured backend rooted at `data_dir`.
pub fn open_backend(
    kind: StorageBackend,
    data_dir: &Path,
    quota_bytes: Option<usize>,
) -> Result<Arc<dyn KeyValueStore>, StorageError> {
    let store: Arc<dyn KeyValueStore> = match kind {
        StorageBackend::Memory => Arc::new(MemoryStore::with_quota(quota_bytes)),
        StorageBackend::File => Arc::new(FileStore::new(data_dir).with_quota(quota_bytes)),
        StorageBackend::Sqlite => {
            std::fs::create_dir_all(data_dir)?;
            Arc::new(SqliteStore::open(data_dir.join(SQLITE_FILE_NAME))?.with_quota(quota_bytes))
        }
    };
    Ok(store)
}

pub(crate) fn check_quota(
    limit: Option<usize>,
    key: &str,
    value: &str,
) -> Result<(), StorageError> {
    match limit {
        Some(limit) if value.len() > limit => Err(StorageError::QuotaExceeded {
            key: key.to_string(),
            size: value.len(),
            limit,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn backend_names_round_trip() {
        for kind in [
            StorageBackend::Memory,
            StorageBackend::File,
            StorageBackend::Sqlite,
        ] {
            assert_eq!(kind.as_str().parse::<StorageBackend>().unwrap(), kind);
        }
        let err = "redis".parse::<StorageBackend>().unwrap_err();
        assert_eq!(err.code(), "CONFIG/INVALID_BACKEND");
    }

    #[test]
    fn quota_error_maps_to_app_error() {
        let err = check_quota(Some(4), "entities", "[1,2,3]").unwrap_err();
        let app: AppError = err.into();
        assert_eq!(app.code(), "STORAGE/QUOTA_EXCEEDED");
        assert_eq!(app.context().get("key").map(String::as_str), Some("entities"));
        assert!(check_quota(None, "entities", "[1,2,3]").is_ok());
    }

    #[test]
    fn every_backend_stores_and_removes_values() {
        let dir = tempdir().unwrap();
        for kind in [
            StorageBackend::Memory,
            StorageBackend::File,
            StorageBackend::Sqlite,
        ] {
            let store = open_backend(kind, dir.path(), None).unwrap();
            assert_eq!(store.kind(), kind);
            assert_eq!(store.get("familyMembers").unwrap(), None);
            store.set("familyMembers", "[]").unwrap();
            store.set("familyMembers", "[{\"id\":\"m1\"}]").unwrap();
            assert_eq!(
                store.get("familyMembers").unwrap().as_deref(),
                Some("[{\"id\":\"m1\"}]")
            );
            store.remove("familyMembers").unwrap();
            assert_eq!(store.get("familyMembers").unwrap(), None);
            store.remove("familyMembers").unwrap();
        }
    }
}
