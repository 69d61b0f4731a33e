//! Durable store adapter.
//! One async API over two physical backends: SQLite (primary, indexed) and a
//! flat JSON document (fallback). The backend is chosen once by `open_store`
//! and never switched mid-process. The adapter keeps no entries in memory.
//! Both backends do blocking file I/O, so every call runs on the blocking pool.

pub mod flat;
pub mod sqlite;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{BackendPreference, StoreConfig};

pub use flat::FlatStore;
pub use sqlite::SqliteStore;

/// A persisted translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub original_text: String,
    pub translated_text: String,
    pub source_lang: String,
    pub target_lang: String,
    /// Unix milliseconds.
    pub created_at: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("flat store would grow to {size} bytes (limit {limit})")]
    QuotaExceeded { size: u64, limit: u64 },

    #[error("corrupt record for key {key}")]
    Corrupt { key: String },

    #[error("store task failed: {0}")]
    Join(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Sqlite,
    Flat,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Sqlite => write!(f, "sqlite"),
            BackendKind::Flat => write!(f, "flat"),
        }
    }
}

/// Uniform handle over whichever backend was selected at startup.
#[derive(Clone)]
pub enum StoreAdapter {
    Sqlite(SqliteStore),
    Flat(FlatStore),
}

impl StoreAdapter {
    pub fn kind(&self) -> BackendKind {
        match self {
            StoreAdapter::Sqlite(_) => BackendKind::Sqlite,
            StoreAdapter::Flat(_) => BackendKind::Flat,
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        match self {
            StoreAdapter::Sqlite(db) => {
                let db = db.clone();
                let key = key.to_string();
                blocking(move || db.get(&key)).await
            }
            StoreAdapter::Flat(file) => {
                let file = file.clone();
                let key = key.to_string();
                blocking(move || file.get(&key)).await
            }
        }
    }

    pub async fn put(&self, entry: CacheEntry) -> Result<(), StoreError> {
        match self {
            StoreAdapter::Sqlite(db) => {
                let db = db.clone();
                blocking(move || db.put(&entry)).await
            }
            StoreAdapter::Flat(file) => {
                let file = file.clone();
                blocking(move || file.put(entry)).await
            }
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self {
            StoreAdapter::Sqlite(db) => {
                let db = db.clone();
                let key = key.to_string();
                blocking(move || db.delete(&key)).await
            }
            StoreAdapter::Flat(file) => {
                let file = file.clone();
                let key = key.to_string();
                blocking(move || file.delete(&key)).await
            }
        }
    }

    /// Keys of entries created before `cutoff` (Unix ms), oldest first.
    pub async fn expired_keys(&self, cutoff: i64) -> Result<Vec<String>, StoreError> {
        match self {
            StoreAdapter::Sqlite(db) => {
                let db = db.clone();
                blocking(move || db.expired_keys(cutoff)).await
            }
            StoreAdapter::Flat(file) => {
                let file = file.clone();
                blocking(move || file.expired_keys(cutoff)).await
            }
        }
    }

    /// Delete everything created before `cutoff`. Returns the count removed.
    pub async fn delete_expired(&self, cutoff: i64) -> Result<usize, StoreError> {
        match self {
            StoreAdapter::Sqlite(db) => {
                let db = db.clone();
                blocking(move || db.delete_expired(cutoff)).await
            }
            StoreAdapter::Flat(file) => {
                let file = file.clone();
                blocking(move || file.delete_expired(cutoff)).await
            }
        }
    }

    pub async fn delete_target_lang(&self, target_lang: &str) -> Result<usize, StoreError> {
        match self {
            StoreAdapter::Sqlite(db) => {
                let db = db.clone();
                let lang = target_lang.to_string();
                blocking(move || db.delete_target_lang(&lang)).await
            }
            StoreAdapter::Flat(file) => {
                let file = file.clone();
                let lang = target_lang.to_string();
                blocking(move || file.delete_target_lang(&lang)).await
            }
        }
    }

    pub async fn clear(&self) -> Result<usize, StoreError> {
        match self {
            StoreAdapter::Sqlite(db) => {
                let db = db.clone();
                blocking(move || db.clear()).await
            }
            StoreAdapter::Flat(file) => {
                let file = file.clone();
                blocking(move || file.clear()).await
            }
        }
    }

    pub async fn len(&self) -> Result<usize, StoreError> {
        match self {
            StoreAdapter::Sqlite(db) => {
                let db = db.clone();
                blocking(move || db.len()).await
            }
            StoreAdapter::Flat(file) => {
                let file = file.clone();
                blocking(move || file.len()).await
            }
        }
    }
}

/// Open the configured backend, falling back to the flat file if SQLite is
/// unavailable. Runs once per process.
pub fn open_store(config: &StoreConfig, ttl: Duration) -> StoreAdapter {
    if let Err(e) = std::fs::create_dir_all(&config.dir) {
        warn!(error = %e, dir = %config.dir.display(), "store directory not creatable");
    }

    if config.backend != BackendPreference::Flat {
        match SqliteStore::open(&config.sqlite_path()) {
            Ok(db) => return StoreAdapter::Sqlite(db),
            Err(e) => {
                warn!(error = %e, "SQLite store unavailable, falling back to flat store");
            }
        }
    }

    let file = FlatStore::new(config.flat_path(), config.flat_max_bytes, ttl);
    info!(path = %config.flat_path().display(), "flat translation store selected");
    StoreAdapter::Flat(file)
}

/// Current time as Unix timestamp (milliseconds).
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
}

#[cfg(test)]
pub(crate) fn sample_entry(key: &str, target_lang: &str, created_at: i64) -> CacheEntry {
    CacheEntry {
        key: key.to_string(),
        original_text: format!("original {key}"),
        translated_text: format!("translated {key}"),
        source_lang: "en".into(),
        target_lang: target_lang.into(),
        created_at,
    }
}
