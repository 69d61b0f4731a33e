//! Primary backend: SQLite table keyed by cache key, indexed on `created_at`
//! for expiry sweeps and on `target_lang` for per-language invalidation.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{CacheEntry, StoreError};

/// SQLite-backed translation store. Cloning shares the connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at the given path.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let store = Self::from_connection(Connection::open(db_path)?)?;
        info!(path = %db_path.display(), "SQLite translation store opened");
        Ok(store)
    }

    /// In-memory database, lost on drop.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let conn = Self::init(conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init(conn: Connection) -> Result<Connection, StoreError> {
        // WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS translation_cache (
                cache_key TEXT PRIMARY KEY,
                original_text TEXT NOT NULL,
                translated_text TEXT NOT NULL,
                source_lang TEXT NOT NULL,
                target_lang TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_translation_created
                ON translation_cache(created_at);
            CREATE INDEX IF NOT EXISTS idx_translation_target
                ON translation_cache(target_lang);",
        )?;
        Ok(conn)
    }

    pub fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT cache_key, original_text, translated_text, source_lang, target_lang, created_at
             FROM translation_cache WHERE cache_key = ?1",
            params![key],
            |row| {
                Ok(CacheEntry {
                    key: row.get(0)?,
                    original_text: row.get(1)?,
                    translated_text: row.get(2)?,
                    source_lang: row.get(3)?,
                    target_lang: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )
        .optional()
        .map_err(|e| match e {
            rusqlite::Error::InvalidColumnType(..) | rusqlite::Error::FromSqlConversionFailure(..) => {
                StoreError::Corrupt { key: key.to_string() }
            }
            other => StoreError::Sqlite(other),
        })
    }

    pub fn put(&self, entry: &CacheEntry) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO translation_cache
             (cache_key, original_text, translated_text, source_lang, target_lang, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.key,
                entry.original_text,
                entry.translated_text,
                entry.source_lang,
                entry.target_lang,
                entry.created_at
            ],
        )?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM translation_cache WHERE cache_key = ?1", params![key])?;
        Ok(())
    }

    pub fn expired_keys(&self, cutoff: i64) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT cache_key FROM translation_cache WHERE created_at < ?1 ORDER BY created_at",
        )?;
        let keys = stmt
            .query_map(params![cutoff], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    pub fn delete_expired(&self, cutoff: i64) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let count = conn.execute(
            "DELETE FROM translation_cache WHERE created_at < ?1",
            params![cutoff],
        )?;
        if count > 0 {
            debug!(removed = count, "SQLite expired entries deleted");
        }
        Ok(count)
    }

    pub fn delete_target_lang(&self, target_lang: &str) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let count = conn.execute(
            "DELETE FROM translation_cache WHERE target_lang = ?1",
            params![target_lang],
        )?;
        Ok(count)
    }

    pub fn clear(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        Ok(conn.execute("DELETE FROM translation_cache", [])?)
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM translation_cache", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
