//! Fallback backend: a single JSON document mapping key -> record, read and
//! rewritten synchronously on every operation. Callers go through
//! `StoreAdapter`, which runs these methods on the blocking pool.
//!
//! Records are decoded one at a time so a single damaged record shows up as
//! `StoreError::Corrupt` instead of poisoning the whole document. Writes that
//! fail (I/O error or the soft size cap) evict expired records and retry once;
//! if that also fails the write is dropped.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use super::{now_millis, CacheEntry, StoreError};

type Document = BTreeMap<String, Value>;

#[derive(Clone)]
pub struct FlatStore {
    inner: Arc<FlatInner>,
}

struct FlatInner {
    path: PathBuf,
    max_bytes: u64,
    ttl: Duration,
    /// Serializes read-modify-write cycles on the document.
    io: Mutex<()>,
}

impl FlatStore {
    pub fn new(path: PathBuf, max_bytes: u64, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(FlatInner {
                path,
                max_bytes,
                ttl,
                io: Mutex::new(()),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let _guard = self.inner.io.lock();
        let doc = self.load()?;
        match doc.get(key) {
            None => Ok(None),
            Some(raw) => serde_json::from_value(raw.clone())
                .map(Some)
                .map_err(|_| StoreError::Corrupt { key: key.to_string() }),
        }
    }

    /// Best-effort write. Quota and I/O failures are absorbed here.
    pub fn put(&self, entry: CacheEntry) -> Result<(), StoreError> {
        let _guard = self.inner.io.lock();
        let mut doc = self.load()?;
        let key = entry.key.clone();
        doc.insert(key.clone(), serde_json::to_value(&entry)?);

        let first = match self.persist(&doc) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        warn!(error = %first, "flat store write failed, evicting expired records");

        let cutoff = now_millis() - self.inner.ttl.as_millis() as i64;
        let evicted = evict_expired(&mut doc, cutoff);
        if let Err(e) = self.persist(&doc) {
            warn!(error = %e, key = %key, evicted = evicted.len(), "flat store write dropped");
        } else {
            debug!(evicted = evicted.len(), "flat store write succeeded after eviction");
        }
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.inner.io.lock();
        let mut doc = self.load()?;
        if doc.remove(key).is_some() {
            self.persist(&doc)?;
        }
        Ok(())
    }

    /// Full scan. Records that no longer decode are reported as expired so the
    /// sweep removes them.
    pub fn expired_keys(&self, cutoff: i64) -> Result<Vec<String>, StoreError> {
        let _guard = self.inner.io.lock();
        let doc = self.load()?;
        let mut expired: Vec<(i64, String)> = doc
            .iter()
            .filter_map(|(key, raw)| match created_at(raw) {
                Some(ts) if ts >= cutoff => None,
                Some(ts) => Some((ts, key.clone())),
                None => Some((i64::MIN, key.clone())),
            })
            .collect();
        expired.sort();
        Ok(expired.into_iter().map(|(_, key)| key).collect())
    }

    pub fn delete_expired(&self, cutoff: i64) -> Result<usize, StoreError> {
        let _guard = self.inner.io.lock();
        let mut doc = self.load()?;
        let removed = evict_expired(&mut doc, cutoff).len();
        if removed > 0 {
            self.persist(&doc)?;
        }
        Ok(removed)
    }

    pub fn delete_target_lang(&self, target_lang: &str) -> Result<usize, StoreError> {
        let _guard = self.inner.io.lock();
        let mut doc = self.load()?;
        let before = doc.len();
        doc.retain(|_, raw| raw.get("target_lang").and_then(Value::as_str) != Some(target_lang));
        let removed = before - doc.len();
        if removed > 0 {
            self.persist(&doc)?;
        }
        Ok(removed)
    }

    pub fn clear(&self) -> Result<usize, StoreError> {
        let _guard = self.inner.io.lock();
        let removed = self.load()?.len();
        match std::fs::remove_file(&self.inner.path) {
            Ok(()) => Ok(removed),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let _guard = self.inner.io.lock();
        Ok(self.load()?.len())
    }

    /// Read the whole document. A missing file is empty; an unparsable one is
    /// treated as empty and overwritten by the next write.
    fn load(&self) -> Result<Document, StoreError> {
        let data = match std::fs::read_to_string(&self.inner.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&data) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                warn!(error = %e, path = %self.inner.path.display(), "flat store unreadable, starting empty");
                Ok(Document::new())
            }
        }
    }

    fn persist(&self, doc: &Document) -> Result<(), StoreError> {
        let json = serde_json::to_vec(doc)?;
        let size = json.len() as u64;
        if size > self.inner.max_bytes {
            return Err(StoreError::QuotaExceeded {
                size,
                limit: self.inner.max_bytes,
            });
        }
        let tmp = self.inner.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, &self.inner.path)?;
        Ok(())
    }
}

fn created_at(raw: &Value) -> Option<i64> {
    raw.get("created_at").and_then(Value::as_i64)
}

/// Drop records created before `cutoff` and records without a readable
/// timestamp. Returns the removed keys.
fn evict_expired(doc: &mut Document, cutoff: i64) -> Vec<String> {
    let stale: Vec<String> = doc
        .iter()
        .filter(|(_, raw)| created_at(raw).map_or(true, |ts| ts < cutoff))
        .map(|(key, _)| key.clone())
        .collect();
    for key in &stale {
        doc.remove(key);
    }
    stale
}
