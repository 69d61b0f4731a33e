//! Cache manager over the durable store.
//! Enforces TTL expiry and never persists a translation equal to its input.
//! Store failures never escape: lookups degrade to a miss, writes are dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::store::{now_millis, BackendKind, CacheEntry, StoreAdapter, StoreError};
use super::key::decode_key;
use crate::config::CLEANUP_INTERVAL;
use crate::metrics::{metric_names, MetricsRegistry};

/// Snapshot of cache counters.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub skipped_noop: u64,
    pub entries: Option<usize>,
    pub backend: String,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    skipped_noop: AtomicU64,
}

pub struct CacheManager {
    store: StoreAdapter,
    ttl: Duration,
    counters: Counters,
    metrics: Arc<MetricsRegistry>,
}

impl CacheManager {
    pub fn new(store: StoreAdapter, ttl: Duration, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            store,
            ttl,
            counters: Counters::default(),
            metrics,
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.store.kind()
    }

    fn cutoff(&self) -> i64 {
        now_millis() - self.ttl.as_millis() as i64
    }

    /// Cached translation for `key`, or None if absent, expired, degenerate,
    /// or unreadable.
    pub async fn lookup(&self, key: &str) -> Option<String> {
        let timer = self.metrics.timer(metric_names::CACHE_LOOKUP);
        let found = self.lookup_inner(key).await;
        timer.finish();

        let counter = if found.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    async fn lookup_inner(&self, key: &str) -> Option<String> {
        let entry = match self.store.get(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(StoreError::Corrupt { key }) => {
                match decode_key(&key) {
                    Some(parts) => warn!(
                        source_lang = %parts.source_lang,
                        target_lang = %parts.target_lang,
                        text_len = parts.text.len(),
                        "corrupt cache record, deleting"
                    ),
                    None => warn!(key = %key, "corrupt cache record with malformed key, deleting"),
                }
                self.delete_quietly(&key).await;
                return None;
            }
            Err(e) => {
                warn!(error = %e, "cache lookup failed, treating as miss");
                return None;
            }
        };

        // Expired once strictly older than the TTL.
        if entry.created_at < self.cutoff() {
            debug!(key = %key, "cache entry expired");
            self.delete_quietly(key).await;
            return None;
        }
        if entry.translated_text == entry.original_text {
            debug!(key = %key, "ignoring no-op cache entry");
            self.delete_quietly(key).await;
            return None;
        }
        Some(entry.translated_text)
    }

    /// Persist a translation. No-op translations are skipped.
    pub async fn store(
        &self,
        key: &str,
        original_text: &str,
        translated_text: &str,
        source_lang: &str,
        target_lang: &str,
    ) {
        if translated_text == original_text {
            self.counters.skipped_noop.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let entry = CacheEntry {
            key: key.to_string(),
            original_text: original_text.to_string(),
            translated_text: translated_text.to_string(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            created_at: now_millis(),
        };
        match self.store.put(entry).await {
            Ok(()) => {
                self.counters.writes.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => warn!(error = %e, "cache write failed"),
        }
    }

    /// Remove every entry older than the TTL. Returns the number removed.
    pub async fn sweep_expired(&self) -> usize {
        let timer = self.metrics.timer(metric_names::CACHE_SWEEP);
        let removed = match self.store.delete_expired(self.cutoff()).await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "cache sweep failed");
                0
            }
        };
        timer.finish();
        if removed > 0 {
            info!(removed, backend = %self.backend(), "translation cache cleanup");
        }
        removed
    }

    /// Delete everything regardless of age, forcing re-translation.
    pub async fn clear_all(&self) -> usize {
        match self.store.clear().await {
            Ok(count) => {
                info!(removed = count, "translation cache cleared");
                count
            }
            Err(e) => {
                warn!(error = %e, "cache clear failed");
                0
            }
        }
    }

    /// Drop every translation into `target_lang`.
    pub async fn invalidate_language(&self, target_lang: &str) -> usize {
        match self.store.delete_target_lang(target_lang).await {
            Ok(count) => {
                info!(removed = count, target_lang, "translation cache invalidated for language");
                count
            }
            Err(e) => {
                warn!(error = %e, target_lang, "language invalidation failed");
                0
            }
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = match self.store.len().await {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(error = %e, "cache size query failed");
                None
            }
        };
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            skipped_noop: self.counters.skipped_noop.load(Ordering::Relaxed),
            entries,
            backend: self.backend().to_string(),
        }
    }

    async fn delete_quietly(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!(error = %e, "cache delete failed");
        }
    }

    /// Sweep now, then every `interval` until `shutdown` is cancelled.
    pub fn start_cleanup_loop(
        cache: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let interval = if interval.is_zero() {
            warn!(default_secs = CLEANUP_INTERVAL.as_secs(), "zero cleanup interval, using default");
            CLEANUP_INTERVAL
        } else {
            interval
        };
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    // First tick completes immediately: the startup sweep.
                    _ = ticker.tick() => {
                        cache.sweep_expired().await;
                    }
                    _ = shutdown.cancelled() => {
                        debug!("cache cleanup loop stopping");
                        return;
                    }
                }
            }
        })
    }
}
