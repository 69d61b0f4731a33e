//! Recording provider double shared by the unit tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::cache::CacheManager;
use super::store::{SqliteStore, StoreAdapter};
use super::{BatchTranslator, TranslateError};
use crate::metrics::MetricsRegistry;

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub texts: Vec<String>,
    pub source: String,
    pub target: String,
    pub at: Instant,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Behaviour {
    /// `text` -> `[target] text`
    Tag,
    /// Return the input unchanged.
    Echo,
    /// Only return the first `n` results.
    Truncate(usize),
    Panic,
}

pub(crate) struct MockTranslator {
    calls: Mutex<Vec<RecordedCall>>,
    failing_targets: Vec<String>,
    behaviour: Behaviour,
    delay: Duration,
}

impl MockTranslator {
    pub fn new(behaviour: Behaviour) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing_targets: Vec::new(),
            behaviour,
            delay: Duration::ZERO,
        }
    }

    pub fn failing_for(mut self, target: &str) -> Self {
        self.failing_targets.push(target.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl BatchTranslator for MockTranslator {
    async fn batch_translate(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<Option<String>>, TranslateError> {
        self.calls.lock().push(RecordedCall {
            texts: texts.to_vec(),
            source: source_lang.to_string(),
            target: target_lang.to_string(),
            at: Instant::now(),
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing_targets.iter().any(|t| t == target_lang) {
            return Err(TranslateError::Api(format!("{target_lang} unavailable")));
        }
        let tagged = |t: &String| Some(format!("[{target_lang}] {t}"));
        match self.behaviour {
            Behaviour::Tag => Ok(texts.iter().map(tagged).collect()),
            Behaviour::Echo => Ok(texts.iter().cloned().map(Some).collect()),
            Behaviour::Truncate(n) => Ok(texts.iter().take(n).map(tagged).collect()),
            Behaviour::Panic => panic!("provider exploded"),
        }
    }
}

pub(crate) fn memory_cache() -> Arc<CacheManager> {
    let store = StoreAdapter::Sqlite(SqliteStore::open_in_memory().expect("in-memory sqlite"));
    Arc::new(CacheManager::new(
        store,
        Duration::from_secs(3600),
        Arc::new(MetricsRegistry::new()),
    ))
}
