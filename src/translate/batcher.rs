//! Batching queue: coalesces independent translation requests into grouped
//! provider calls.
//!
//! The first request into an idle queue opens a collection window. When it
//! closes, up to `batch_size` of the oldest requests are taken, partitioned by
//! language pair (first-seen order), and each group is sent through the rate
//! limiter as one provider call. Whatever is still pending afterwards (overflow
//! or late arrivals) is dispatched straight away without a new window.
//!
//! Every request is settled exactly once: with its translation, or with its
//! original text when the provider fails, panics, or omits a position.

use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error, info_span, warn, Instrument};

use super::cache::CacheManager;
use super::key::derive_key;
use super::rate_limit::RateLimiter;
use super::{BatchTranslator, LanguagePair};
use crate::config::BatchConfig;
use crate::metrics::{metric_names, MetricsRegistry};

/// Observable queue state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePhase {
    Idle,
    Collecting,
    Dispatching,
}

/// A pending translation. Consumed by value when settled.
pub struct TranslationRequest {
    text: String,
    pair: LanguagePair,
    settle: oneshot::Sender<String>,
    enqueued_at: Instant,
}

impl TranslationRequest {
    pub fn new(text: impl Into<String>, pair: LanguagePair) -> (Self, oneshot::Receiver<String>) {
        let (tx, rx) = oneshot::channel();
        let request = Self {
            text: text.into(),
            pair,
            settle: tx,
            enqueued_at: Instant::now(),
        };
        (request, rx)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn pair(&self) -> &LanguagePair {
        &self.pair
    }

    /// Deliver the result. A caller that stopped listening is ignored.
    fn settle(self, translated: String) {
        let _ = self.settle.send(translated);
    }

    fn settle_original(self) {
        let original = self.text.clone();
        self.settle(original);
    }
}

struct QueueState {
    pending: VecDeque<TranslationRequest>,
    phase: QueuePhase,
}

impl QueueState {
    /// Take up to `batch_size` of the oldest requests and enter `Dispatching`.
    fn take_batch(&mut self, batch_size: usize) -> Vec<TranslationRequest> {
        let take = batch_size.min(self.pending.len());
        self.phase = QueuePhase::Dispatching;
        self.pending.drain(..take).collect()
    }

    /// Close a dispatch cycle. Requests that arrived meanwhile put the queue
    /// back into `Collecting` for an immediate drain; otherwise it goes idle.
    /// Returns whether another cycle should run.
    fn end_cycle(&mut self) -> bool {
        if self.pending.is_empty() {
            self.phase = QueuePhase::Idle;
            false
        } else {
            self.phase = QueuePhase::Collecting;
            true
        }
    }
}

pub struct BatchingQueue {
    state: Mutex<QueueState>,
    cache: Arc<CacheManager>,
    limiter: Arc<RateLimiter>,
    provider: Arc<dyn BatchTranslator>,
    config: BatchConfig,
    metrics: Arc<MetricsRegistry>,
}

impl BatchingQueue {
    pub fn new(
        cache: Arc<CacheManager>,
        limiter: Arc<RateLimiter>,
        provider: Arc<dyn BatchTranslator>,
        config: BatchConfig,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                phase: QueuePhase::Idle,
            }),
            cache,
            limiter,
            provider,
            config,
            metrics,
        }
    }

    pub fn phase(&self) -> QueuePhase {
        self.state.lock().phase
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Queue `text` for translation and return the settlement channel.
    pub fn submit(self: &Arc<Self>, text: impl Into<String>, pair: LanguagePair) -> oneshot::Receiver<String> {
        let (request, rx) = TranslationRequest::new(text, pair);
        self.enqueue(request);
        rx
    }

    /// Append a request. The first request into an idle queue starts the
    /// dispatch task; later ones ride along with it.
    pub fn enqueue(self: &Arc<Self>, request: TranslationRequest) {
        let start = {
            let mut state = self.state.lock();
            state.pending.push_back(request);
            if state.phase == QueuePhase::Idle {
                state.phase = QueuePhase::Collecting;
                true
            } else {
                false
            }
        };
        if start {
            let queue = Arc::clone(self);
            tokio::spawn(async move { queue.run().await });
        }
    }

    async fn run(self: Arc<Self>) {
        tokio::time::sleep(self.config.batch_wait).await;
        loop {
            let (batch, backlog) = {
                let mut state = self.state.lock();
                let batch = state.take_batch(self.config.batch_size);
                (batch, state.pending.len())
            };

            if !batch.is_empty() {
                let span = info_span!(
                    "translation_batch",
                    batch_id = %uuid::Uuid::new_v4(),
                    size = batch.len(),
                    backlog
                );
                let cycle = self.metrics.timer(metric_names::BATCH_CYCLE);
                self.dispatch_batch(batch).instrument(span).await;
                cycle.finish();
            }

            if !self.state.lock().end_cycle() {
                return;
            }
        }
    }

    async fn dispatch_batch(&self, batch: Vec<TranslationRequest>) {
        let groups = group_by_pair(batch);
        debug!(groups = groups.len(), "dispatching batch");
        // Sequential: a stalled provider call delays the later groups of this batch.
        for (pair, requests) in groups {
            self.dispatch_group(pair, requests).await;
        }
    }

    async fn dispatch_group(&self, pair: LanguagePair, requests: Vec<TranslationRequest>) {
        for request in &requests {
            self.metrics
                .record(metric_names::QUEUE_WAIT, request.enqueued_at.elapsed());
        }

        self.limiter.await_slot().await;

        let texts: Vec<String> = requests.iter().map(|r| r.text.clone()).collect();
        let call = self.metrics.timer(metric_names::PROVIDER_CALL);
        let outcome = AssertUnwindSafe(self.provider.batch_translate(&texts, &pair.source, &pair.target))
            .catch_unwind()
            .await;
        call.finish();

        match outcome {
            Ok(Ok(results)) => self.distribute(&pair, requests, results).await,
            Ok(Err(e)) => {
                warn!(error = %e, pair = %pair, count = requests.len(), "provider call failed, returning original text");
                requests.into_iter().for_each(TranslationRequest::settle_original);
            }
            Err(_) => {
                error!(pair = %pair, count = requests.len(), "provider call panicked, returning original text");
                requests.into_iter().for_each(TranslationRequest::settle_original);
            }
        }
    }

    async fn distribute(
        &self,
        pair: &LanguagePair,
        requests: Vec<TranslationRequest>,
        results: Vec<Option<String>>,
    ) {
        if results.len() != requests.len() {
            warn!(
                pair = %pair,
                expected = requests.len(),
                received = results.len(),
                "provider result count mismatch"
            );
        }

        let mut results = results.into_iter();
        for request in requests {
            let translated = results
                .next()
                .flatten()
                .filter(|t| !t.trim().is_empty());
            match translated {
                Some(translated) => {
                    let key = derive_key(&request.text, &pair.source, &pair.target);
                    self.cache
                        .store(&key, &request.text, &translated, &pair.source, &pair.target)
                        .await;
                    request.settle(translated);
                }
                None => request.settle_original(),
            }
        }
    }
}

/// Partition by language pair, keeping first-seen pair order and FIFO order
/// inside each group.
fn group_by_pair(batch: Vec<TranslationRequest>) -> Vec<(LanguagePair, Vec<TranslationRequest>)> {
    let mut index: HashMap<LanguagePair, usize> = HashMap::new();
    let mut groups: Vec<(LanguagePair, Vec<TranslationRequest>)> = Vec::new();
    for request in batch {
        match index.get(&request.pair) {
            Some(&i) => groups[i].1.push(request),
            None => {
                index.insert(request.pair.clone(), groups.len());
                groups.push((request.pair.clone(), vec![request]));
            }
        }
    }
    groups
}
