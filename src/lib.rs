//! shopfront-i18n: storefront translation delivery.
//! Coalesces independent translate requests into batched, rate-limited
//! provider calls, backed by a durable TTL cache (SQLite, or a flat JSON file
//! when SQLite is unavailable).

pub mod config;
pub mod metrics;
pub mod translate;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use config::PipelineConfig;
use metrics::MetricsRegistry;
use translate::store::open_store;
use translate::{BatchTranslator, BatchingQueue, CacheManager, RateLimiter, TranslationService};

/// Install the global tracing subscriber. `RUST_LOG` wins over the default
/// filter; `SHOPFRONT_I18N_LOG_JSON=1` switches to JSON lines.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("shopfront_i18n=info"));
    let json = std::env::var("SHOPFRONT_I18N_LOG_JSON").is_ok_and(|v| v == "1");

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// A running pipeline: facade plus its background cache sweep.
pub struct Pipeline {
    service: Arc<TranslationService>,
    metrics: Arc<MetricsRegistry>,
    shutdown: CancellationToken,
    cleanup: tokio::task::JoinHandle<()>,
}

impl Pipeline {
    /// Wire store, cache, limiter, queue, and facade around `provider`, and
    /// start the periodic expiry sweep. Must be called inside a tokio runtime.
    pub fn start(config: &PipelineConfig, provider: Arc<dyn BatchTranslator>) -> Self {
        let metrics = Arc::new(MetricsRegistry::new());
        let store = open_store(&config.store, config.cache.ttl);
        let cache = Arc::new(CacheManager::new(store, config.cache.ttl, Arc::clone(&metrics)));
        let limiter = Arc::new(RateLimiter::new(config.batch.min_request_interval));
        let queue = Arc::new(BatchingQueue::new(
            Arc::clone(&cache),
            limiter,
            provider,
            config.batch.clone(),
            Arc::clone(&metrics),
        ));
        let service = Arc::new(TranslationService::new(
            Arc::clone(&cache),
            queue,
            &config.default_source_lang,
        ));

        let shutdown = CancellationToken::new();
        let cleanup = CacheManager::start_cleanup_loop(
            Arc::clone(&cache),
            config.cache.cleanup_interval,
            shutdown.child_token(),
        );

        info!(
            backend = %cache.backend(),
            batch_size = config.batch.batch_size,
            batch_wait_ms = config.batch.batch_wait.as_millis() as u64,
            "translation pipeline started"
        );

        Self {
            service,
            metrics,
            shutdown,
            cleanup,
        }
    }

    pub fn service(&self) -> Arc<TranslationService> {
        Arc::clone(&self.service)
    }

    pub fn metrics(&self) -> Arc<MetricsRegistry> {
        Arc::clone(&self.metrics)
    }

    /// Stop the background sweep. In-flight translations still settle.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.cleanup.await {
            tracing::warn!(error = %e, "cache cleanup task ended abnormally");
        }
        info!("translation pipeline stopped");
    }
}
