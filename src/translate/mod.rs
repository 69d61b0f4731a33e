//! Translation delivery: key codec, durable cache, rate limiting, batching queue,
//! and the facade callers use.

pub mod batcher;
pub mod cache;
pub mod key;
pub mod lang;
pub mod provider;
pub mod rate_limit;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

use async_trait::async_trait;

pub use batcher::{BatchingQueue, QueuePhase};
pub use cache::{CacheManager, CacheStats};
pub use provider::HttpBatchTranslator;
pub use rate_limit::RateLimiter;
pub use service::TranslationService;

/// Ordered `(source, target)` language codes, already normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl std::fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}", self.source, self.target)
    }
}

/// Remote batch translation backend.
///
/// `results[i]` corresponds to `texts[i]`; a position may be `None` when the
/// provider produced nothing for it. A failure rejects the whole call.
#[async_trait]
pub trait BatchTranslator: Send + Sync {
    async fn batch_translate(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<Option<String>>, TranslateError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("translation timeout")]
    Timeout,

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}
