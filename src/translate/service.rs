//! Translation facade: the only entry point callers use.
//! Short-circuits trivial input, serves cache hits, and hands misses to the
//! batching queue. Never fails: the worst case is the original text.

use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::{Map, Value};
use tracing::debug;

use super::batcher::BatchingQueue;
use super::cache::{CacheManager, CacheStats};
use super::key::derive_key;
use super::lang::{detect_language, normalize_language_code};
use super::LanguagePair;

/// Source code that asks for detection instead of naming a language.
pub const AUTO_DETECT: &str = "auto";

pub struct TranslationService {
    cache: Arc<CacheManager>,
    queue: Arc<BatchingQueue>,
    default_source_lang: String,
}

impl TranslationService {
    pub fn new(cache: Arc<CacheManager>, queue: Arc<BatchingQueue>, default_source_lang: &str) -> Self {
        Self {
            cache,
            queue,
            default_source_lang: normalize_language_code(default_source_lang, "en"),
        }
    }

    pub fn default_source_lang(&self) -> &str {
        &self.default_source_lang
    }

    fn resolve_pair(&self, text: &str, target_lang: &str, source_lang: Option<&str>) -> LanguagePair {
        let fallback = self.default_source_lang.as_str();
        let source = match source_lang {
            Some(code) if code.trim().eq_ignore_ascii_case(AUTO_DETECT) => {
                detect_language(text).unwrap_or_else(|| fallback.to_string())
            }
            Some(code) => normalize_language_code(code, fallback),
            None => fallback.to_string(),
        };
        // An unusable target collapses onto the source and short-circuits.
        let target = normalize_language_code(target_lang, &source);
        LanguagePair::new(source, target)
    }

    /// Translate one string. `source_lang` defaults to the configured source
    /// language; `"auto"` detects it from the text.
    pub async fn translate_text(&self, text: &str, target_lang: &str, source_lang: Option<&str>) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }
        let pair = self.resolve_pair(text, target_lang, source_lang);
        if pair.source == pair.target {
            return text.to_string();
        }

        let key = derive_key(text, &pair.source, &pair.target);
        if let Some(hit) = self.cache.lookup(&key).await {
            return hit;
        }

        let rx = self.queue.submit(text, pair);
        match rx.await {
            Ok(translated) => translated,
            Err(_) => {
                debug!("translation request dropped unsettled, returning original");
                text.to_string()
            }
        }
    }

    /// Translate many strings concurrently; output order matches input.
    pub async fn translate_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
        target_lang: &str,
        source_lang: Option<&str>,
    ) -> Vec<String> {
        join_all(
            texts
                .iter()
                .map(|text| self.translate_text(text.as_ref(), target_lang, source_lang)),
        )
        .await
    }

    /// Copy of `object` with each listed key translated when its value is a
    /// non-empty string. Everything else passes through untouched.
    pub async fn translate_object<S: AsRef<str>>(
        &self,
        object: &Map<String, Value>,
        keys: &[S],
        target_lang: &str,
        source_lang: Option<&str>,
    ) -> Map<String, Value> {
        let fields: Vec<(&str, &str)> = keys
            .iter()
            .filter_map(|key| {
                let key = key.as_ref();
                match object.get(key) {
                    Some(Value::String(s)) if !s.is_empty() => Some((key, s.as_str())),
                    _ => None,
                }
            })
            .collect();

        let translated = join_all(
            fields
                .iter()
                .map(|(_, text)| self.translate_text(text, target_lang, source_lang)),
        )
        .await;

        let mut out = object.clone();
        for ((key, _), value) in fields.into_iter().zip(translated) {
            out.insert(key.to_string(), Value::String(value));
        }
        out
    }

    /// `translate_object` over every element, concurrently.
    pub async fn translate_object_array<S: AsRef<str>>(
        &self,
        objects: &[Map<String, Value>],
        keys: &[S],
        target_lang: &str,
        source_lang: Option<&str>,
    ) -> Vec<Map<String, Value>> {
        join_all(
            objects
                .iter()
                .map(|object| self.translate_object(object, keys, target_lang, source_lang)),
        )
        .await
    }

    pub async fn clear_cache(&self) -> usize {
        self.cache.clear_all().await
    }

    pub async fn sweep_cache(&self) -> usize {
        self.cache.sweep_expired().await
    }

    pub async fn invalidate_language(&self, target_lang: &str) -> usize {
        let lang = normalize_language_code(target_lang, &self.default_source_lang);
        self.cache.invalidate_language(&lang).await
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchConfig;
    use crate::metrics::MetricsRegistry;
    use crate::translate::rate_limit::RateLimiter;
    use crate::translate::test_support::{memory_cache, Behaviour, MockTranslator};
    use serde_json::json;
    use std::time::Duration;

    fn service(provider: Arc<MockTranslator>) -> (TranslationService, Arc<CacheManager>) {
        let cache = memory_cache();
        let queue = Arc::new(BatchingQueue::new(
            Arc::clone(&cache),
            Arc::new(RateLimiter::new(Duration::from_millis(1))),
            provider,
            BatchConfig {
                batch_wait: Duration::from_millis(10),
                batch_size: 10,
                min_request_interval: Duration::from_millis(1),
            },
            Arc::new(MetricsRegistry::new()),
        ));
        (TranslationService::new(Arc::clone(&cache), queue, "en"), cache)
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn same_language_short_circuits() {
        let provider = Arc::new(MockTranslator::new(Behaviour::Tag));
        let (service, cache) = service(Arc::clone(&provider));

        assert_eq!(service.translate_text("Hello", "en", Some("en")).await, "Hello");
        assert_eq!(service.translate_text("Hello", "en-GB", None).await, "Hello");
        assert_eq!(provider.call_count(), 0);
        let stats = cache.stats().await;
        assert_eq!(stats.hits + stats.misses, 0);
    }

    #[tokio::test]
    async fn blank_text_short_circuits() {
        let provider = Arc::new(MockTranslator::new(Behaviour::Tag));
        let (service, cache) = service(Arc::clone(&provider));

        assert_eq!(service.translate_text("   ", "fr", None).await, "   ");
        assert_eq!(service.translate_text("", "fr", None).await, "");
        assert_eq!(provider.call_count(), 0);
        assert_eq!(cache.stats().await.misses, 0);
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let provider = Arc::new(MockTranslator::new(Behaviour::Tag));
        let (service, _) = service(Arc::clone(&provider));

        assert_eq!(service.translate_text("Hello", "fr", None).await, "[fr] Hello");
        assert_eq!(service.translate_text("Hello", "fr-CA", Some("en-US")).await, "[fr] Hello");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn regional_codes_reach_provider_normalized() {
        let provider = Arc::new(MockTranslator::new(Behaviour::Tag));
        let (service, _) = service(Arc::clone(&provider));

        service.translate_text("Shoes", "pt_BR", Some("EN-us")).await;
        let call = &provider.calls()[0];
        assert_eq!((call.source.as_str(), call.target.as_str()), ("en", "pt"));
    }

    #[tokio::test]
    async fn batch_preserves_input_order_in_one_call() {
        let provider = Arc::new(MockTranslator::new(Behaviour::Tag));
        let (service, _) = service(Arc::clone(&provider));

        let out = service.translate_batch(&["a", "b", "c"], "de", None).await;
        assert_eq!(out, vec!["[de] a", "[de] b", "[de] c"]);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn object_translation_passes_through_non_strings() {
        let provider = Arc::new(MockTranslator::new(Behaviour::Tag));
        let (service, _) = service(Arc::clone(&provider));

        let product = object(json!({
            "name": "Blue shirt",
            "description": "",
            "price": 19.99,
            "sku": "BS-01",
            "tags": ["cotton"]
        }));
        let out = service
            .translate_object(&product, &["name", "description", "price", "missing", "tags"], "fr", None)
            .await;

        assert_eq!(out["name"], json!("[fr] Blue shirt"));
        assert_eq!(out["description"], json!(""));
        assert_eq!(out["price"], json!(19.99));
        assert_eq!(out["sku"], json!("BS-01"));
        assert_eq!(out["tags"], json!(["cotton"]));
        assert!(!out.contains_key("missing"));
        // Input untouched.
        assert_eq!(product["name"], json!("Blue shirt"));
    }

    #[tokio::test]
    async fn object_array_is_translated_element_wise() {
        let provider = Arc::new(MockTranslator::new(Behaviour::Tag));
        let (service, _) = service(Arc::clone(&provider));

        let items = vec![
            object(json!({"title": "Cart", "qty": 1})),
            object(json!({"title": "Wishlist", "qty": 2})),
        ];
        let out = service.translate_object_array(&items, &["title"], "es", None).await;
        assert_eq!(out[0]["title"], json!("[es] Cart"));
        assert_eq!(out[1]["title"], json!("[es] Wishlist"));
        assert_eq!(out[1]["qty"], json!(2));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn provider_failure_shows_original() {
        let provider = Arc::new(MockTranslator::new(Behaviour::Tag).failing_for("ja"));
        let (service, _) = service(Arc::clone(&provider));
        assert_eq!(service.translate_text("Order placed", "ja", None).await, "Order placed");
    }

    #[tokio::test]
    async fn invalidate_language_normalizes_code() {
        let provider = Arc::new(MockTranslator::new(Behaviour::Tag));
        let (service, _) = service(Arc::clone(&provider));

        service.translate_text("Hello", "fr", None).await;
        assert_eq!(service.invalidate_language("fr-FR").await, 1);
        service.translate_text("Hello", "fr", None).await;
        assert_eq!(provider.call_count(), 2);
    }
}
