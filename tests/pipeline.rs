use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tempfile::TempDir;

use shopfront_i18n::config::{BackendPreference, PipelineConfig};
use shopfront_i18n::metrics::metric_names;
use shopfront_i18n::translate::{BatchTranslator, TranslateError};
use shopfront_i18n::Pipeline;

/// Uppercases text; fails for any target listed in `failing`.
struct UppercaseTranslator {
    calls: Mutex<Vec<(String, Vec<String>)>>,
    failing: Vec<&'static str>,
    seen: AtomicUsize,
}

impl UppercaseTranslator {
    fn new(failing: Vec<&'static str>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing,
            seen: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BatchTranslator for UppercaseTranslator {
    async fn batch_translate(
        &self,
        texts: &[String],
        _source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<Option<String>>, TranslateError> {
        self.seen.fetch_add(texts.len(), Ordering::SeqCst);
        self.calls
            .lock()
            .push((target_lang.to_string(), texts.to_vec()));
        if self.failing.contains(&target_lang) {
            return Err(TranslateError::Timeout);
        }
        Ok(texts.iter().map(|t| Some(t.to_uppercase())).collect())
    }
}

fn test_config(dir: &TempDir, backend: BackendPreference) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.store.dir = dir.path().to_path_buf();
    config.store.backend = backend;
    config.batch.batch_wait = Duration::from_millis(20);
    config.batch.min_request_interval = Duration::from_millis(5);
    config
}

#[tokio::test]
async fn burst_of_callers_is_coalesced_and_cached() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(UppercaseTranslator::new(vec![]));
    let pipeline = Pipeline::start(&test_config(&dir, BackendPreference::Auto), provider.clone());
    let service = pipeline.service();

    let handles: Vec<_> = ["cart", "checkout", "orders", "account"]
        .into_iter()
        .map(|text| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.translate_text(text, "fr", None).await })
        })
        .collect();
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    assert_eq!(results, vec!["CART", "CHECKOUT", "ORDERS", "ACCOUNT"]);
    assert_eq!(provider.calls.lock().len(), 1);

    // Served from cache the second time.
    assert_eq!(service.translate_text("cart", "fr", None).await, "CART");
    assert_eq!(provider.seen.load(Ordering::SeqCst), 4);
    let stats = service.cache_stats().await;
    assert_eq!(stats.backend, "sqlite");
    assert_eq!(stats.entries, Some(4));

    pipeline.shutdown().await;
}

#[tokio::test]
async fn cache_survives_pipeline_restart_on_flat_backend() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, BackendPreference::Flat);

    let first = Arc::new(UppercaseTranslator::new(vec![]));
    let pipeline = Pipeline::start(&config, first.clone());
    assert_eq!(pipeline.service().translate_text("hello", "de", None).await, "HELLO");
    pipeline.shutdown().await;

    let second = Arc::new(UppercaseTranslator::new(vec![]));
    let pipeline = Pipeline::start(&config, second.clone());
    assert_eq!(pipeline.service().translate_text("hello", "de", None).await, "HELLO");
    assert_eq!(second.seen.load(Ordering::SeqCst), 0);
    assert_eq!(pipeline.service().cache_stats().await.backend, "flat");
    pipeline.shutdown().await;
}

#[tokio::test]
async fn mixed_pairs_fail_independently() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(UppercaseTranslator::new(vec!["fr"]));
    let pipeline = Pipeline::start(&test_config(&dir, BackendPreference::Auto), provider.clone());
    let service = pipeline.service();

    let (fr, de) = tokio::join!(
        service.translate_batch(&["one", "two", "three"], "fr", None),
        service.translate_batch(&["one", "two"], "de", None),
    );
    assert_eq!(fr, vec!["one", "two", "three"]);
    assert_eq!(de, vec!["ONE", "TWO"]);

    // Cache lookups finish in any order, so compare each call's texts as a set.
    let mut calls = provider.calls.lock().clone();
    calls.sort();
    for (_, texts) in calls.iter_mut() {
        texts.sort();
    }
    assert_eq!(
        calls,
        vec![
            ("de".to_string(), vec!["one".to_string(), "two".to_string()]),
            ("fr".to_string(), vec!["one".to_string(), "three".to_string(), "two".to_string()]),
        ]
    );

    pipeline.shutdown().await;
}

#[tokio::test]
async fn object_array_and_clear() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(UppercaseTranslator::new(vec![]));
    let pipeline = Pipeline::start(&test_config(&dir, BackendPreference::Auto), provider.clone());
    let service = pipeline.service();

    let products = vec![
        json!({"name": "mug", "price": 8}).as_object().cloned().unwrap(),
        json!({"name": "", "price": 3}).as_object().cloned().unwrap(),
    ];
    let out = service
        .translate_object_array(&products, &["name", "price"], "it", None)
        .await;
    assert_eq!(out[0]["name"], json!("MUG"));
    assert_eq!(out[0]["price"], json!(8));
    assert_eq!(out[1]["name"], json!(""));

    assert_eq!(service.clear_cache().await, 1);
    service.translate_text("mug", "it", None).await;
    assert_eq!(provider.calls.lock().len(), 2);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn metrics_record_queue_wait_and_provider_calls() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(UppercaseTranslator::new(vec![]));
    let pipeline = Pipeline::start(&test_config(&dir, BackendPreference::Auto), provider.clone());
    let service = pipeline.service();

    service.translate_batch(&["sale", "new"], "es", None).await;
    service.translate_text("sale", "es", None).await;

    let summary = pipeline.metrics().summary();
    assert_eq!(summary[metric_names::PROVIDER_CALL].count, 1);
    assert_eq!(summary[metric_names::QUEUE_WAIT].count, 2);
    assert_eq!(summary[metric_names::CACHE_LOOKUP].count, 3);
    assert!(summary[metric_names::QUEUE_WAIT].p50_us > 0);

    let stats = service.cache_stats().await;
    assert!((stats.hit_rate() - 1.0 / 3.0).abs() < 1e-9);

    pipeline.shutdown().await;
}
