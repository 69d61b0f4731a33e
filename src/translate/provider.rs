//! HTTP JSON batch translation client.
//! `POST {endpoint}` with `{"texts": [...], "source": "en", "target": "fr"}`,
//! expecting `{"translations": [string | null, ...]}` in the same order.
//! Connection pooling via reqwest; retries on 429, 5xx, and one timeout.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{BatchTranslator, TranslateError};
use crate::config::ProviderConfig;

pub struct HttpBatchTranslator {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    texts: &'a [String],
    source: &'a str,
    target: &'a str,
}

#[derive(Deserialize)]
struct BatchResponse {
    translations: Vec<Option<String>>,
}

impl HttpBatchTranslator {
    pub fn new(config: &ProviderConfig) -> Result<Self, TranslateError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Send request with retry logic.
    /// 429: Retry-After or 1s/2s/4s (max 3).
    /// 5xx: exponential backoff (max 2).
    /// Timeout: immediate retry once.
    async fn send_with_retry(&self, body: &BatchRequest<'_>) -> Result<reqwest::Response, TranslateError> {
        let mut attempt: u32 = 0;
        let max_429_retries: u32 = 3;
        let max_5xx_retries: u32 = 2;
        let mut timeout_retried = false;

        loop {
            let mut request = self.http.post(&self.endpoint).json(body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            match request.send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if resp.status().as_u16() == 429 => {
                    let retry_after = resp
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .map(Duration::from_secs);
                    if attempt >= max_429_retries {
                        return Err(TranslateError::RateLimited {
                            retry_after_ms: retry_after.map_or(0, |d| d.as_millis() as u64),
                        });
                    }
                    let wait = retry_after.unwrap_or_else(|| Duration::from_secs(1 << attempt));
                    warn!(attempt, wait_ms = wait.as_millis() as u64, "429 rate limited, retrying");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Ok(resp) if resp.status().is_server_error() => {
                    if attempt >= max_5xx_retries {
                        return Err(TranslateError::Api(format!("server error: {}", resp.status())));
                    }
                    let wait = Duration::from_millis(500 * (1 << attempt));
                    warn!(
                        attempt,
                        status = resp.status().as_u16(),
                        wait_ms = wait.as_millis() as u64,
                        "5xx error, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body_text = resp.text().await.unwrap_or_default();
                    return Err(TranslateError::Api(format!(
                        "unexpected status {}: {}",
                        status,
                        body_text.chars().take(200).collect::<String>()
                    )));
                }
                Err(e) if e.is_timeout() => {
                    if timeout_retried {
                        return Err(TranslateError::Timeout);
                    }
                    warn!("request timeout, retrying once");
                    timeout_retried = true;
                }
                Err(e) => return Err(TranslateError::Http(e)),
            }
        }
    }
}

#[async_trait]
impl BatchTranslator for HttpBatchTranslator {
    async fn batch_translate(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<Option<String>>, TranslateError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = BatchRequest {
            texts,
            source: source_lang,
            target: target_lang,
        };
        let response = self.send_with_retry(&body).await?;
        let bytes = response.bytes().await?;
        parse_response(&bytes)
    }
}

fn parse_response(bytes: &[u8]) -> Result<Vec<Option<String>>, TranslateError> {
    serde_json::from_slice::<BatchResponse>(bytes)
        .map(|parsed| parsed.translations)
        .map_err(|e| TranslateError::InvalidResponse(e.to_string()))
}
