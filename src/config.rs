//! Pipeline configuration.
//! Defaults carry the production constants; `from_env` applies startup overrides.
//! Nothing here is re-read after the pipeline starts.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Entries older than this are never served.
pub const CACHE_TTL: Duration = Duration::from_secs(24 * 3600);
/// Period of the background expiry sweep.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);
/// Collection window opened by the first request into an idle queue.
pub const BATCH_WAIT: Duration = Duration::from_millis(100);
/// Max requests taken per dispatch cycle.
pub const BATCH_SIZE: usize = 10;
/// Minimum spacing between outbound provider calls.
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(200);
/// Soft cap for the flat backend document.
pub const FLAT_STORE_MAX_BYTES: u64 = 50 * 1024 * 1024;

const ENV_PREFIX: &str = "SHOPFRONT_I18N_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: String, value: String },
}

/// Which physical backend the store factory should try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendPreference {
    /// SQLite, falling back to the flat file if it cannot be opened.
    Auto,
    /// Same as `Auto`; kept distinct so logs show it was requested explicitly.
    Sqlite,
    /// Skip SQLite entirely.
    Flat,
}

impl FromStr for BackendPreference {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "sqlite" => Ok(Self::Sqlite),
            "flat" | "json" => Ok(Self::Flat),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: CACHE_TTL,
            cleanup_interval: CLEANUP_INTERVAL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub batch_wait: Duration,
    pub batch_size: usize,
    pub min_request_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_wait: BATCH_WAIT,
            batch_size: BATCH_SIZE,
            min_request_interval: MIN_REQUEST_INTERVAL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: BackendPreference,
    /// Directory holding `translations.db` or `translations.json`.
    pub dir: PathBuf,
    pub flat_max_bytes: u64,
}

impl StoreConfig {
    pub fn sqlite_path(&self) -> PathBuf {
        self.dir.join("translations.db")
    }

    pub fn flat_path(&self) -> PathBuf {
        self.dir.join("translations.json")
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Auto,
            dir: PathBuf::from(".shopfront-i18n"),
            flat_max_bytes: FLAT_STORE_MAX_BYTES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000/translate/batch".into(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub cache: CacheConfig,
    pub batch: BatchConfig,
    pub store: StoreConfig,
    pub provider: ProviderConfig,
    /// Source language used when callers do not pass one.
    pub default_source_lang: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            batch: BatchConfig::default(),
            store: StoreConfig::default(),
            provider: ProviderConfig::default(),
            default_source_lang: "en".into(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by `SHOPFRONT_I18N_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env` but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |suffix: &str| {
            let var = format!("{ENV_PREFIX}{suffix}");
            lookup(&var).map(|value| (var, value))
        };

        if let Some((var, value)) = get("CACHE_TTL_SECS") {
            config.cache.ttl = Duration::from_secs(parse(&var, &value)?);
        }
        if let Some((var, value)) = get("CLEANUP_INTERVAL_SECS") {
            let secs: u64 = parse(&var, &value)?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue { var, value });
            }
            config.cache.cleanup_interval = Duration::from_secs(secs);
        }
        if let Some((var, value)) = get("BATCH_WAIT_MS") {
            config.batch.batch_wait = Duration::from_millis(parse(&var, &value)?);
        }
        if let Some((var, value)) = get("BATCH_SIZE") {
            let size: usize = parse(&var, &value)?;
            if size == 0 {
                return Err(ConfigError::InvalidValue { var, value });
            }
            config.batch.batch_size = size;
        }
        if let Some((var, value)) = get("MIN_REQUEST_INTERVAL_MS") {
            config.batch.min_request_interval = Duration::from_millis(parse(&var, &value)?);
        }
        if let Some((var, value)) = get("STORE_BACKEND") {
            config.store.backend = value
                .parse()
                .map_err(|_| ConfigError::InvalidValue { var, value })?;
        }
        if let Some((_, value)) = get("STORE_DIR") {
            config.store.dir = PathBuf::from(value);
        }
        if let Some((var, value)) = get("FLAT_MAX_BYTES") {
            config.store.flat_max_bytes = parse(&var, &value)?;
        }
        if let Some((_, value)) = get("PROVIDER_URL") {
            config.provider.endpoint = value;
        }
        if let Some((_, value)) = get("PROVIDER_API_KEY") {
            if !value.is_empty() {
                config.provider.api_key = Some(value);
            }
        }
        if let Some((var, value)) = get("PROVIDER_TIMEOUT_SECS") {
            config.provider.timeout = Duration::from_secs(parse(&var, &value)?);
        }
        if let Some((_, value)) = get("DEFAULT_SOURCE_LANG") {
            config.default_source_lang = value;
        }

        Ok(config)
    }
}

fn parse<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var: var.to_string(),
        value: value.to_string(),
    })
}
