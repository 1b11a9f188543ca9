//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SCRAPEWRIGHT_*)
//! 2. TOML config file (if SCRAPEWRIGHT_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-002";

/// Desktop Chrome on Windows; matches what the headless renderer announces.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SCRAPEWRIGHT_*)
/// 2. TOML config file (if SCRAPEWRIGHT_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Gemini API key for the code-generation model.
    ///
    /// Set via SCRAPEWRIGHT_GEMINI_API_KEY environment variable.
    #[serde(default)]
    pub gemini_api_key: Option<String>,

    /// Gemini model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// Path to the SQLite key-value store holding chat history.
    ///
    /// Set via SCRAPEWRIGHT_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests and the headless browser.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-fetch timeout in milliseconds, also used for browser navigation.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Largest response body the primary fetch will read, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Maximum concurrently in-flight fetches.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Delay applied after acquiring a fetch slot, in milliseconds.
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,

    /// Maximum number of URLs kept in the content cache.
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: u64,

    /// Content cache time-to-live in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Maximum characters per chunk sent to the model.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum turns kept per session history.
    #[serde(default = "default_history_max_turns")]
    pub history_max_turns: usize,

    /// History expiry in seconds, refreshed on every write.
    #[serde(default = "default_history_ttl_secs")]
    pub history_ttl_secs: u64,

    /// Attempts made for each history write.
    #[serde(default = "default_store_max_retries")]
    pub store_max_retries: u32,

    /// Fixed delay between history write attempts, in milliseconds.
    #[serde(default = "default_store_retry_backoff_ms")]
    pub store_retry_backoff_ms: u64,

    /// Whether the headless browser fallback is available.
    ///
    /// Set via SCRAPEWRIGHT_RENDER_ENABLED environment variable.
    #[serde(default = "default_true")]
    pub render_enabled: bool,

    /// Selector awaited (best effort) after rendering settles.
    #[serde(default = "default_render_ready_selector")]
    pub render_ready_selector: String,

    /// End-to-end bound for one orchestrated request, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./scrapewright.sqlite")
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_max_concurrent_requests() -> usize {
    10
}

fn default_rate_limit_delay_ms() -> u64 {
    1_000
}

fn default_cache_max_entries() -> u64 {
    100
}

fn default_cache_ttl_secs() -> u64 {
    3_600
}

fn default_chunk_size() -> usize {
    30_000
}

fn default_history_max_turns() -> usize {
    100
}

fn default_history_ttl_secs() -> u64 {
    86_400 * 7
}

fn default_store_max_retries() -> u32 {
    3
}

fn default_store_retry_backoff_ms() -> u64 {
    1_000
}

fn default_true() -> bool {
    true
}

fn default_render_ready_selector() -> String {
    "body".into()
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            model: default_model(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_body_bytes: default_max_body_bytes(),
            max_concurrent_requests: default_max_concurrent_requests(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
            cache_max_entries: default_cache_max_entries(),
            cache_ttl_secs: default_cache_ttl_secs(),
            chunk_size: default_chunk_size(),
            history_max_turns: default_history_max_turns(),
            history_ttl_secs: default_history_ttl_secs(),
            store_max_retries: default_store_max_retries(),
            store_retry_backoff_ms: default_store_retry_backoff_ms(),
            render_enabled: true,
            render_ready_selector: default_render_ready_selector(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Fetch timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn history_ttl(&self) -> Duration {
        Duration::from_secs(self.history_ttl_secs)
    }

    pub fn store_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.store_retry_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SCRAPEWRIGHT_`
    /// 2. TOML file from `SCRAPEWRIGHT_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SCRAPEWRIGHT_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SCRAPEWRIGHT_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Check if the Gemini API key is available (for deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the key is not set.
    pub fn require_gemini_api_key(&self) -> Result<&str, ConfigError> {
        self.gemini_api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "gemini_api_key".into(),
                hint: "Set SCRAPEWRIGHT_GEMINI_API_KEY in the environment or .env".into(),
            })
    }
}
