//! Configuration validation rules.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_concurrent_requests`, `max_body_bytes`, `chunk_size` or
    ///   `store_max_retries` is 0
    /// - `history_max_turns` is 0 or odd (turns are stored in pairs)
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::Invalid {
                field: "max_concurrent_requests".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_body_bytes".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid { field: "chunk_size".into(), reason: "must be greater than 0".into() });
        }

        if self.history_max_turns == 0 || self.history_max_turns % 2 != 0 {
            return Err(ConfigError::Invalid {
                field: "history_max_turns".into(),
                reason: "must be a positive even number".into(),
            });
        }

        if self.store_max_retries == 0 {
            return Err(ConfigError::Invalid {
                field: "store_max_retries".into(),
                reason: "must allow at least one attempt".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if !self.render_enabled {
            tracing::warn!("render_enabled is false; pages that need JavaScript will come back empty");
        }

        Ok(())
    }
}
