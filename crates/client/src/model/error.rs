//! Model client error types.

use std::sync::Arc;

/// Errors from a completion model call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    /// Missing API key.
    #[error("missing API key: SCRAPEWRIGHT_GEMINI_API_KEY not set")]
    MissingApiKey,

    /// Authentication failed (invalid API key).
    #[error("authentication failed: invalid API key")]
    AuthError,

    /// Rate limited by the provider.
    #[error("rate limited: too many requests")]
    RateLimited,

    /// HTTP error response.
    #[error("HTTP error {status}: {message}")]
    HttpError { status: u16, message: String },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),

    /// The provider refused to answer the prompt.
    #[error("prompt blocked: {0}")]
    Blocked(String),

    /// The response carried no text.
    #[error("empty reply")]
    EmptyReply,
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { ModelError::Timeout } else { ModelError::Network(Arc::new(err)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelError::MissingApiKey;
        assert!(err.to_string().contains("API key"));

        let err = ModelError::HttpError { status: 400, message: "bad model".into() };
        assert_eq!(err.to_string(), "HTTP error 400: bad model");
    }
}
