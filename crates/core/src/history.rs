//! Per-session conversation history persisted in a [`KvStore`].
//!
//! History is a JSON array of [`Turn`]s under `chat:{session_id}`, capped to
//! the most recent `max_turns` and rewritten with a fresh expiry on every
//! append. Writes go through a [`RetryPolicy`]; a write that still fails is
//! reported as `false` and never turned into an error for the caller. A
//! stored value that no longer decodes is replaced by the next append.

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::retry::RetryPolicy;
use crate::session::{SessionId, Turn};
use crate::store::KvStore;
use crate::Error;

/// Default number of turns kept per session.
pub const DEFAULT_MAX_TURNS: usize = 100;

/// Default history expiry (7 days).
pub const DEFAULT_HISTORY_TTL: Duration = Duration::from_secs(86_400 * 7);

/// Retry-backed conversation history store.
#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn KvStore>,
    max_turns: usize,
    ttl: Duration,
    retry: RetryPolicy,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store, max_turns: DEFAULT_MAX_TURNS, ttl: DEFAULT_HISTORY_TTL, retry: RetryPolicy::default() }
    }

    pub fn from_config(store: Arc<dyn KvStore>, config: &AppConfig) -> Self {
        Self {
            store,
            max_turns: config.history_max_turns,
            ttl: config.history_ttl(),
            retry: RetryPolicy::fixed(config.store_max_retries, config.store_retry_backoff()),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Load the stored turns for `session`, oldest first. Missing history is empty.
    pub async fn load(&self, session: &SessionId) -> Result<Vec<Turn>, Error> {
        match self.store.get(&session.history_key()).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Append one (user, model) pair and persist the capped history.
    ///
    /// Returns whether the write eventually succeeded.
    pub async fn append(&self, session: &SessionId, user_text: &str, model_text: &str) -> bool {
        let this = self;
        let result = self
            .retry
            .run("history append", move |_| this.append_once(session, user_text, model_text))
            .await;

        match result {
            Ok(len) => {
                tracing::debug!(%session, turns = len, "saved chat history");
                true
            }
            Err(e) => {
                tracing::error!(%session, "failed to save chat history: {e}");
                false
            }
        }
    }

    async fn append_once(&self, session: &SessionId, user_text: &str, model_text: &str) -> Result<usize, Error> {
        let mut turns = match self.load(session).await {
            Ok(turns) => turns,
            Err(Error::Serialization(e)) => {
                tracing::warn!(%session, "discarding undecodable chat history: {e}");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        turns.push(Turn::user(user_text));
        turns.push(Turn::model(model_text));

        if turns.len() > self.max_turns {
            let excess = turns.len() - self.max_turns;
            turns.drain(..excess);
        }

        let encoded = serde_json::to_string(&turns)?;
        self.store.set(&session.history_key(), &encoded, Some(self.ttl)).await?;
        Ok(turns.len())
    }
}
