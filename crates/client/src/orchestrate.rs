//! Chunked conversation orchestration.
//!
//! One [`ConversationOrchestrator::process`] call simplifies the page, splits
//! it into chunks and sends them one at a time through a single
//! [`ChatSession`], so later chunks see the earlier exchange. Replies are
//! joined in chunk order and persisted as one (request, result) pair.
//!
//! Failures never reach the caller: a failed chunk is skipped, and a failed
//! or timed-out request becomes [`FAILURE_MESSAGE`] or [`TIMEOUT_MESSAGE`].

use std::sync::Arc;
use std::time::Duration;

use scrapewright_core::{AppConfig, HistoryStore, SessionId};

use crate::model::{ChatSession, CompletionModel, SYSTEM_INSTRUCTION};
use crate::simplify::{self, Chunk, chunk::DEFAULT_CHUNK_SIZE};

/// Returned when the whole request exceeds its time bound.
pub const TIMEOUT_MESSAGE: &str = "⚠️ Request timed out. Please try with a smaller HTML section.";

/// Returned when no usable reply could be produced.
pub const FAILURE_MESSAGE: &str = "⚠️ I ran into an error. Try rephrasing your question.";

/// Default end-to-end bound for one request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Whole-request failures, reported to the user as [`FAILURE_MESSAGE`].
#[derive(Debug, thiserror::Error)]
pub enum OrchestrateError {
    #[error("document is empty after simplification")]
    EmptyDocument,

    #[error("all {0} chunks failed")]
    AllChunksFailed(usize),
}

/// Drives the model over a page's chunks and records the exchange.
pub struct ConversationOrchestrator {
    model: Arc<dyn CompletionModel>,
    history: HistoryStore,
    system: String,
    chunk_size: usize,
    request_timeout: Duration,
}

impl ConversationOrchestrator {
    pub fn new(model: Arc<dyn CompletionModel>, history: HistoryStore) -> Self {
        Self {
            model,
            history,
            system: SYSTEM_INSTRUCTION.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn from_config(model: Arc<dyn CompletionModel>, history: HistoryStore, config: &AppConfig) -> Self {
        Self::new(model, history)
            .with_chunk_size(config.chunk_size)
            .with_request_timeout(config.request_timeout())
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_system_instruction(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    /// Turn `content` from `url` into the model's answer to `user_prompt`.
    ///
    /// Always returns user-facing text; see the module docs for failures.
    pub async fn process(
        &self, session: &SessionId, url: &str, content: &[u8], is_rendered: bool, user_prompt: &str,
    ) -> String {
        let run = self.run(session, url, content, is_rendered, user_prompt);

        match tokio::time::timeout(self.request_timeout, run).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::error!(%session, "request for {} failed: {e}", url);
                FAILURE_MESSAGE.to_string()
            }
            Err(_) => {
                tracing::error!(%session, "timed out after {:?} while processing {}", self.request_timeout, url);
                TIMEOUT_MESSAGE.to_string()
            }
        }
    }

    async fn run(
        &self, session: &SessionId, url: &str, content: &[u8], is_rendered: bool, user_prompt: &str,
    ) -> Result<String, OrchestrateError> {
        let document = simplify::simplify(content);
        let chunks = simplify::chunk(&document, self.chunk_size);
        if chunks.is_empty() {
            return Err(OrchestrateError::EmptyDocument);
        }

        let prior = match self.history.load(session).await {
            Ok(turns) => turns,
            Err(e) => {
                tracing::warn!(%session, "could not load chat history, starting fresh: {e}");
                Vec::new()
            }
        };

        tracing::debug!(%session, chunks = chunks.len(), prior_turns = prior.len(), "processing {}", url);

        let mut chat = ChatSession::start(self.model.clone(), self.system.clone(), prior);
        let mut replies = Vec::with_capacity(chunks.len());

        for part in &chunks {
            let prompt = build_prompt(url, user_prompt, part, is_rendered);
            match chat.send(&prompt).await {
                Ok(reply) => replies.push(reply.text),
                Err(e) => tracing::error!(%session, "error processing chunk {}: {e}", part.label()),
            }
        }

        if replies.is_empty() {
            return Err(OrchestrateError::AllChunksFailed(chunks.len()));
        }

        let result = replies.join("\n");
        if !self.history.append(session, user_prompt, &result).await {
            tracing::warn!(%session, "returning result without saved history");
        }
        Ok(result)
    }
}

/// Prompt for one chunk.
pub fn build_prompt(url: &str, user_prompt: &str, part: &Chunk<'_>, is_rendered: bool) -> String {
    let mut prompt = format!("Source URL: {url}\n\nUser request:\n{user_prompt}\n\n");

    if is_rendered {
        prompt.push_str(
            "Note: this HTML was captured from a headless browser after JavaScript ran. \
             A plain HTTP request to the same URL may not return this markup.\n\n",
        );
    }

    prompt.push_str(&format!("HTML part {}:\n{}", part.label(), part.text));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelError, Reply};
    use scrapewright_core::{Error, KvStore, RetryPolicy, Turn};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PAGE: &[u8] = b"<html><head><script>track()</script></head><body><p>hello</p><p>world</p></body></html>";

    #[derive(Default)]
    struct MemoryStore {
        values: Mutex<HashMap<String, String>>,
        set_calls: AtomicUsize,
        fail_writes: bool,
    }

    #[async_trait::async_trait]
    impl KvStore for MemoryStore {
        async fn get(&self, key: &str) -> Result<Option<String>, Error> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str, _ex: Option<Duration>) -> Result<(), Error> {
            self.set_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes {
                return Err(Error::Store("write refused".into()));
            }
            self.values.lock().unwrap().insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    /// Model that fails on the listed (1-based) calls and records what it saw.
    #[derive(Default)]
    struct ScriptedModel {
        fail_calls: Vec<usize>,
        hang: bool,
        calls: AtomicUsize,
        history_lens: Mutex<Vec<usize>>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl CompletionModel for ScriptedModel {
        async fn complete(&self, _system: &str, history: &[Turn], prompt: &str) -> Result<Reply, ModelError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.history_lens.lock().unwrap().push(history.len());
            self.prompts.lock().unwrap().push(prompt.to_string());

            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail_calls.contains(&call) {
                return Err(ModelError::HttpError { status: 500, message: "internal".into() });
            }
            Ok(Reply { text: format!("  reply {call}\n") })
        }
    }

    fn three_chunk_size() -> usize {
        let doc = simplify::simplify(PAGE);
        let size = doc.chars().count().div_ceil(3);
        assert_eq!(simplify::chunk(&doc, size).len(), 3);
        size
    }

    fn orchestrator(model: Arc<ScriptedModel>, store: Arc<MemoryStore>) -> ConversationOrchestrator {
        let history = HistoryStore::new(store).with_retry(RetryPolicy::fixed(3, Duration::from_millis(10)));
        ConversationOrchestrator::new(model, history)
    }

    #[tokio::test]
    async fn test_single_chunk() {
        let model = Arc::new(ScriptedModel::default());
        let store = Arc::new(MemoryStore::default());
        let orch = orchestrator(model.clone(), store.clone());
        let session = SessionId::new();

        let result = orch.process(&session, "https://example.com", PAGE, false, "get paragraphs").await;

        assert_eq!(result, "reply 1");
        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("HTML part 1/1:"));
        assert!(prompts[0].contains("Source URL: https://example.com"));
        assert!(prompts[0].contains("get paragraphs"));
        assert!(!prompts[0].contains("track()"));
    }

    #[tokio::test]
    async fn test_one_failed_chunk_is_skipped() {
        let model = Arc::new(ScriptedModel { fail_calls: vec![2], ..Default::default() });
        let store = Arc::new(MemoryStore::default());
        let orch = orchestrator(model.clone(), store.clone()).with_chunk_size(three_chunk_size());
        let session = SessionId::new();

        let result = orch.process(&session, "https://example.com", PAGE, false, "get paragraphs").await;

        assert_eq!(result, "reply 1\nreply 3");
        assert_eq!(*model.history_lens.lock().unwrap(), vec![0, 2, 2]);

        let labels: Vec<bool> = model
            .prompts
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .map(|(i, p)| p.contains(&format!("HTML part {}/3:", i + 1)))
            .collect();
        assert_eq!(labels, vec![true, true, true]);

        assert_eq!(store.set_calls.load(Ordering::SeqCst), 1);
        let turns = orch.history.load(&session).await.unwrap();
        assert_eq!(turns, vec![Turn::user("get paragraphs"), Turn::model("reply 1\nreply 3")]);
    }

    #[tokio::test]
    async fn test_prior_history_is_carried() {
        let model = Arc::new(ScriptedModel::default());
        let store = Arc::new(MemoryStore::default());
        let orch = orchestrator(model.clone(), store);
        let session = SessionId::new();

        orch.process(&session, "https://example.com", PAGE, false, "first").await;
        orch.process(&session, "https://example.com", PAGE, false, "second").await;

        assert_eq!(*model.history_lens.lock().unwrap(), vec![0, 2]);
        assert_eq!(orch.history.load(&session).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_rendered_note_in_prompt() {
        let model = Arc::new(ScriptedModel::default());
        let orch = orchestrator(model.clone(), Arc::new(MemoryStore::default()));

        orch.process(&SessionId::new(), "https://example.com", PAGE, true, "x").await;
        orch.process(&SessionId::new(), "https://example.com", PAGE, false, "x").await;

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("JavaScript"));
        assert!(!prompts[1].contains("JavaScript"));
    }

    #[tokio::test]
    async fn test_all_chunks_failed() {
        let model = Arc::new(ScriptedModel { fail_calls: vec![1, 2, 3], ..Default::default() });
        let store = Arc::new(MemoryStore::default());
        let orch = orchestrator(model, store.clone()).with_chunk_size(three_chunk_size());

        let result = orch.process(&SessionId::new(), "https://example.com", PAGE, false, "x").await;

        assert_eq!(result, FAILURE_MESSAGE);
        assert_eq!(store.set_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_message() {
        let model = Arc::new(ScriptedModel { hang: true, ..Default::default() });
        let store = Arc::new(MemoryStore::default());
        let orch = orchestrator(model, store.clone()).with_request_timeout(Duration::from_secs(300));

        let result = orch.process(&SessionId::new(), "https://example.com", PAGE, false, "x").await;

        assert_eq!(result, TIMEOUT_MESSAGE);
        assert_eq!(store.set_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_failure_still_returns_result() {
        let model = Arc::new(ScriptedModel::default());
        let store = Arc::new(MemoryStore { fail_writes: true, ..Default::default() });
        let orch = orchestrator(model, store.clone());

        let result = orch.process(&SessionId::new(), "https://example.com", PAGE, false, "x").await;

        assert_eq!(result, "reply 1");
        assert_eq!(store.set_calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_build_prompt_layout() {
        let part = Chunk { index: 1, total: 4, text: "<div>" };
        let prompt = build_prompt("https://example.com/a", "titles", &part, false);
        assert_eq!(prompt, "Source URL: https://example.com/a\n\nUser request:\ntitles\n\nHTML part 2/4:\n<div>");
    }
}
