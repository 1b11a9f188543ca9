//! Code-generation model access.
//!
//! [`CompletionModel`] is the seam to the provider: given a system
//! instruction, prior turns and a new prompt it returns a normalized
//! [`Reply`]. [`ChatSession`] carries turns across calls so each prompt sees
//! the exchange before it.

pub mod error;
pub mod gemini;

pub use error::ModelError;
pub use gemini::{GeminiClient, GeminiConfig};

use std::sync::Arc;

use scrapewright_core::Turn;

/// System role given to the model at session start.
pub const SYSTEM_INSTRUCTION: &str = "\
You're an expert in writing Python scraping scripts using BeautifulSoup.
Given a webpage's HTML, generate Python code to extract the specified data from it.
Stick to the HTML you are given. Do not invent examples or elements that are not in it.
Only return Python code. The people asking know nothing about Python, so the code must:
1. Run as is and print or save the data the way the user asks.
2. Have no errors, since they cannot debug it.
3. Contain comments that help a junior developer follow it.";

/// A model reply reduced to trimmed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
}

impl Reply {
    pub fn new(text: impl AsRef<str>) -> Self {
        Self { text: text.as_ref().trim().to_string() }
    }
}

/// A text completion capability with conversational history.
#[async_trait::async_trait]
pub trait CompletionModel: Send + Sync {
    /// Complete `prompt` given the `system` instruction and prior `history`.
    async fn complete(&self, system: &str, history: &[Turn], prompt: &str) -> Result<Reply, ModelError>;
}

/// A conversation that accumulates turns as prompts are answered.
///
/// Failed sends leave the history untouched.
pub struct ChatSession {
    model: Arc<dyn CompletionModel>,
    system: String,
    history: Vec<Turn>,
}

impl ChatSession {
    pub fn start(model: Arc<dyn CompletionModel>, system: impl Into<String>, history: Vec<Turn>) -> Self {
        Self { model, system: system.into(), history }
    }

    pub async fn send(&mut self, prompt: &str) -> Result<Reply, ModelError> {
        let reply = self.model.complete(&self.system, &self.history, prompt).await?;
        let reply = Reply::new(&reply.text);
        self.history.push(Turn::user(prompt));
        self.history.push(Turn::model(reply.text.clone()));
        Ok(reply)
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Echoes the prompt and records how much history each call saw.
    struct EchoModel {
        seen: Mutex<Vec<usize>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait::async_trait]
    impl CompletionModel for EchoModel {
        async fn complete(&self, _system: &str, history: &[Turn], prompt: &str) -> Result<Reply, ModelError> {
            self.seen.lock().unwrap().push(history.len());
            if self.fail_on == Some(prompt) {
                return Err(ModelError::EmptyReply);
            }
            Ok(Reply { text: format!("  echo {prompt}\n") })
        }
    }

    #[test]
    fn test_reply_trims() {
        assert_eq!(Reply::new("\n  code  \n").text, "code");
    }

    #[tokio::test]
    async fn test_session_accumulates_history() {
        let model = Arc::new(EchoModel { seen: Mutex::new(Vec::new()), fail_on: None });
        let mut chat = ChatSession::start(model.clone(), SYSTEM_INSTRUCTION, vec![Turn::user("old"), Turn::model("ok")]);

        let first = chat.send("one").await.unwrap();
        chat.send("two").await.unwrap();

        assert_eq!(first.text, "echo one");
        assert_eq!(*model.seen.lock().unwrap(), vec![2, 4]);
        assert_eq!(chat.history().len(), 6);
        assert_eq!(chat.history()[5], Turn::model("echo two"));
    }

    #[tokio::test]
    async fn test_failed_send_leaves_history() {
        let model = Arc::new(EchoModel { seen: Mutex::new(Vec::new()), fail_on: Some("bad") });
        let mut chat = ChatSession::start(model, SYSTEM_INSTRUCTION, Vec::new());

        assert!(chat.send("bad").await.is_err());
        assert!(chat.history().is_empty());
    }
}
