//! Gemini `generateContent` client.
//!
//! ### Specification
//!
//! - **Endpoint**: `{base}/models/{model}:generateContent`
//! - **Authentication**: `x-goog-api-key` header.
//! - **Body**: `systemInstruction` plus the full `contents` list, prior turns
//!   first and the new prompt last. The API is stateless, so history travels
//!   with every call.
//! - **Normalization**: text parts of the first candidate are concatenated
//!   into a [`Reply`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use scrapewright_core::{AppConfig, Role, Turn};

use super::{CompletionModel, ModelError, Reply};

/// Default base URL for the Generative Language API.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default request timeout. Large chunks take a while to answer.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Model name, e.g. `gemini-1.5-flash-002`.
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: scrapewright_core::config::DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl GeminiConfig {
    pub fn from_config(config: &AppConfig) -> Result<Self, ModelError> {
        let api_key = config.require_gemini_api_key().map_err(|_| ModelError::MissingApiKey)?;
        Ok(Self { api_key: api_key.to_string(), model: config.model.clone(), ..Default::default() })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

impl<'a> Content<'a> {
    fn new(role: Option<&'static str>, text: &'a str) -> Self {
        Self { role, parts: [Part { text }] }
    }
}

impl<'a> GenerateRequest<'a> {
    fn new(system: &'a str, history: &'a [Turn], prompt: &'a str) -> Self {
        let mut contents: Vec<Content<'a>> = history
            .iter()
            .map(|turn| Content::new(Some(turn.role.as_str()), &turn.content))
            .collect();
        contents.push(Content::new(Some(Role::User.as_str()), prompt));

        Self { system_instruction: Content::new(None, system), contents }
    }
}

/// Raw response from `generateContent`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
pub struct CandidatePart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

impl TryFrom<GenerateResponse> for Reply {
    type Error = ModelError;

    fn try_from(raw: GenerateResponse) -> Result<Self, Self::Error> {
        if let Some(reason) = raw.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ModelError::Blocked(reason));
        }

        let candidate = raw.candidates.into_iter().next().ok_or(ModelError::EmptyReply)?;
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = candidate.finish_reason.unwrap_or_default();
            return match reason.as_str() {
                "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" => Err(ModelError::Blocked(reason.clone())),
                _ => Err(ModelError::EmptyReply),
            };
        }

        Ok(Reply::new(text))
    }
}

/// Map a non-success status to an error. `None` for 2xx.
fn status_error(status: StatusCode, body: &str) -> Option<ModelError> {
    match status.as_u16() {
        200..=299 => None,
        401 | 403 => Some(ModelError::AuthError),
        429 => Some(ModelError::RateLimited),
        code => {
            let message = serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(str::to_string))
                .unwrap_or_else(|| body.chars().take(200).collect());
            Some(ModelError::HttpError { status: code, message })
        }
    }
}

/// Gemini API client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, ModelError> {
        if config.api_key.is_empty() {
            return Err(ModelError::MissingApiKey);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ModelError::Network(Arc::new(e)))?;

        Ok(Self { http, config })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ModelError> {
        Self::new(GeminiConfig::from_config(config)?)
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.config.base_url.trim_end_matches('/'), self.config.model)
    }
}

#[async_trait::async_trait]
impl CompletionModel for GeminiClient {
    async fn complete(&self, system: &str, history: &[Turn], prompt: &str) -> Result<Reply, ModelError> {
        let start = Instant::now();
        let body = GenerateRequest::new(system, history, prompt);

        tracing::debug!("calling {} with {} prior turns", self.config.model, history.len());

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if let Some(err) = status_error(status, &String::from_utf8_lossy(&bytes)) {
            tracing::debug!("Gemini API error status: {}", status);
            return Err(err);
        }

        let raw: GenerateResponse = serde_json::from_slice(&bytes).map_err(|e| ModelError::Parse(e.to_string()))?;
        let reply = Reply::try_from(raw)?;

        tracing::debug!("completion took {:?}, {} chars", start.elapsed(), reply.text.len());
        Ok(reply)
    }
}
