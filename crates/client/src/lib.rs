//! Client code for scrapewright.
//!
//! This crate provides the content pipeline shared by the CLI: two-tier
//! page acquisition (HTTP, then headless browser), HTML simplification and
//! chunking, the Gemini model client, and the chunked conversation
//! orchestrator.

pub mod acquire;
pub mod fetch;
pub mod model;
pub mod orchestrate;
pub mod render;
pub mod simplify;

pub use acquire::{ContentAcquirer, FetchResult};
pub use fetch::{ContentCache, FetchClient, FetchConfig, FetchResponse, PageFetcher, RequestLimiter};
pub use model::{ChatSession, CompletionModel, GeminiClient, ModelError, Reply};
pub use orchestrate::{ConversationOrchestrator, FAILURE_MESSAGE, TIMEOUT_MESSAGE};
pub use render::{RenderOptions, Renderer};
pub use simplify::{Chunk, chunk, simplify};
