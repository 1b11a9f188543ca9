//! Core types and shared functionality for scrapewright.
//!
//! This crate provides:
//! - SQLite-backed expiring key-value store
//! - Per-session conversation history with capped length and retried writes
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod history;
pub mod retry;
pub mod session;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use history::HistoryStore;
pub use retry::RetryPolicy;
pub use session::{Role, SessionId, Turn};
pub use store::{KvDb, KvStore};
