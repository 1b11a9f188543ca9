//! SQLite-backed key-value store for durable session state.
//!
//! This module provides a small expiring key-value store using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - String keys and values with an optional expiry
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Purging of expired rows

pub mod connection;
pub mod kv;
pub mod migrations;

pub use connection::KvDb;
pub use kv::KvStore;
