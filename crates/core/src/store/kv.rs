//! Expiring string key-value operations.
//!
//! `KvStore` is the seam the history layer talks to; `KvDb` is the SQLite
//! implementation. Expired rows read as missing and are removed lazily by
//! [`KvDb::purge_expired`].

use std::time::Duration;

use super::connection::KvDb;
use crate::Error;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Durable string key-value store with optional per-key expiry.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    /// Get the live value for `key`, or `None` if missing or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Set `key` to `value`, expiring `ex` from now when given.
    async fn set(&self, key: &str, value: &str, ex: Option<Duration>) -> Result<(), Error>;
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn expiry_after(ex: Option<Duration>) -> Result<Option<String>, Error> {
    ex.map(|ex| {
        let delta = TimeDelta::from_std(ex).map_err(|e| Error::InvalidInput(format!("expiry out of range: {e}")))?;
        Ok(timestamp(Utc::now() + delta))
    })
    .transpose()
}

#[async_trait::async_trait]
impl KvStore for KvDb {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let key = key.to_string();
        let now = timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result = conn.query_row(
                    "SELECT value FROM kv
                     WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                    params![key, now],
                    |row| row.get::<_, String>(0),
                );

                match result {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn set(&self, key: &str, value: &str, ex: Option<Duration>) -> Result<(), Error> {
        let key = key.to_string();
        let value = value.to_string();
        let expires_at = expiry_after(ex)?;
        let updated_at = timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO kv (key, value, updated_at, expires_at) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = excluded.updated_at,
                        expires_at = excluded.expires_at",
                    params![key, value, updated_at, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

impl KvDb {
    /// Delete expired rows.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired(&self) -> Result<u64, Error> {
        let now = timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM kv WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                    params![now],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
