//! Deploy record storage.
//!
//! History is append-only: a channel's records are only ever superseded by
//! the next deploy, and "current" is the most recent record. Two backends
//! implement the same contract, an in-memory map for tests and ephemeral
//! setups and a SQLite database for persistent history.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::deploy::Deploy;

/// Storage backend error.
#[derive(Debug)]
pub enum StoreError {
    Database(sqlx::Error),
    Decode(serde_json::Error),
    Corrupt(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "database error: {}", e),
            StoreError::Decode(e) => write!(f, "stored record is malformed: {}", e),
            StoreError::Corrupt(msg) => write!(f, "stored record is malformed: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Decode(e)
    }
}

/// Per-channel deploy record storage.
///
/// `set` upserts by deploy id: writing a record whose id matches the
/// channel's latest record updates it in place, any other id starts a new
/// history entry. Reads and writes for a single key are serialized by the
/// backend; cross-call check-then-write sequences are the caller's problem
/// (see `ChannelDeploys`).
#[async_trait]
pub trait Store: Send + Sync {
    /// The channel's most recent record, finished or not.
    async fn get(&self, channel: &str) -> Result<Option<Deploy>, StoreError>;

    /// Write `deploy` as the channel's latest record.
    async fn set(&self, channel: &str, deploy: Deploy) -> Result<(), StoreError>;

    /// Remove and return the channel's most recent record.
    async fn delete(&self, channel: &str) -> Result<Option<Deploy>, StoreError>;

    /// Full deploy history for the channel, oldest first.
    async fn all(&self, channel: &str) -> Result<Vec<Deploy>, StoreError>;

    /// Deploy history restricted to records started at or after `start`
    /// (Unix seconds), oldest first.
    async fn since(&self, channel: &str, start: u64) -> Result<Vec<Deploy>, StoreError>;
}
