//! Errors raised by grant stores.

use thiserror::Error;

/// Errors from reading or writing the grant cache.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A grant record could not be encoded or decoded as CBOR.
    #[error("grant record encoding: {0}")]
    Serialization(String),

    /// A row holds something that is not a grant record.
    #[error("corrupt grant row: {0}")]
    InvalidData(String),

    #[error("schema migration failed: {0}")]
    Migration(String),

    /// A panicking writer poisoned the connection mutex.
    #[error("store lock poisoned")]
    LockPoisoned,

    /// A `spawn_blocking` task could not be joined.
    #[error("background task failed: {0}")]
    Task(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
