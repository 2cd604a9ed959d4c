//! GrantStore trait: the abstract interface for grant persistence.
//!
//! This trait keeps the signature manager storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use payveil_core::{Address, ChainId};

use crate::error::Result;
use crate::record::{GrantKey, StoredGrant};

/// Async interface for grant persistence.
///
/// All methods are async to support both blocking (SQLite) and async
/// backends. For SQLite, work runs on `spawn_blocking` so the runtime is
/// never blocked.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Get the grant stored under exactly this key.
    async fn get(&self, key: &GrantKey) -> Result<Option<StoredGrant>>;

    /// Insert or replace a grant under its key.
    async fn put(&self, grant: &StoredGrant) -> Result<()>;

    /// Remove a grant. Returns whether a record existed.
    async fn remove(&self, key: &GrantKey) -> Result<bool>;

    /// List every grant held by `holder` on `chain_id`.
    async fn list_for_holder(&self, chain_id: ChainId, holder: &Address) -> Result<Vec<StoredGrant>>;

    /// Remove every grant whose validity window ended at or before `now`.
    ///
    /// Returns the number of removed records.
    async fn purge_expired(&self, now: i64) -> Result<usize>;
}
