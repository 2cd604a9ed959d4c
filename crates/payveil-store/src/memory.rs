//! In-memory implementation of the GrantStore trait.
//!
//! This is primarily for tests and short-lived sessions. It has the same
//! semantics as SQLite but nothing survives the process.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use payveil_core::{Address, ChainId};

use crate::error::{Result, StoreError};
use crate::record::{GrantKey, StoredGrant};
use crate::traits::GrantStore;

/// In-memory grant store. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryGrantStore {
    grants: RwLock<HashMap<String, StoredGrant>>,
}

impl MemoryGrantStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored grants.
    pub fn len(&self) -> usize {
        self.grants.read().map(|g| g.len()).unwrap_or(0)
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl GrantStore for MemoryGrantStore {
    async fn get(&self, key: &GrantKey) -> Result<Option<StoredGrant>> {
        let grants = self.grants.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(grants.get(&key.storage_key()).cloned())
    }

    async fn put(&self, grant: &StoredGrant) -> Result<()> {
        let mut grants = self.grants.write().map_err(|_| StoreError::LockPoisoned)?;
        grants.insert(grant.key.storage_key(), grant.clone());
        Ok(())
    }

    async fn remove(&self, key: &GrantKey) -> Result<bool> {
        let mut grants = self.grants.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(grants.remove(&key.storage_key()).is_some())
    }

    async fn list_for_holder(&self, chain_id: ChainId, holder: &Address) -> Result<Vec<StoredGrant>> {
        let grants = self.grants.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut found: Vec<StoredGrant> = grants
            .values()
            .filter(|g| g.key.chain_id == chain_id && &g.key.holder == holder)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(found)
    }

    async fn purge_expired(&self, now: i64) -> Result<usize> {
        let mut grants = self.grants.write().map_err(|_| StoreError::LockPoisoned)?;
        let before = grants.len();
        grants.retain(|_, g| g.expires_at() > now);
        Ok(before - grants.len())
    }
}
