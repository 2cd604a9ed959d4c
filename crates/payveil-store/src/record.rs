//! Persisted grant records.

use serde::{Deserialize, Serialize};

use payveil_core::{Address, ChainId, Ed25519PublicKey, Ed25519Signature};

use crate::error::{Result, StoreError};

/// Lookup key for a cached grant: (chain, holder, covered resources).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantKey {
    /// Network the grant was issued on.
    pub chain_id: ChainId,
    /// The account the grant belongs to.
    pub holder: Address,
    /// Covered resources (sorted, unique).
    pub resources: Vec<Address>,
}

impl GrantKey {
    /// Create a key, normalising the resource list.
    pub fn new(chain_id: ChainId, holder: Address, resources: impl IntoIterator<Item = Address>) -> Self {
        let mut resources: Vec<Address> = resources.into_iter().collect();
        resources.sort();
        resources.dedup();
        Self {
            chain_id,
            holder,
            resources,
        }
    }

    /// Stable string form used as the storage primary key.
    ///
    /// Format: `{chain}:{holder}:{blake3(resources)}`.
    pub fn storage_key(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for resource in &self.resources {
            hasher.update(resource.as_bytes());
        }
        format!(
            "{}:{}:{}",
            self.chain_id,
            self.holder,
            hasher.finalize().to_hex()
        )
    }
}

/// A grant as persisted by a [`GrantStore`](crate::GrantStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredGrant {
    /// The lookup key.
    pub key: GrantKey,
    /// Session public key (X25519).
    pub session_public_key: [u8; 32],
    /// Session private key (X25519).
    pub session_secret_key: [u8; 32],
    /// The wallet key that signed the authorization message.
    pub signer: Ed25519PublicKey,
    /// The wallet's signature over the authorization message.
    pub signature: Ed25519Signature,
    /// Issuance time (Unix seconds).
    pub issued_at: i64,
    /// Validity window in seconds.
    pub duration_secs: u64,
}

impl StoredGrant {
    /// Unix second at which the grant stops being valid.
    pub fn expires_at(&self) -> i64 {
        self.issued_at
            .saturating_add(i64::try_from(self.duration_secs).unwrap_or(i64::MAX))
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}
