//! Values exchanged with the ledger and the decryption engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use payveil_core::{Address, ChainId, Handle};

/// A transaction hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    /// Convert to a `0x`-prefixed hex string.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", &self.to_hex()[..18])
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Final state of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Confirmed,
    Reverted,
}

impl TxStatus {
    /// Numeric form, as reported by receipts (1 = success).
    pub fn code(&self) -> u8 {
        match self {
            TxStatus::Confirmed => 1,
            TxStatus::Reverted => 0,
        }
    }
}

/// Everything a refresh reads, in one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFields {
    /// Handle of the caller's own entry (zero if never stored).
    pub own: Handle,
    /// Handle of the aggregate over all entries.
    pub aggregate: Handle,
    /// Number of entries stored.
    pub entry_count: u64,
    /// The account that deployed the resource.
    pub authority: Address,
}

/// A value encrypted for one (resource, account) pair, with the proof the
/// ledger checks on submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    pub ciphertext: Vec<u8>,
    pub proof: Vec<u8>,
}

/// One handle to decrypt, with the resource it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecryptRequest {
    pub handle: Handle,
    pub resource: Address,
}

/// The wallet's current connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletState {
    pub chain_id: ChainId,
    pub account: Address,
}
