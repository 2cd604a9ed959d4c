//! Collaborator interfaces.
//!
//! Every async method is a suspension point for the session: whatever the
//! session knew before the call may be out of date when it returns.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::watch;

use payveil_core::{Address, ClearValue, Handle, Identity};
use payveil_grants::{AuthorizationGrant, AuthorizationSigner};

use crate::error::Result;
use crate::types::{DecryptRequest, EncryptedInput, LedgerFields, TxHash, TxStatus, WalletState};

/// The ledger holding encrypted entries and the access-control list.
///
/// All calls are scoped by an [`Identity`]: the account acts on the
/// resource deployed on the identity's chain.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Read the caller's entry handle, the aggregate handle, the entry
    /// count and the authority in one round trip.
    async fn read_fields(&self, identity: &Identity) -> Result<LedgerFields>;

    /// Read the entry handle of `owner`.
    async fn read_value_of(&self, identity: &Identity, owner: &Address) -> Result<Handle>;

    /// Submit an encrypted value for the caller's entry.
    async fn submit_encrypted_value(&self, identity: &Identity, input: EncryptedInput) -> Result<TxHash>;

    /// Allow `grantee` to read the caller's entry.
    async fn grant_access(&self, identity: &Identity, grantee: &Address) -> Result<TxHash>;

    /// Whether `grantee` may read `owner`'s entry.
    async fn check_access(&self, identity: &Identity, owner: &Address, grantee: &Address) -> Result<bool>;

    /// Wait until the transaction is final.
    async fn await_confirmation(&self, tx: &TxHash) -> Result<TxStatus>;
}

/// The confidential-computation backend.
#[async_trait]
pub trait ConfidentialEngine: Send + Sync {
    /// Whether the engine finished initialising.
    fn is_ready(&self) -> bool;

    /// Encrypt `value` for `account` writing to `resource`.
    async fn encrypt(&self, resource: &Address, account: &Address, value: ClearValue) -> Result<EncryptedInput>;

    /// Decrypt the requested handles under `grant`.
    ///
    /// Fails as a whole if any handle may not be revealed to the grant's
    /// holder.
    async fn decrypt(
        &self,
        requests: &[DecryptRequest],
        grant: &AuthorizationGrant,
    ) -> Result<HashMap<Handle, ClearValue>>;
}

/// The user's wallet: signs authorization messages and reports the active
/// connection.
pub trait Wallet: AuthorizationSigner {
    /// The active chain and account, or `None` when disconnected.
    fn current(&self) -> Option<WalletState>;

    /// Follow connection changes.
    fn subscribe(&self) -> watch::Receiver<Option<WalletState>>;
}
