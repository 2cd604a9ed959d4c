//! The signing seam between the grant manager and a wallet.

use async_trait::async_trait;
use payveil_core::Ed25519PublicKey;
use serde::{Deserialize, Serialize};

/// What a wallet hands back for a signing request.
///
/// The manager checks length, key ownership and the signature itself
/// before using it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSignature {
    /// The Ed25519 public key the wallet claims to have signed with.
    pub public_key: Ed25519PublicKey,
    /// Raw signature bytes.
    pub signature: Vec<u8>,
}

/// Why a wallet did not produce a signature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningFailure {
    /// The user declined the prompt.
    #[error("user rejected the signing request")]
    Rejected,
    /// No wallet could be reached.
    #[error("wallet unavailable: {0}")]
    Unavailable(String),
}

/// Something that can ask the holder to sign an authorization message.
#[async_trait]
pub trait AuthorizationSigner: Send + Sync {
    /// Present `message` for signing. Each call is one user-visible prompt.
    async fn sign(&self, message: &[u8]) -> Result<WalletSignature, SigningFailure>;
}
