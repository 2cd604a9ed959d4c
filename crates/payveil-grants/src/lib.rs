//! # PayVeil Grants
//!
//! Authorization grants for confidential decryption.
//!
//! ## Overview
//!
//! A decryption engine only reveals a clear value to a holder that presents
//! a valid [`AuthorizationGrant`]: a wallet-signed message naming the
//! holder, the resources it covers, a fresh session key and a validity
//! window. Obtaining one costs a wallet prompt, so the
//! [`SignatureManager`] caches grants in a [`GrantStore`](payveil_store::GrantStore)
//! and reuses them until they expire.
//!
//! ## Key Concepts
//!
//! - **AuthorizationGrant**: immutable, time-bounded, resource-scoped
//! - **SessionKeypair**: X25519 key the engine seals clear values to
//! - **AuthorizationSigner**: the wallet seam that produces signatures
//! - **Clock**: injected time source, so expiry is testable
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use payveil_grants::{GrantConfig, SignatureManager};
//! use payveil_store::MemoryGrantStore;
//!
//! // let manager = SignatureManager::new(Arc::new(MemoryGrantStore::new()), wallet, GrantConfig::default());
//! // let grant = manager.obtain_grant(&identity, &[identity.resource]).await?;
//! ```

pub mod clock;
pub mod crypto;
pub mod error;
pub mod grant;
pub mod manager;
pub mod signer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use crypto::{EncryptionKey, EncryptionNonce, SealedValue, SessionKeypair};
pub use error::{GrantError, Result};
pub use grant::AuthorizationGrant;
pub use manager::{GrantConfig, SignatureManager, DEFAULT_VALIDITY};
pub use signer::{AuthorizationSigner, SigningFailure, WalletSignature};
