//! # PayVeil Core
//!
//! Pure primitives for PayVeil: addresses, ciphertext handles, identities
//! and the canonical authorization message that wallets sign.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over the values every other PayVeil crate passes around.
//!
//! ## Key Types
//!
//! - [`Address`] - A 20-byte account or contract address
//! - [`Handle`] - An opaque reference to a ciphertext held by the ledger
//! - [`Identity`] - The (chain, account, resource) tuple scoping every operation
//! - [`AuthorizationMessage`] - The message a wallet signs to issue a grant
//!
//! ## Canonicalization
//!
//! Authorization messages are encoded as deterministic CBOR so the same
//! grant parameters always produce the same signed bytes. See [`message`].

pub mod crypto;
pub mod error;
pub mod identity;
pub mod message;
pub mod types;

pub use crypto::{Ed25519PublicKey, Ed25519Signature, Keypair};
pub use error::{CoreError, Result};
pub use identity::Identity;
pub use message::{AuthorizationMessage, AUTHORIZATION_DOMAIN};
pub use types::{Address, ChainId, ClearValue, Handle};
