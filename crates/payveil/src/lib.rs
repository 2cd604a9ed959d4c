//! # PayVeil
//!
//! Client-side sessions for confidential values: who may decrypt what,
//! which decrypted values are still current, and how concurrent operations
//! stay consistent while the wallet's account or network changes.
//!
//! ## Overview
//!
//! A [`Session`] ties together three pieces:
//!
//! - **Signature manager** ([`payveil_grants::SignatureManager`]): obtains
//!   wallet-signed decryption grants and caches them until they expire
//! - **Field tracker** ([`FieldTracker`]): per-field ciphertext handles and
//!   the clear values decrypted from them
//! - **Operation coordinator** ([`Session`]): refresh, submit, decrypt,
//!   grant access and inspect peer, each single-flight per kind and each
//!   discarding results that arrive after the identity or handle moved on
//!
//! ## Key Concepts
//!
//! - **Identity**: (chain, account, resource). Results computed under one
//!   identity are never applied under another.
//! - **Handle**: an opaque reference to an encrypted value. A clear value
//!   is shown only while it is tagged with the current handle.
//! - **Outcome**: every operation reports `Committed`, `Discarded` (stale)
//!   or `Rejected` (did not start); real failures are [`SessionError`]s.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use payveil::{Collaborators, DeploymentRegistry, Session, SessionConfig};
//! use payveil::core::{ChainId, Keypair};
//! use payveil::gateway::memory::{DevNetwork, MemoryWallet};
//! use payveil::store::MemoryGrantStore;
//!
//! async fn example() -> Result<(), payveil::SessionError> {
//!     let network = DevNetwork::new();
//!     let keypair = Keypair::generate();
//!     let resource = network.deploy(ChainId(31337), keypair.address());
//!
//!     let session = Session::new(
//!         Collaborators::new(
//!             Arc::new(network.ledger()),
//!             Arc::new(network.engine()),
//!             Arc::new(MemoryWallet::new(keypair, ChainId(31337))),
//!             Arc::new(MemoryGrantStore::new()),
//!         ),
//!         SessionConfig::default(),
//!         DeploymentRegistry::new().with(ChainId(31337), resource, "hardhat"),
//!     );
//!
//!     session.refresh().await?;
//!     session.submit_value(4200).await?;
//!     session.decrypt_own().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod field;
pub mod outcome;
pub mod session;

// Re-export component crates
pub use payveil_core as core;
pub use payveil_gateway as gateway;
pub use payveil_grants as grants;
pub use payveil_store as store;

pub use config::{Deployment, DeploymentRegistry, SessionConfig};
pub use error::{Result, SessionError};
pub use field::{Decrypted, FieldKind, FieldState, FieldTracker};
pub use outcome::{
    OperationKind, Outcome, PeerInspection, Rejection, StaleReason, Status, StatusKind, Unready,
};
pub use session::{Collaborators, PeerView, Session, SessionSnapshot};
