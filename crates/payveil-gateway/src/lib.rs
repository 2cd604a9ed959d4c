//! # PayVeil Gateway
//!
//! Interfaces to the collaborators a session talks to, and an in-memory
//! dev network implementing all of them.
//!
//! ## Collaborators
//!
//! - [`Ledger`]: encrypted entries, the aggregate and the access-control list
//! - [`ConfidentialEngine`]: encrypts inputs and decrypts handles under a grant
//! - [`Wallet`]: signs authorization messages, reports the active account
//!
//! ## Usage
//!
//! ```rust,no_run
//! use payveil_core::{ChainId, Keypair};
//! use payveil_gateway::memory::{DevNetwork, MemoryWallet};
//!
//! let network = DevNetwork::new();
//! let deployer = Keypair::generate();
//! let resource = network.deploy(ChainId(31337), deployer.address());
//! let ledger = network.ledger();
//! let engine = network.engine();
//! let wallet = MemoryWallet::new(deployer, ChainId(31337));
//! ```

pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{GatewayError, Result};
pub use traits::{ConfidentialEngine, Ledger, Wallet};
pub use types::{DecryptRequest, EncryptedInput, LedgerFields, TxHash, TxStatus, WalletState};
