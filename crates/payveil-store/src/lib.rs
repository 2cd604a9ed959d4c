//! # PayVeil Store
//!
//! Persistence for authorization grants. The grant cache is the only
//! session state that survives a process restart, so it sits behind the
//! [`GrantStore`] trait with a SQLite implementation for real use and an
//! in-memory one for tests.
//!
//! ## Key Types
//!
//! - [`GrantStore`] - The async trait for grant persistence
//! - [`SqliteGrantStore`] - SQLite-based persistent storage
//! - [`MemoryGrantStore`] - In-memory storage for tests
//! - [`GrantKey`] - (chain, holder, covered resources) lookup key
//! - [`StoredGrant`] - The persisted record
//!
//! ## Usage
//!
//! ```rust,no_run
//! use payveil_store::{GrantStore, SqliteGrantStore};
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteGrantStore::open("grants.db").unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteGrantStore::open_memory().unwrap();
//!
//!     // Drop everything that has expired
//!     let removed = store.purge_expired(1_700_000_000).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Last write wins**: `put` replaces any record under the same key
//! - **No validity checks**: the store persists what it is given; expiry
//!   and holder checks belong to the signature manager

pub mod error;
pub mod memory;
pub mod migration;
pub mod record;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryGrantStore;
pub use record::{GrantKey, StoredGrant};
pub use sqlite::SqliteGrantStore;
pub use traits::GrantStore;
