//! # PayVeil Testkit
//!
//! Testing utilities for PayVeil sessions.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a dev network with one deployment, a manual clock, and
//!   sessions wired to it
//! - **Gates**: wrappers that pause ledger, engine and wallet calls so a
//!   test can change the world while an operation is suspended
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Pausing an operation
//!
//! ```rust,no_run
//! use payveil_testkit::fixtures::{account, SessionFixture};
//! use payveil_testkit::gate::LedgerCall;
//!
//! # async fn example() {
//! let fixture = SessionFixture::new();
//! let alice = fixture.actor(account(2));
//!
//! let gate = alice.ledger.gate(LedgerCall::ReadFields).clone();
//! gate.close();
//!
//! let session = alice.session.clone();
//! let refresh = tokio::spawn(async move { session.refresh().await });
//! gate.arrived(1).await;
//!
//! // The refresh is suspended on the ledger read here.
//! alice.wallet().switch_account(account(3));
//!
//! gate.open();
//! let outcome = refresh.await.unwrap().unwrap();
//! assert!(!outcome.is_committed());
//! # }
//! ```

pub mod fixtures;
pub mod gate;
pub mod generators;

pub use fixtures::{account, init_tracing, Actor, SessionFixture, TestSession, CHAIN, GENESIS, UNKNOWN_CHAIN};
pub use gate::{EngineCall, Gate, GatedEngine, GatedLedger, GatedWallet, LedgerCall};
pub use generators::{field_ops, FieldOp};
