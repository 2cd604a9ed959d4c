//! Error types for collaborator calls.

use thiserror::Error;

use payveil_core::Handle;

use crate::types::TxHash;

/// Errors returned by a ledger, engine or wallet.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The collaborator could not be reached or failed internally.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The ledger rejected the transaction.
    #[error("transaction reverted: {0}")]
    Reverted(String),

    /// The caller is not allowed to perform the action.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The request was malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No resource is deployed at the given address.
    #[error("no resource deployed at {0}")]
    NotDeployed(String),

    /// The engine does not know the handle.
    #[error("unknown handle {0}")]
    UnknownHandle(Handle),

    /// The ledger does not know the transaction.
    #[error("unknown transaction {0}")]
    UnknownTransaction(TxHash),

    /// Grant or sealing failure inside the engine.
    #[error("grant error: {0}")]
    Grant(#[from] payveil_grants::GrantError),
}

/// Result type for collaborator calls.
pub type Result<T> = std::result::Result<T, GatewayError>;
