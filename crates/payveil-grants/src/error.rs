//! Error types for grant acquisition.

use thiserror::Error;

/// Errors that can occur while obtaining or using a grant.
#[derive(Debug, Error)]
pub enum GrantError {
    /// The wallet refused to sign, or no wallet is available.
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    /// The wallet answered with a signature that does not check out.
    #[error("malformed authorization: {0}")]
    AuthorizationMalformed(String),

    /// The request itself is unusable (e.g. no resources).
    #[error("invalid grant request: {0}")]
    InvalidRequest(String),

    /// Sealing or opening a value failed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Grant store error.
    #[error("store error: {0}")]
    Store(#[from] payveil_store::StoreError),
}

/// Result type for grant operations.
pub type Result<T> = std::result::Result<T, GrantError>;
