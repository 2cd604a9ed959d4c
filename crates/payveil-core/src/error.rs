//! Error types for PayVeil Core.

use thiserror::Error;

/// Errors that can occur while parsing or verifying core values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid signature length: expected 64 bytes, got {0}")]
    InvalidSignatureLength(usize),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid handle: {0}")]
    InvalidHandle(String),

    #[error("malformed authorization message: {0}")]
    MalformedMessage(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
