//! Error types for session operations.

use payveil_core::CoreError;
use payveil_gateway::GatewayError;
use payveil_grants::GrantError;
use thiserror::Error;

/// Errors that can end a session operation.
///
/// None of these are fatal to the session: after any of them the session
/// accepts the next operation of any kind. Staleness is not an error; it
/// is reported as [`Outcome::Discarded`](crate::Outcome::Discarded).
#[derive(Debug, Error)]
pub enum SessionError {
    /// The wallet refused to sign or is unavailable.
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    /// The wallet's signature did not check out.
    #[error("malformed authorization: {0}")]
    AuthorizationMalformed(String),

    /// A ledger, engine or store call failed.
    #[error("{0}")]
    ExternalCallFailure(String),

    /// Input rejected before any external call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Bad configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl SessionError {
    /// Whether re-invoking the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SessionError::InvalidInput(_) | SessionError::Config(_))
    }
}

impl From<GrantError> for SessionError {
    fn from(err: GrantError) -> Self {
        match err {
            GrantError::AuthorizationDenied(reason) => SessionError::AuthorizationDenied(reason),
            GrantError::AuthorizationMalformed(reason) => SessionError::AuthorizationMalformed(reason),
            GrantError::InvalidRequest(reason) => SessionError::InvalidInput(reason),
            other => SessionError::ExternalCallFailure(other.to_string()),
        }
    }
}

impl From<GatewayError> for SessionError {
    fn from(err: GatewayError) -> Self {
        SessionError::ExternalCallFailure(err.to_string())
    }
}

impl From<CoreError> for SessionError {
    fn from(err: CoreError) -> Self {
        SessionError::InvalidInput(err.to_string())
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
