//! What an operation reports back, and the session's status line.

use std::fmt;

use serde::{Deserialize, Serialize};

use payveil_core::{ChainId, Handle};

/// The kinds of operation a session runs. At most one of each kind is in
/// flight at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperationKind {
    Refresh,
    Submit,
    DecryptOwn,
    DecryptAggregate,
    DecryptPeer,
    GrantAccess,
    InspectPeer,
}

impl OperationKind {
    pub const ALL: [OperationKind; 7] = [
        OperationKind::Refresh,
        OperationKind::Submit,
        OperationKind::DecryptOwn,
        OperationKind::DecryptAggregate,
        OperationKind::DecryptPeer,
        OperationKind::GrantAccess,
        OperationKind::InspectPeer,
    ];

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Refresh => "refresh",
            OperationKind::Submit => "submit",
            OperationKind::DecryptOwn => "decrypt-own",
            OperationKind::DecryptAggregate => "decrypt-aggregate",
            OperationKind::DecryptPeer => "decrypt-peer",
            OperationKind::GrantAccess => "grant-access",
            OperationKind::InspectPeer => "inspect-peer",
        };
        f.write_str(name)
    }
}

/// How an operation ended, short of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The result was applied to the session.
    Committed(T),
    /// The result arrived after the world moved on and was thrown away.
    Discarded(StaleReason),
    /// The operation did not start.
    Rejected(Rejection),
}

impl<T> Outcome<T> {
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed(_))
    }

    pub fn committed(self) -> Option<T> {
        match self {
            Outcome::Committed(value) => Some(value),
            _ => None,
        }
    }
}

/// Why a result was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaleReason {
    /// Chain, account or resource changed while the operation was suspended.
    IdentityChanged,
    /// The field's handle changed while the decryption was in flight.
    HandleChanged,
    /// A submission landed while the decryption was in flight.
    Superseded,
}

/// Why an operation did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    /// An operation of the same kind is already running.
    Busy,
    /// Preconditions are not met.
    NotReady(Unready),
    /// The current handle is already decrypted.
    AlreadyDecrypted,
    /// The field holds no value (never stored, or the zero sentinel).
    NoValue,
    /// Only the authority may decrypt the aggregate.
    NotAuthority,
    /// The inspected peer has not granted access.
    NoAccess,
}

/// The precondition that is not met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unready {
    WalletDisconnected,
    NotDeployed(ChainId),
    EngineNotReady,
    /// The tracked fields were not read under the live identity yet.
    NotRefreshed,
    /// No peer has been inspected.
    NoPeer,
}

impl fmt::Display for Unready {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unready::WalletDisconnected => f.write_str("wallet not connected"),
            Unready::NotDeployed(chain_id) => write!(f, "deployment not found for chain {chain_id}"),
            Unready::EngineNotReady => f.write_str("decryption engine not ready"),
            Unready::NotRefreshed => f.write_str("data not loaded for the current account"),
            Unready::NoPeer => f.write_str("no peer inspected"),
        }
    }
}

/// The result of inspecting a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerInspection {
    /// The peer has not granted access to the caller.
    NoAccess,
    /// Access is granted but the peer never stored a value.
    NoValue,
    /// The peer's handle, ready for decrypt-peer.
    Ready(Handle),
}

/// Tone of the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusKind {
    Info,
    Success,
    Advisory,
    Error,
}

/// The single human-readable status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub kind: StatusKind,
    pub message: String,
}

impl Status {
    pub fn new(kind: StatusKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::new(StatusKind::Info, "")
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
