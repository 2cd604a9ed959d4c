//! Identity: the (chain, account, resource) tuple scoping every operation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Address, ChainId};

/// The scope of a session operation.
///
/// Two identities are equal iff chain, account and resource all match.
/// An operation started under one identity whose result arrives after the
/// live identity changed is stale.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// The network the wallet is connected to.
    pub chain_id: ChainId,
    /// The connected account.
    pub account: Address,
    /// The target resource (contract) address on that network.
    pub resource: Address,
}

impl Identity {
    /// Create a new identity.
    pub const fn new(chain_id: ChainId, account: Address, resource: Address) -> Self {
        Self {
            chain_id,
            account,
            resource,
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Identity(chain={}, account={}, resource={})",
            self.chain_id, self.account, self.resource
        )
    }
}
