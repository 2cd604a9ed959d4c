//! Session configuration and the deployment registry.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use payveil_core::{Address, ChainId};
use payveil_grants::{GrantConfig, DEFAULT_VALIDITY};

use crate::error::{Result, SessionError};

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Validity of newly signed grants, in seconds.
    pub grant_validity_secs: u64,
    /// Whether `watch_identity` refreshes on every wallet change.
    pub refresh_on_identity_change: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            grant_validity_secs: DEFAULT_VALIDITY.as_secs(),
            refresh_on_identity_change: true,
        }
    }
}

impl SessionConfig {
    /// Parse from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SessionError::Config(e.to_string()))?;
        if config.grant_validity_secs == 0 {
            return Err(SessionError::Config("grant_validity_secs must be positive".into()));
        }
        Ok(config)
    }

    /// Grant settings derived from this configuration.
    pub fn grant_config(&self) -> GrantConfig {
        GrantConfig {
            validity: Duration::from_secs(self.grant_validity_secs),
        }
    }
}

/// Where the resource lives on one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    /// Deployed address, if any.
    pub address: Option<Address>,
    pub chain_name: String,
}

#[derive(Deserialize, Serialize)]
struct RawDeployment {
    #[serde(default)]
    address: Option<String>,
    #[serde(rename = "chainName", default)]
    chain_name: String,
}

/// Maps chain ids to the resource address deployed there.
///
/// JSON form, keyed by decimal chain id:
///
/// ```json
/// { "31337": { "address": "0x5fbd…", "chainName": "hardhat" } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentRegistry {
    deployments: BTreeMap<ChainId, Deployment>,
}

impl DeploymentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the deployment for `chain_id`.
    pub fn insert(&mut self, chain_id: ChainId, address: Address, chain_name: impl Into<String>) {
        self.deployments.insert(
            chain_id,
            Deployment {
                address: Some(address),
                chain_name: chain_name.into(),
            },
        );
    }

    /// Builder form of [`Self::insert`].
    pub fn with(mut self, chain_id: ChainId, address: Address, chain_name: impl Into<String>) -> Self {
        self.insert(chain_id, address, chain_name);
        self
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, RawDeployment> =
            serde_json::from_str(json).map_err(|e| SessionError::Config(e.to_string()))?;

        let mut deployments = BTreeMap::new();
        for (chain, entry) in raw {
            let chain_id = chain
                .parse::<u64>()
                .map(ChainId)
                .map_err(|e| SessionError::Config(format!("bad chain id {chain:?}: {e}")))?;
            let address = entry
                .address
                .as_deref()
                .map(Address::parse)
                .transpose()
                .map_err(|e| SessionError::Config(e.to_string()))?;
            deployments.insert(
                chain_id,
                Deployment {
                    address,
                    chain_name: entry.chain_name,
                },
            );
        }
        Ok(Self { deployments })
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| SessionError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn get(&self, chain_id: ChainId) -> Option<&Deployment> {
        self.deployments.get(&chain_id)
    }

    /// The deployed, non-zero resource address on `chain_id`.
    pub fn resolve(&self, chain_id: ChainId) -> Option<Address> {
        self.get(chain_id)
            .and_then(|d| d.address)
            .filter(|a| !a.is_zero())
    }
}
