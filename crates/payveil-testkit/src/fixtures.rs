//! Test fixtures for common scenarios.

use std::sync::Arc;

use payveil::{Collaborators, DeploymentRegistry, Session, SessionConfig};
use payveil_core::{Address, ChainId, Identity, Keypair};
use payveil_gateway::memory::{DevNetwork, MemoryEngine, MemoryLedger, MemoryWallet};
use payveil_grants::ManualClock;
use payveil_store::MemoryGrantStore;

use crate::gate::{GatedEngine, GatedLedger, GatedWallet};

/// Chain every fixture deploys on.
pub const CHAIN: ChainId = ChainId(31337);

/// A chain with no deployment.
pub const UNKNOWN_CHAIN: ChainId = ChainId(11155111);

/// Fixed start time for the fixture clock.
pub const GENESIS: i64 = 1_700_000_000;

pub type TestSession = Session<MemoryGrantStore, GatedWallet<MemoryWallet>>;

/// A dev network with one deployment and a manual clock.
pub struct SessionFixture {
    pub network: Arc<DevNetwork>,
    pub clock: Arc<ManualClock>,
    pub authority: Keypair,
    pub resource: Address,
    pub registry: DeploymentRegistry,
}

impl Default for SessionFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionFixture {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(GENESIS));
        let network = DevNetwork::with_clock(clock.clone());
        let authority = account(1);
        let resource = network.deploy(CHAIN, authority.address());
        let registry = DeploymentRegistry::new().with(CHAIN, resource, "hardhat");

        Self {
            network,
            clock,
            authority,
            resource,
            registry,
        }
    }

    /// The identity `keypair` has on the fixture deployment.
    pub fn identity(&self, keypair: &Keypair) -> Identity {
        Identity::new(CHAIN, keypair.address(), self.resource)
    }

    /// A session for `keypair` with its own wallet and grant store.
    pub fn actor(&self, keypair: Keypair) -> Actor {
        self.actor_with(keypair, Arc::new(MemoryGrantStore::new()), SessionConfig::default())
    }

    /// A session for the deployment authority.
    pub fn authority_actor(&self) -> Actor {
        self.actor(self.authority.clone())
    }

    /// A session sharing `store` with others, configured by `config`.
    pub fn actor_with(&self, keypair: Keypair, store: Arc<MemoryGrantStore>, config: SessionConfig) -> Actor {
        let wallet = Arc::new(GatedWallet::new(MemoryWallet::new(keypair.clone(), CHAIN)));
        let ledger = Arc::new(GatedLedger::new(self.network.ledger()));
        let engine = Arc::new(GatedEngine::new(self.network.engine()));

        let collaborators = Collaborators::new(ledger.clone(), engine.clone(), wallet.clone(), store.clone())
            .with_clock(self.clock.clone());
        let session = Arc::new(Session::new(collaborators, config, self.registry.clone()));

        Actor {
            keypair,
            session,
            wallet,
            ledger,
            engine,
            store,
        }
    }
}

/// One wallet's session and the gated collaborators behind it.
pub struct Actor {
    pub keypair: Keypair,
    pub session: Arc<TestSession>,
    pub wallet: Arc<GatedWallet<MemoryWallet>>,
    pub ledger: Arc<GatedLedger<MemoryLedger>>,
    pub engine: Arc<GatedEngine<MemoryEngine>>,
    pub store: Arc<MemoryGrantStore>,
}

impl Actor {
    pub fn address(&self) -> Address {
        self.keypair.address()
    }

    /// The account's address as a user would type it.
    pub fn address_hex(&self) -> String {
        self.keypair.address().to_hex()
    }

    /// The underlying wallet, for switching accounts and chains.
    pub fn wallet(&self) -> &MemoryWallet {
        self.wallet.inner()
    }

    /// Signing prompts shown so far.
    pub fn prompts(&self) -> usize {
        self.wallet.inner().prompts()
    }
}

/// A deterministic account keypair.
pub fn account(seed: u8) -> Keypair {
    Keypair::from_seed(&[seed; 32])
}

/// Install a test-writer subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use payveil::Outcome;

    #[tokio::test]
    async fn test_fixture_actor_refreshes() {
        let fixture = SessionFixture::new();
        let alice = fixture.actor(account(2));

        let outcome = alice.session.refresh().await.unwrap();
        let fields = outcome.committed().unwrap();
        assert_eq!(fields.authority, fixture.authority.address());
        assert_eq!(fields.entry_count, 0);
        assert_eq!(alice.session.identity(), Some(fixture.identity(&alice.keypair)));
    }

    #[tokio::test]
    async fn test_actors_share_the_network() {
        let fixture = SessionFixture::new();
        let alice = fixture.actor(account(2));
        let bob = fixture.actor(account(3));

        alice.session.refresh().await.unwrap();
        assert!(matches!(alice.session.submit_value(10).await.unwrap(), Outcome::Committed(_)));

        bob.session.refresh().await.unwrap();
        assert_eq!(bob.session.entry_count(), Some(1));
    }
}
