//! Walks a dev network through submit, refresh, decrypt, grant and inspect.
//!
//! Usage: `payveil-demo [GRANT_DB]`. Grants are cached in SQLite, in memory
//! unless a path is given; run twice with the same path to see the second
//! run skip every signing prompt.

use std::sync::Arc;

use anyhow::{bail, Context};
use payveil::core::{ChainId, Keypair};
use payveil::gateway::memory::{DevNetwork, MemoryWallet};
use payveil::store::SqliteGrantStore;
use payveil::{Collaborators, DeploymentRegistry, FieldKind, Outcome, Session, SessionConfig};

const CHAIN: ChainId = ChainId(31337);

type DemoSession = Session<SqliteGrantStore, MemoryWallet>;

fn session(
    network: &Arc<DevNetwork>,
    store: &Arc<SqliteGrantStore>,
    registry: &DeploymentRegistry,
    keypair: Keypair,
) -> (DemoSession, Arc<MemoryWallet>) {
    let wallet = Arc::new(MemoryWallet::new(keypair, CHAIN));
    let session = Session::new(
        Collaborators::new(
            Arc::new(network.ledger()),
            Arc::new(network.engine()),
            wallet.clone(),
            store.clone(),
        ),
        SessionConfig::default(),
        registry.clone(),
    );
    (session, wallet)
}

fn committed<T>(what: &str, outcome: Outcome<T>) -> anyhow::Result<T> {
    match outcome {
        Outcome::Committed(value) => Ok(value),
        Outcome::Discarded(reason) => bail!("{what} discarded: {reason:?}"),
        Outcome::Rejected(rejection) => bail!("{what} rejected: {rejection:?}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let store = Arc::new(match std::env::args().nth(1) {
        Some(path) => SqliteGrantStore::open(&path).with_context(|| format!("opening {path}"))?,
        None => SqliteGrantStore::open_memory()?,
    });

    let network = DevNetwork::new();
    let authority = Keypair::from_seed(&[1; 32]);
    let alice = Keypair::from_seed(&[2; 32]);
    let bob = Keypair::from_seed(&[3; 32]);

    let resource = network.deploy(CHAIN, authority.address());
    let registry = DeploymentRegistry::new().with(CHAIN, resource, "devnet");
    tracing::info!(%resource, "deployed");

    let (alice_session, alice_wallet) = session(&network, &store, &registry, alice.clone());
    let (bob_session, bob_wallet) = session(&network, &store, &registry, bob);
    let (authority_session, authority_wallet) = session(&network, &store, &registry, authority);

    // Alice stores a value, reads it back and shares it with Bob.
    alice_session.refresh().await?;
    committed("alice submit", alice_session.submit_value(5_000).await?)?;
    let own = committed("alice decrypt", alice_session.decrypt_own().await?)?;
    println!("alice sees her own value: {own}");
    committed(
        "alice grant",
        alice_session
            .grant_access(&bob_session.identity().context("bob not connected")?.account.to_hex())
            .await?,
    )?;

    // Bob stores his own value, then looks at Alice's.
    bob_session.refresh().await?;
    committed("bob submit", bob_session.submit_value(7_000).await?)?;
    let inspection = committed("bob inspect", bob_session.inspect_peer(&alice.address().to_hex()).await?)?;
    println!("bob inspected alice: {inspection:?}");
    let peer = committed("bob decrypt peer", bob_session.decrypt_peer().await?)?;
    println!("bob sees alice's value: {peer}");

    // The authority decrypts the aggregate; the average is derived locally.
    authority_session.refresh().await?;
    let total = committed("authority decrypt", authority_session.decrypt_aggregate().await?)?;
    println!(
        "aggregate {total} over {} entries, average {:?}",
        authority_session.entry_count().unwrap_or(0),
        authority_session.average()
    );
    println!(
        "authority has aggregate for current handle: {}",
        authority_session.clear_value(FieldKind::Aggregate).is_some()
    );

    println!(
        "signing prompts: alice={} bob={} authority={}",
        alice_wallet.prompts(),
        bob_wallet.prompts(),
        authority_wallet.prompts()
    );
    println!("status: {}", alice_session.status());
    Ok(())
}
