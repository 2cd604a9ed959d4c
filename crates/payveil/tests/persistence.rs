//! Grants persisted in SQLite survive a restart.

use std::sync::Arc;

use tempfile::TempDir;

use payveil::core::Keypair;
use payveil::gateway::memory::MemoryWallet;
use payveil::store::{GrantStore, SqliteGrantStore};
use payveil::{Collaborators, Outcome, Session, SessionConfig};
use payveil_testkit::{account, SessionFixture, CHAIN};

fn session(
    fixture: &SessionFixture,
    store: SqliteGrantStore,
    keypair: Keypair,
) -> (Session<SqliteGrantStore, MemoryWallet>, Arc<MemoryWallet>) {
    let wallet = Arc::new(MemoryWallet::new(keypair, CHAIN));
    let collaborators = Collaborators::new(
        Arc::new(fixture.network.ledger()),
        Arc::new(fixture.network.engine()),
        wallet.clone(),
        Arc::new(store),
    )
    .with_clock(fixture.clock.clone());
    (
        Session::new(collaborators, SessionConfig::default(), fixture.registry.clone()),
        wallet,
    )
}

#[tokio::test]
async fn test_grant_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("grants.db");
    let fixture = SessionFixture::new();

    {
        let store = SqliteGrantStore::open(&path).unwrap();
        let (first, wallet) = session(&fixture, store, account(2));
        first.refresh().await.unwrap();
        first.submit_value(512).await.unwrap();
        assert_eq!(first.decrypt_own().await.unwrap(), Outcome::Committed(512));
        assert_eq!(wallet.prompts(), 1);
    }

    let store = SqliteGrantStore::open(&path).unwrap();
    let (second, wallet) = session(&fixture, store, account(2));
    second.refresh().await.unwrap();
    assert_eq!(second.decrypt_own().await.unwrap(), Outcome::Committed(512));
    assert_eq!(wallet.prompts(), 0);
}

#[tokio::test]
async fn test_expired_grant_is_replaced_and_purged() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("grants.db");
    let fixture = SessionFixture::new();

    let store = SqliteGrantStore::open(&path).unwrap();
    let (alice, wallet) = session(&fixture, store, account(2));
    alice.refresh().await.unwrap();
    alice.submit_value(1).await.unwrap();
    alice.decrypt_own().await.unwrap();

    fixture.clock.advance(366 * 24 * 60 * 60);
    assert_eq!(alice.grants().purge_expired().await.unwrap(), 1);

    alice.submit_value(1).await.unwrap();
    assert_eq!(alice.decrypt_own().await.unwrap(), Outcome::Committed(2));
    assert_eq!(wallet.prompts(), 2);

    let reopened = SqliteGrantStore::open(&path).unwrap();
    let grants = reopened
        .list_for_holder(CHAIN, &account(2).address())
        .await
        .unwrap();
    assert_eq!(grants.len(), 1);
}
