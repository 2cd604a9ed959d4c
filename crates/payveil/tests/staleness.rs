//! Results that arrive after the world moved on must never be applied.

use proptest::prelude::*;

use payveil::core::{Handle, Identity};
use payveil::gateway::{Ledger, LedgerFields};
use payveil::{FieldKind, Outcome, Rejection, StaleReason, Unready};
use payveil_testkit::{account, Actor, EngineCall, LedgerCall, SessionFixture, CHAIN, UNKNOWN_CHAIN};

#[tokio::test]
async fn test_refresh_interleaved_with_account_switch_is_discarded() {
    let fixture = SessionFixture::new();
    let alice = fixture.actor(account(2));

    let gate = alice.ledger.gate(LedgerCall::ReadFields).clone();
    gate.close();

    let session = alice.session.clone();
    let refresh = tokio::spawn(async move { session.refresh().await });
    gate.arrived(1).await;

    alice.wallet().switch_account(account(3));
    gate.open();

    let outcome = refresh.await.unwrap().unwrap();
    assert_eq!(outcome, Outcome::Discarded(StaleReason::IdentityChanged));
    assert_eq!(alice.session.snapshot().observed, None);
    assert_eq!(alice.session.entry_count(), None);

    // A fresh refresh under the new account commits.
    let outcome = alice.session.refresh().await.unwrap();
    assert!(outcome.is_committed());
    assert_eq!(
        alice.session.snapshot().observed,
        Some(fixture.identity(&account(3)))
    );
}

#[tokio::test]
async fn test_refresh_under_new_identity_resets_tracked_fields() {
    let fixture = SessionFixture::new();
    let alice = fixture.actor(account(2));

    alice.session.refresh().await.unwrap();
    alice.session.submit_value(250).await.unwrap();
    assert_eq!(alice.session.decrypt_own().await.unwrap(), Outcome::Committed(250));
    assert_eq!(alice.session.clear_value(FieldKind::Own), Some(250));

    alice.wallet().switch_account(account(3));
    alice.session.refresh().await.unwrap();

    assert_eq!(alice.session.handle(FieldKind::Own), None);
    assert_eq!(alice.session.clear_value(FieldKind::Own), None);
}

#[tokio::test]
async fn test_decryption_interleaved_with_account_switch_is_discarded() {
    let fixture = SessionFixture::new();
    let alice = fixture.actor(account(2));

    alice.session.refresh().await.unwrap();
    alice.session.submit_value(100).await.unwrap();

    let gate = alice.engine.gate(EngineCall::Decrypt).clone();
    gate.close();
    let session = alice.session.clone();
    let decrypt = tokio::spawn(async move { session.decrypt_own().await });
    gate.arrived(1).await;

    alice.wallet().switch_account(account(3));
    gate.open();

    let outcome = decrypt.await.unwrap().unwrap();
    assert_eq!(outcome, Outcome::Discarded(StaleReason::IdentityChanged));
    assert_eq!(alice.session.clear_value(FieldKind::Own), None);
    assert_eq!(alice.session.status().message, "Ignore decryption");
}

#[tokio::test]
async fn test_decryption_interleaved_with_chain_switch_is_discarded() {
    let fixture = SessionFixture::new();
    let alice = fixture.actor(account(2));

    alice.session.refresh().await.unwrap();
    alice.session.submit_value(100).await.unwrap();

    let gate = alice.engine.gate(EngineCall::Decrypt).clone();
    gate.close();
    let session = alice.session.clone();
    let decrypt = tokio::spawn(async move { session.decrypt_own().await });
    gate.arrived(1).await;

    alice.wallet().switch_chain(payveil_testkit::UNKNOWN_CHAIN);
    gate.open();

    let outcome = decrypt.await.unwrap().unwrap();
    assert_eq!(outcome, Outcome::Discarded(StaleReason::IdentityChanged));
    assert_eq!(alice.session.identity(), None);
}

#[tokio::test]
async fn test_late_decryption_after_handle_change_is_dropped() {
    let fixture = SessionFixture::new();
    let alice = fixture.actor(account(2));
    let authority = fixture.authority_actor();

    alice.session.refresh().await.unwrap();
    alice.session.submit_value(100).await.unwrap();
    authority.session.refresh().await.unwrap();
    let first = authority.session.handle(FieldKind::Aggregate).unwrap();

    let gate = authority.engine.gate(EngineCall::Decrypt).clone();
    gate.close();
    let session = authority.session.clone();
    let decrypt = tokio::spawn(async move { session.decrypt_aggregate().await });
    gate.arrived(1).await;

    // Another account writes, and the authority observes the new handle
    // while its decryption of the old one is still in flight.
    alice.session.submit_value(50).await.unwrap();
    authority.session.refresh().await.unwrap();
    let second = authority.session.handle(FieldKind::Aggregate).unwrap();
    assert_ne!(first, second);

    gate.open();
    let outcome = decrypt.await.unwrap().unwrap();
    assert_eq!(outcome, Outcome::Discarded(StaleReason::HandleChanged));
    assert_eq!(authority.session.clear_value(FieldKind::Aggregate), None);

    // Decrypting again yields the value behind the current handle.
    assert_eq!(
        authority.session.decrypt_aggregate().await.unwrap(),
        Outcome::Committed(150)
    );
}

#[tokio::test]
async fn test_own_submission_after_handle_change_discards_old_decryption() {
    let fixture = SessionFixture::new();
    let alice = fixture.actor(account(2));

    alice.session.refresh().await.unwrap();
    alice.session.submit_value(100).await.unwrap();

    let gate = alice.engine.gate(EngineCall::Decrypt).clone();
    gate.close();
    let session = alice.session.clone();
    let decrypt = tokio::spawn(async move { session.decrypt_own().await });
    gate.arrived(1).await;

    // The second submission refreshes, so the handle has moved by now.
    alice.session.submit_value(50).await.unwrap();
    gate.open();

    let outcome = decrypt.await.unwrap().unwrap();
    assert_eq!(outcome, Outcome::Discarded(StaleReason::HandleChanged));
    assert_eq!(alice.session.clear_value(FieldKind::Own), None);
    assert_eq!(alice.session.decrypt_own().await.unwrap(), Outcome::Committed(150));
}

#[tokio::test]
async fn test_submission_landing_before_refresh_supersedes_decryption() {
    let fixture = SessionFixture::new();
    let alice = fixture.actor(account(2));

    alice.session.refresh().await.unwrap();
    alice.session.submit_value(100).await.unwrap();
    let first = alice.session.handle(FieldKind::Own).unwrap();

    let decrypt_gate = alice.engine.gate(EngineCall::Decrypt).clone();
    decrypt_gate.close();
    let session = alice.session.clone();
    let decrypt = tokio::spawn(async move { session.decrypt_own().await });
    decrypt_gate.arrived(1).await;

    // Hold the refresh that follows the second submission, so the old
    // handle is still current when the decryption returns.
    let read_gate = alice.ledger.gate(LedgerCall::ReadFields).clone();
    let reads = read_gate.arrivals();
    read_gate.close();
    let session = alice.session.clone();
    let submit = tokio::spawn(async move { session.submit_value(50).await });
    read_gate.arrived(reads + 1).await;

    decrypt_gate.open();
    let outcome = decrypt.await.unwrap().unwrap();
    assert_eq!(outcome, Outcome::Discarded(StaleReason::Superseded));
    assert_eq!(alice.session.handle(FieldKind::Own), Some(first));
    assert_eq!(alice.session.clear_value(FieldKind::Own), None);

    read_gate.open();
    assert!(submit.await.unwrap().unwrap().is_committed());
    assert_ne!(alice.session.handle(FieldKind::Own), Some(first));
}

#[tokio::test]
async fn test_peer_inspection_interleaved_with_account_switch_is_discarded() {
    let fixture = SessionFixture::new();
    let alice = fixture.actor(account(2));
    let bob = fixture.actor(account(3));

    alice.session.refresh().await.unwrap();
    alice.session.submit_value(70).await.unwrap();
    alice.session.grant_access(&bob.address_hex()).await.unwrap();

    let gate = bob.ledger.gate(LedgerCall::ReadValueOf).clone();
    gate.close();
    let session = bob.session.clone();
    let peer = alice.address_hex();
    let inspect = tokio::spawn(async move { session.inspect_peer(&peer).await });
    gate.arrived(1).await;

    bob.wallet().switch_account(account(4));
    gate.open();

    let outcome = inspect.await.unwrap().unwrap();
    assert_eq!(outcome, Outcome::Discarded(StaleReason::IdentityChanged));
    assert_eq!(bob.session.peer(), None);
    assert_eq!(bob.session.handle(FieldKind::Peer), None);
}

/// What happens while a refresh read is held at the ledger.
#[derive(Debug, Clone)]
enum Interleave {
    Nothing,
    SwitchAccount(u8),
    LeaveChain,
    PeerSubmit(u64),
}

#[derive(Debug, Clone)]
enum Step {
    Refresh,
    DelayedRefresh(Interleave),
    SwitchAccount(u8),
    SwitchChain(bool),
    Submit(u64),
}

fn interleave() -> impl Strategy<Value = Interleave> {
    prop_oneof![
        Just(Interleave::Nothing),
        (2u8..5).prop_map(Interleave::SwitchAccount),
        Just(Interleave::LeaveChain),
        (1u64..100).prop_map(Interleave::PeerSubmit),
    ]
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Refresh),
        interleave().prop_map(Step::DelayedRefresh),
        (2u8..5).prop_map(Step::SwitchAccount),
        any::<bool>().prop_map(Step::SwitchChain),
        (1u64..100).prop_map(Step::Submit),
    ]
}

fn present(handle: Handle) -> Option<Handle> {
    (!handle.is_zero()).then_some(handle)
}

/// The ledger's fields for `identity` right now, bypassing the gates.
async fn ledger_now(actor: &Actor, identity: &Identity) -> LedgerFields {
    actor.ledger.inner().read_fields(identity).await.unwrap()
}

struct Wallet {
    seed: u8,
    on_chain: bool,
}

impl Wallet {
    fn identity(&self, fixture: &SessionFixture) -> Option<Identity> {
        self.on_chain.then(|| fixture.identity(&account(self.seed)))
    }
}

async fn run_steps(steps: Vec<Step>) -> Result<(), TestCaseError> {
    let fixture = SessionFixture::new();
    let alice = fixture.actor(account(2));
    let peer = fixture.actor(account(9));
    let gate = alice.ledger.gate(LedgerCall::ReadFields).clone();

    let mut wallet = Wallet { seed: 2, on_chain: true };
    let mut last_read: Option<(Identity, LedgerFields)> = None;

    for step in steps {
        match step {
            Step::Refresh | Step::DelayedRefresh(_) if !wallet.on_chain => {
                let outcome = alice.session.refresh().await.unwrap();
                prop_assert_eq!(
                    outcome,
                    Outcome::Rejected(Rejection::NotReady(Unready::NotDeployed(UNKNOWN_CHAIN)))
                );
            }
            Step::Refresh => {
                let identity = fixture.identity(&account(wallet.seed));
                let outcome = alice.session.refresh().await.unwrap();
                let fields = ledger_now(&alice, &identity).await;
                prop_assert_eq!(outcome, Outcome::Committed(fields));
                last_read = Some((identity, fields));
            }
            Step::DelayedRefresh(during) => {
                let started = wallet.identity(&fixture);
                let reads = alice.ledger.calls(LedgerCall::ReadFields);
                gate.close();
                let session = alice.session.clone();
                let refresh = tokio::spawn(async move { session.refresh().await });
                gate.arrived(reads + 1).await;

                match during {
                    Interleave::Nothing => {}
                    Interleave::SwitchAccount(seed) => {
                        alice.wallet().switch_account(account(seed));
                        wallet.seed = seed;
                    }
                    Interleave::LeaveChain => {
                        alice.wallet().switch_chain(UNKNOWN_CHAIN);
                        wallet.on_chain = false;
                    }
                    Interleave::PeerSubmit(amount) => {
                        prop_assert!(peer.session.submit_value(amount).await.unwrap().is_committed());
                    }
                }
                gate.open();
                let outcome = refresh.await.unwrap().unwrap();

                match (started, wallet.identity(&fixture)) {
                    (Some(before), Some(now)) if before == now => {
                        let fields = ledger_now(&alice, &now).await;
                        prop_assert_eq!(outcome, Outcome::Committed(fields));
                        last_read = Some((now, fields));
                    }
                    _ => prop_assert_eq!(outcome, Outcome::Discarded(StaleReason::IdentityChanged)),
                }
            }
            Step::SwitchAccount(seed) => {
                alice.wallet().switch_account(account(seed));
                wallet.seed = seed;
            }
            Step::SwitchChain(known) => {
                alice.wallet().switch_chain(if known { CHAIN } else { UNKNOWN_CHAIN });
                wallet.on_chain = known;
            }
            Step::Submit(amount) => {
                let outcome = alice.session.submit_value(amount).await.unwrap();
                match wallet.identity(&fixture) {
                    Some(identity) => {
                        prop_assert!(outcome.is_committed());
                        last_read = Some((identity, ledger_now(&alice, &identity).await));
                    }
                    None => prop_assert_eq!(
                        outcome,
                        Outcome::Rejected(Rejection::NotReady(Unready::NotDeployed(UNKNOWN_CHAIN)))
                    ),
                }
            }
        }

        let snapshot = alice.session.snapshot();
        prop_assert_eq!(snapshot.observed, last_read.map(|(identity, _)| identity));
        let fields = last_read.map(|(_, fields)| fields);
        prop_assert_eq!(alice.session.handle(FieldKind::Own), fields.and_then(|f| present(f.own)));
        prop_assert_eq!(
            alice.session.handle(FieldKind::Aggregate),
            fields.and_then(|f| present(f.aggregate))
        );
        prop_assert_eq!(alice.session.entry_count(), fields.map(|f| f.entry_count));
        prop_assert_eq!(alice.session.authority(), fields.map(|f| f.authority));
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_tracked_fields_follow_the_last_live_read(steps in prop::collection::vec(step(), 1..12)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run_steps(steps))?;
    }
}
