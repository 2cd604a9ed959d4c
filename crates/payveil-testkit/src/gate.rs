//! Gates and gated collaborators.
//!
//! A [`Gate`] holds callers at a suspension point until the test opens
//! it. Wrapping a collaborator in [`GatedLedger`], [`GatedEngine`] or
//! [`GatedWallet`] puts a gate in front of every call, which lets a test
//! freeze an operation mid-flight, change the world, and then let it
//! finish.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use payveil_core::{Address, ClearValue, Handle, Identity};
use payveil_gateway::{
    ConfidentialEngine, DecryptRequest, EncryptedInput, Ledger, LedgerFields, Result, TxHash,
    TxStatus, Wallet, WalletState,
};
use payveil_grants::{AuthorizationGrant, AuthorizationSigner, SigningFailure, WalletSignature};

/// A point callers pass through, open by default.
pub struct Gate {
    open: watch::Sender<bool>,
    arrivals: watch::Sender<usize>,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            open: watch::channel(true).0,
            arrivals: watch::channel(0).0,
        }
    }
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hold subsequent callers.
    pub fn close(&self) {
        self.open.send_replace(false);
    }

    /// Release every held caller and let later ones through.
    pub fn open(&self) {
        self.open.send_replace(true);
    }

    pub fn is_open(&self) -> bool {
        *self.open.borrow()
    }

    /// Number of callers that reached the gate so far.
    pub fn arrivals(&self) -> usize {
        *self.arrivals.borrow()
    }

    /// Wait until at least `count` callers reached the gate.
    pub async fn arrived(&self, count: usize) {
        let mut arrivals = self.arrivals.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = arrivals.wait_for(|n| *n >= count).await;
    }

    /// Record arrival, then wait while the gate is closed.
    pub async fn pass(&self) {
        let mut open = self.open.subscribe();
        self.arrivals.send_modify(|n| *n += 1);
        let _ = open.wait_for(|open| *open).await;
    }
}

/// Ledger calls that can be gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerCall {
    ReadFields,
    ReadValueOf,
    Submit,
    GrantAccess,
    CheckAccess,
    AwaitConfirmation,
}

/// Engine calls that can be gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineCall {
    Encrypt,
    Decrypt,
}

fn gates<K: Copy + Eq + std::hash::Hash>(keys: &[K]) -> HashMap<K, Arc<Gate>> {
    keys.iter().map(|k| (*k, Gate::new())).collect()
}

/// A ledger with a gate in front of every call.
pub struct GatedLedger<L> {
    inner: L,
    gates: HashMap<LedgerCall, Arc<Gate>>,
}

impl<L: Ledger> GatedLedger<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            gates: gates(&[
                LedgerCall::ReadFields,
                LedgerCall::ReadValueOf,
                LedgerCall::Submit,
                LedgerCall::GrantAccess,
                LedgerCall::CheckAccess,
                LedgerCall::AwaitConfirmation,
            ]),
        }
    }

    pub fn gate(&self, call: LedgerCall) -> &Arc<Gate> {
        &self.gates[&call]
    }

    /// How many times `call` was made.
    pub fn calls(&self, call: LedgerCall) -> usize {
        self.gate(call).arrivals()
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }
}

#[async_trait]
impl<L: Ledger> Ledger for GatedLedger<L> {
    async fn read_fields(&self, identity: &Identity) -> Result<LedgerFields> {
        self.gate(LedgerCall::ReadFields).pass().await;
        self.inner.read_fields(identity).await
    }

    async fn read_value_of(&self, identity: &Identity, owner: &Address) -> Result<Handle> {
        self.gate(LedgerCall::ReadValueOf).pass().await;
        self.inner.read_value_of(identity, owner).await
    }

    async fn submit_encrypted_value(&self, identity: &Identity, input: EncryptedInput) -> Result<TxHash> {
        self.gate(LedgerCall::Submit).pass().await;
        self.inner.submit_encrypted_value(identity, input).await
    }

    async fn grant_access(&self, identity: &Identity, grantee: &Address) -> Result<TxHash> {
        self.gate(LedgerCall::GrantAccess).pass().await;
        self.inner.grant_access(identity, grantee).await
    }

    async fn check_access(&self, identity: &Identity, owner: &Address, grantee: &Address) -> Result<bool> {
        self.gate(LedgerCall::CheckAccess).pass().await;
        self.inner.check_access(identity, owner, grantee).await
    }

    async fn await_confirmation(&self, tx: &TxHash) -> Result<TxStatus> {
        self.gate(LedgerCall::AwaitConfirmation).pass().await;
        self.inner.await_confirmation(tx).await
    }
}

/// An engine with a gate in front of every call.
pub struct GatedEngine<E> {
    inner: E,
    gates: HashMap<EngineCall, Arc<Gate>>,
}

impl<E: ConfidentialEngine> GatedEngine<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            gates: gates(&[EngineCall::Encrypt, EngineCall::Decrypt]),
        }
    }

    pub fn gate(&self, call: EngineCall) -> &Arc<Gate> {
        &self.gates[&call]
    }

    pub fn calls(&self, call: EngineCall) -> usize {
        self.gate(call).arrivals()
    }
}

#[async_trait]
impl<E: ConfidentialEngine> ConfidentialEngine for GatedEngine<E> {
    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    async fn encrypt(&self, resource: &Address, account: &Address, value: ClearValue) -> Result<EncryptedInput> {
        self.gate(EngineCall::Encrypt).pass().await;
        self.inner.encrypt(resource, account, value).await
    }

    async fn decrypt(
        &self,
        requests: &[DecryptRequest],
        grant: &AuthorizationGrant,
    ) -> Result<HashMap<Handle, ClearValue>> {
        self.gate(EngineCall::Decrypt).pass().await;
        self.inner.decrypt(requests, grant).await
    }
}

/// A wallet whose signing prompt waits at a gate.
pub struct GatedWallet<W> {
    inner: W,
    sign: Arc<Gate>,
}

impl<W: Wallet> GatedWallet<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            sign: Gate::new(),
        }
    }

    pub fn gate(&self) -> &Arc<Gate> {
        &self.sign
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }
}

#[async_trait]
impl<W: Wallet> AuthorizationSigner for GatedWallet<W> {
    async fn sign(&self, message: &[u8]) -> std::result::Result<WalletSignature, SigningFailure> {
        self.sign.pass().await;
        self.inner.sign(message).await
    }
}

impl<W: Wallet> Wallet for GatedWallet<W> {
    fn current(&self) -> Option<WalletState> {
        self.inner.current()
    }

    fn subscribe(&self) -> watch::Receiver<Option<WalletState>> {
        self.inner.subscribe()
    }
}
