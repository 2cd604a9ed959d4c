//! An in-memory dev network.
//!
//! Emulates the ledger, the decryption engine and the wallet in one process
//! so sessions can be exercised without a chain. Values are really
//! encrypted: the network keeps them sealed under its own key and only
//! hands them out sealed to a grant's session key.
//!
//! Ledger rules:
//!
//! - submitting adds the value to the caller's entry and to the aggregate;
//!   the first submission creates the entry and bumps the entry count
//! - every write mints fresh handles for the fields it touched
//! - an owner can read their own entry, the authority can read the
//!   aggregate, and `grant_access` lets a grantee read the caller's entry
//!   (current and future handles)

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::watch;

use payveil_core::{Address, ChainId, ClearValue, Handle, Identity, Keypair};
use payveil_grants::{
    AuthorizationGrant, AuthorizationSigner, Clock, EncryptionKey, EncryptionNonce, SealedValue,
    SigningFailure, SystemClock, WalletSignature,
};

use crate::error::{GatewayError, Result};
use crate::traits::{ConfidentialEngine, Ledger, Wallet};
use crate::types::{DecryptRequest, EncryptedInput, LedgerFields, TxHash, TxStatus, WalletState};

const HANDLE_CONTEXT: &str = "payveil-devnet-v0-handle";
const DEPLOY_CONTEXT: &str = "payveil-devnet-v0-deploy";
const TX_CONTEXT: &str = "payveil-devnet-v0-tx";

/// Shared state behind a dev ledger and engine.
pub struct DevNetwork {
    state: Mutex<NetworkState>,
    value_key: EncryptionKey,
    proof_key: [u8; 32],
    clock: Arc<dyn Clock>,
    ready: AtomicBool,
}

#[derive(Default)]
struct NetworkState {
    deployments: HashMap<(ChainId, Address), Deployment>,
    values: HashMap<Handle, StoredValue>,
    transactions: HashMap<TxHash, TxStatus>,
    counter: u64,
    fail_next: Option<String>,
}

struct Deployment {
    authority: Address,
    entries: HashMap<Address, Handle>,
    aggregate: Handle,
    entry_count: u64,
    /// (owner, grantee) pairs.
    viewers: HashSet<(Address, Address)>,
}

struct StoredValue {
    chain_id: ChainId,
    resource: Address,
    nonce: EncryptionNonce,
    ciphertext: Vec<u8>,
    readers: HashSet<Address>,
}

impl DevNetwork {
    /// Create a network using the system clock.
    pub fn new() -> Arc<Self> {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a network that checks grant expiry against `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Arc<Self> {
        let mut proof_key = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut proof_key);
        Arc::new(Self {
            state: Mutex::new(NetworkState::default()),
            value_key: EncryptionKey::generate(),
            proof_key,
            clock,
            ready: AtomicBool::new(true),
        })
    }

    /// A ledger client for this network.
    pub fn ledger(self: &Arc<Self>) -> MemoryLedger {
        MemoryLedger {
            network: Arc::clone(self),
        }
    }

    /// A decryption engine client for this network.
    pub fn engine(self: &Arc<Self>) -> MemoryEngine {
        MemoryEngine {
            network: Arc::clone(self),
        }
    }

    /// Deploy a new resource on `chain_id` with `authority` as deployer.
    pub fn deploy(&self, chain_id: ChainId, authority: Address) -> Address {
        let mut state = self.lock();
        state.counter += 1;

        let mut hasher = blake3::Hasher::new_derive_key(DEPLOY_CONTEXT);
        hasher.update(&chain_id.get().to_be_bytes());
        hasher.update(authority.as_bytes());
        hasher.update(&state.counter.to_be_bytes());
        let mut address = [0u8; 20];
        address.copy_from_slice(&hasher.finalize().as_bytes()[..20]);
        let resource = Address(address);

        state.deployments.insert(
            (chain_id, resource),
            Deployment {
                authority,
                entries: HashMap::new(),
                aggregate: Handle::ZERO,
                entry_count: 0,
                viewers: HashSet::new(),
            },
        );
        tracing::debug!(%chain_id, %resource, %authority, "deployed resource");
        resource
    }

    /// Mark the engine ready or not.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Make the next ledger or engine call fail with `message`.
    pub fn fail_next_call(&self, message: impl Into<String>) {
        self.lock().fail_next = Some(message.into());
    }

    /// Number of transactions accepted so far.
    pub fn transaction_count(&self) -> usize {
        self.lock().transactions.len()
    }

    fn lock(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn proof(&self, resource: &Address, account: &Address, ciphertext: &[u8]) -> Vec<u8> {
        let mut hasher = blake3::Hasher::new_keyed(&self.proof_key);
        hasher.update(resource.as_bytes());
        hasher.update(account.as_bytes());
        hasher.update(ciphertext);
        hasher.finalize().as_bytes().to_vec()
    }

    fn seal_value(&self, value: ClearValue) -> Result<(EncryptionNonce, Vec<u8>)> {
        let nonce = EncryptionNonce::generate();
        let ciphertext = self.value_key.encrypt(&value.to_be_bytes(), &nonce)?;
        Ok((nonce, ciphertext))
    }

    fn open_value(&self, nonce: &EncryptionNonce, ciphertext: &[u8]) -> Result<ClearValue> {
        let plaintext = self.value_key.decrypt(ciphertext, nonce)?;
        decode_value(&plaintext)
    }
}

impl NetworkState {
    fn take_failure(&mut self) -> Result<()> {
        match self.fail_next.take() {
            Some(message) => Err(GatewayError::Unavailable(message)),
            None => Ok(()),
        }
    }

    fn deployment(&self, identity: &Identity) -> Result<&Deployment> {
        self.deployments
            .get(&(identity.chain_id, identity.resource))
            .ok_or_else(|| GatewayError::NotDeployed(identity.resource.to_hex()))
    }

    fn deployment_mut(&mut self, identity: &Identity) -> Result<&mut Deployment> {
        self.deployments
            .get_mut(&(identity.chain_id, identity.resource))
            .ok_or_else(|| GatewayError::NotDeployed(identity.resource.to_hex()))
    }

    fn next_handle(&mut self, identity: &Identity) -> Handle {
        self.counter += 1;
        let mut hasher = blake3::Hasher::new_derive_key(HANDLE_CONTEXT);
        hasher.update(&identity.chain_id.get().to_be_bytes());
        hasher.update(identity.resource.as_bytes());
        hasher.update(&self.counter.to_be_bytes());
        Handle(*hasher.finalize().as_bytes())
    }

    fn record_transaction(&mut self, status: TxStatus) -> TxHash {
        self.counter += 1;
        let mut hasher = blake3::Hasher::new_derive_key(TX_CONTEXT);
        hasher.update(&self.counter.to_be_bytes());
        let tx = TxHash(*hasher.finalize().as_bytes());
        self.transactions.insert(tx, status);
        tx
    }
}

fn decode_value(bytes: &[u8]) -> Result<ClearValue> {
    let bytes: [u8; 8] = bytes
        .try_into()
        .map_err(|_| GatewayError::InvalidRequest(format!("expected 8 value bytes, got {}", bytes.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

/// Ledger client over a [`DevNetwork`].
pub struct MemoryLedger {
    network: Arc<DevNetwork>,
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn read_fields(&self, identity: &Identity) -> Result<LedgerFields> {
        let mut state = self.network.lock();
        state.take_failure()?;
        let deployment = state.deployment(identity)?;

        Ok(LedgerFields {
            own: deployment
                .entries
                .get(&identity.account)
                .copied()
                .unwrap_or(Handle::ZERO),
            aggregate: deployment.aggregate,
            entry_count: deployment.entry_count,
            authority: deployment.authority,
        })
    }

    async fn read_value_of(&self, identity: &Identity, owner: &Address) -> Result<Handle> {
        let mut state = self.network.lock();
        state.take_failure()?;
        let deployment = state.deployment(identity)?;
        Ok(deployment.entries.get(owner).copied().unwrap_or(Handle::ZERO))
    }

    async fn submit_encrypted_value(&self, identity: &Identity, input: EncryptedInput) -> Result<TxHash> {
        let expected = self
            .network
            .proof(&identity.resource, &identity.account, &input.ciphertext);
        if expected != input.proof {
            return Err(GatewayError::Reverted(
                "input proof does not match caller and resource".into(),
            ));
        }
        if input.ciphertext.len() < 12 {
            return Err(GatewayError::InvalidRequest("ciphertext too short".into()));
        }
        let (nonce_bytes, body) = input.ciphertext.split_at(12);
        let mut nonce = [0u8; 12];
        nonce.copy_from_slice(nonce_bytes);
        let amount = self.network.open_value(&EncryptionNonce(nonce), body)?;

        let mut state = self.network.lock();
        state.take_failure()?;

        let (previous_entry, previous_aggregate, authority, viewers) = {
            let deployment = state.deployment(identity)?;
            let viewers: Vec<Address> = deployment
                .viewers
                .iter()
                .filter(|(owner, _)| owner == &identity.account)
                .map(|(_, grantee)| *grantee)
                .collect();
            (
                deployment.entries.get(&identity.account).copied(),
                deployment.aggregate,
                deployment.authority,
                viewers,
            )
        };

        let current = |handle: Option<Handle>| -> Result<ClearValue> {
            match handle.filter(|h| !h.is_zero()) {
                Some(h) => {
                    let stored = state.values.get(&h).ok_or(GatewayError::UnknownHandle(h))?;
                    self.network.open_value(&stored.nonce, &stored.ciphertext)
                }
                None => Ok(0),
            }
        };
        let entry_value = current(previous_entry)?
            .checked_add(amount)
            .ok_or_else(|| GatewayError::Reverted("entry overflow".into()))?;
        let aggregate_value = current(Some(previous_aggregate))?
            .checked_add(amount)
            .ok_or_else(|| GatewayError::Reverted("aggregate overflow".into()))?;

        let (entry_nonce, entry_ciphertext) = self.network.seal_value(entry_value)?;
        let (aggregate_nonce, aggregate_ciphertext) = self.network.seal_value(aggregate_value)?;

        let entry_handle = state.next_handle(identity);
        let aggregate_handle = state.next_handle(identity);

        let mut entry_readers: HashSet<Address> = viewers.into_iter().collect();
        entry_readers.insert(identity.account);
        state.values.insert(
            entry_handle,
            StoredValue {
                chain_id: identity.chain_id,
                resource: identity.resource,
                nonce: entry_nonce,
                ciphertext: entry_ciphertext,
                readers: entry_readers,
            },
        );
        state.values.insert(
            aggregate_handle,
            StoredValue {
                chain_id: identity.chain_id,
                resource: identity.resource,
                nonce: aggregate_nonce,
                ciphertext: aggregate_ciphertext,
                readers: HashSet::from([authority]),
            },
        );

        let deployment = state.deployment_mut(identity)?;
        if previous_entry.is_none() {
            deployment.entry_count += 1;
        }
        deployment.entries.insert(identity.account, entry_handle);
        deployment.aggregate = aggregate_handle;

        let tx = state.record_transaction(TxStatus::Confirmed);
        tracing::debug!(account = %identity.account, %entry_handle, %tx, "accepted encrypted value");
        Ok(tx)
    }

    async fn grant_access(&self, identity: &Identity, grantee: &Address) -> Result<TxHash> {
        if grantee.is_zero() {
            return Err(GatewayError::Reverted("cannot grant access to the zero address".into()));
        }

        let mut state = self.network.lock();
        state.take_failure()?;

        let deployment = state.deployment_mut(identity)?;
        deployment.viewers.insert((identity.account, *grantee));
        let entry = deployment.entries.get(&identity.account).copied();

        if let Some(stored) = entry.and_then(|h| state.values.get_mut(&h)) {
            stored.readers.insert(*grantee);
        }

        let tx = state.record_transaction(TxStatus::Confirmed);
        tracing::debug!(owner = %identity.account, %grantee, %tx, "granted access");
        Ok(tx)
    }

    async fn check_access(&self, identity: &Identity, owner: &Address, grantee: &Address) -> Result<bool> {
        let mut state = self.network.lock();
        state.take_failure()?;
        let deployment = state.deployment(identity)?;
        Ok(owner == grantee || deployment.viewers.contains(&(*owner, *grantee)))
    }

    async fn await_confirmation(&self, tx: &TxHash) -> Result<TxStatus> {
        let mut state = self.network.lock();
        state.take_failure()?;
        state
            .transactions
            .get(tx)
            .copied()
            .ok_or(GatewayError::UnknownTransaction(*tx))
    }
}

/// Decryption engine client over a [`DevNetwork`].
pub struct MemoryEngine {
    network: Arc<DevNetwork>,
}

#[async_trait]
impl ConfidentialEngine for MemoryEngine {
    fn is_ready(&self) -> bool {
        self.network.ready.load(Ordering::SeqCst)
    }

    async fn encrypt(&self, resource: &Address, account: &Address, value: ClearValue) -> Result<EncryptedInput> {
        self.network.lock().take_failure()?;

        let (nonce, body) = self.network.seal_value(value)?;
        let mut ciphertext = nonce.0.to_vec();
        ciphertext.extend_from_slice(&body);
        let proof = self.network.proof(resource, account, &ciphertext);
        Ok(EncryptedInput { ciphertext, proof })
    }

    async fn decrypt(
        &self,
        requests: &[DecryptRequest],
        grant: &AuthorizationGrant,
    ) -> Result<HashMap<Handle, ClearValue>> {
        if !grant.verify() {
            return Err(GatewayError::AccessDenied("grant signature does not verify".into()));
        }
        let now = self.network.clock.now();
        let holder = grant.holder();

        let mut sealed = Vec::with_capacity(requests.len());
        {
            let mut state = self.network.lock();
            state.take_failure()?;

            for request in requests {
                if request.handle.is_zero() {
                    return Err(GatewayError::InvalidRequest("cannot decrypt the zero handle".into()));
                }
                if !grant.authorizes(&holder, &request.resource, now) {
                    return Err(GatewayError::AccessDenied(format!(
                        "grant does not authorize {} for {}",
                        holder, request.resource
                    )));
                }
                let stored = state
                    .values
                    .get(&request.handle)
                    .ok_or(GatewayError::UnknownHandle(request.handle))?;
                if stored.resource != request.resource || stored.chain_id != grant.chain_id() {
                    return Err(GatewayError::InvalidRequest(format!(
                        "handle {} does not belong to {}",
                        request.handle, request.resource
                    )));
                }
                if !stored.readers.contains(&holder) {
                    return Err(GatewayError::AccessDenied(format!(
                        "{holder} may not read handle {}",
                        request.handle
                    )));
                }
                let value = self.network.open_value(&stored.nonce, &stored.ciphertext)?;
                sealed.push((
                    request.handle,
                    SealedValue::seal(&grant.session().public_key(), &value.to_be_bytes())?,
                ));
            }
        }

        sealed
            .into_iter()
            .map(|(handle, sealed)| {
                let plaintext = grant.session().open(&sealed)?;
                Ok((handle, decode_value(&plaintext)?))
            })
            .collect()
    }
}

/// A wallet holding one keypair at a time.
pub struct MemoryWallet {
    inner: Mutex<WalletInner>,
    state: watch::Sender<Option<WalletState>>,
    prompts: AtomicUsize,
}

struct WalletInner {
    keypair: Keypair,
    chain_id: ChainId,
    connected: bool,
    rejecting: bool,
}

impl MemoryWallet {
    /// A wallet connected to `chain_id` with `keypair`'s account.
    pub fn new(keypair: Keypair, chain_id: ChainId) -> Self {
        let state = WalletState {
            chain_id,
            account: keypair.address(),
        };
        let (sender, _) = watch::channel(Some(state));
        Self {
            inner: Mutex::new(WalletInner {
                keypair,
                chain_id,
                connected: true,
                rejecting: false,
            }),
            state: sender,
            prompts: AtomicUsize::new(0),
        }
    }

    /// Switch to another account.
    pub fn switch_account(&self, keypair: Keypair) {
        let mut inner = self.lock();
        inner.keypair = keypair;
        self.publish(&inner);
    }

    /// Switch to another chain.
    pub fn switch_chain(&self, chain_id: ChainId) {
        let mut inner = self.lock();
        inner.chain_id = chain_id;
        self.publish(&inner);
    }

    /// Disconnect from the dapp.
    pub fn disconnect(&self) {
        let mut inner = self.lock();
        inner.connected = false;
        self.publish(&inner);
    }

    /// Reconnect with the current account and chain.
    pub fn connect(&self) {
        let mut inner = self.lock();
        inner.connected = true;
        self.publish(&inner);
    }

    /// Make the user decline (or accept) subsequent prompts.
    pub fn set_rejecting(&self, rejecting: bool) {
        self.lock().rejecting = rejecting;
    }

    /// Number of signing prompts shown so far.
    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, WalletInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, inner: &WalletInner) {
        let state = inner.connected.then(|| WalletState {
            chain_id: inner.chain_id,
            account: inner.keypair.address(),
        });
        self.state.send_replace(state);
    }
}

#[async_trait]
impl AuthorizationSigner for MemoryWallet {
    async fn sign(&self, message: &[u8]) -> std::result::Result<WalletSignature, SigningFailure> {
        let keypair = {
            let inner = self.lock();
            if !inner.connected {
                return Err(SigningFailure::Unavailable("wallet disconnected".into()));
            }
            self.prompts.fetch_add(1, Ordering::SeqCst);
            if inner.rejecting {
                return Err(SigningFailure::Rejected);
            }
            inner.keypair.clone()
        };

        Ok(WalletSignature {
            public_key: keypair.public_key(),
            signature: keypair.sign(message).0.to_vec(),
        })
    }
}

impl Wallet for MemoryWallet {
    fn current(&self) -> Option<WalletState> {
        *self.state.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<Option<WalletState>> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payveil_grants::{GrantConfig, ManualClock, SignatureManager};
    use payveil_store::MemoryGrantStore;

    const CHAIN: ChainId = ChainId(31337);

    struct Fixture {
        network: Arc<DevNetwork>,
        clock: Arc<ManualClock>,
        ledger: MemoryLedger,
        engine: MemoryEngine,
        authority: Keypair,
        resource: Address,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let network = DevNetwork::with_clock(clock.clone());
        let authority = Keypair::from_seed(&[1; 32]);
        let resource = network.deploy(CHAIN, authority.address());
        Fixture {
            ledger: network.ledger(),
            engine: network.engine(),
            network,
            clock,
            authority,
            resource,
        }
    }

    impl Fixture {
        fn identity(&self, keypair: &Keypair) -> Identity {
            Identity::new(CHAIN, keypair.address(), self.resource)
        }

        async fn submit(&self, keypair: &Keypair, value: ClearValue) -> TxHash {
            let identity = self.identity(keypair);
            let input = self
                .engine
                .encrypt(&self.resource, &keypair.address(), value)
                .await
                .unwrap();
            self.ledger.submit_encrypted_value(&identity, input).await.unwrap()
        }

        async fn grant(&self, keypair: &Keypair) -> AuthorizationGrant {
            let wallet = Arc::new(MemoryWallet::new(keypair.clone(), CHAIN));
            let manager = SignatureManager::with_clock(
                Arc::new(MemoryGrantStore::new()),
                wallet,
                self.clock.clone(),
                GrantConfig::default(),
            );
            manager
                .obtain_grant(&self.identity(keypair), &[self.resource])
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_submit_mints_handles_and_counts_entries() {
        let fx = fixture();
        let alice = Keypair::from_seed(&[2; 32]);
        let identity = fx.identity(&alice);

        let empty = fx.ledger.read_fields(&identity).await.unwrap();
        assert!(empty.own.is_zero());
        assert!(empty.aggregate.is_zero());
        assert_eq!(empty.entry_count, 0);
        assert_eq!(empty.authority, fx.authority.address());

        let tx = fx.submit(&alice, 100).await;
        assert_eq!(fx.ledger.await_confirmation(&tx).await.unwrap(), TxStatus::Confirmed);
        let first = fx.ledger.read_fields(&identity).await.unwrap();

        fx.submit(&alice, 50).await;
        let second = fx.ledger.read_fields(&identity).await.unwrap();

        assert!(!first.own.is_zero());
        assert_ne!(first.own, second.own);
        assert_ne!(first.aggregate, second.aggregate);
        assert_eq!(second.entry_count, 1);
    }

    #[tokio::test]
    async fn test_owner_decrypts_own_entry() {
        let fx = fixture();
        let alice = Keypair::from_seed(&[2; 32]);
        fx.submit(&alice, 100).await;
        fx.submit(&alice, 23).await;

        let fields = fx.ledger.read_fields(&fx.identity(&alice)).await.unwrap();
        let grant = fx.grant(&alice).await;
        let values = fx
            .engine
            .decrypt(
                &[DecryptRequest {
                    handle: fields.own,
                    resource: fx.resource,
                }],
                &grant,
            )
            .await
            .unwrap();

        assert_eq!(values.get(&fields.own), Some(&123));
    }

    #[tokio::test]
    async fn test_only_authority_decrypts_aggregate() {
        let fx = fixture();
        let alice = Keypair::from_seed(&[2; 32]);
        let bob = Keypair::from_seed(&[3; 32]);
        fx.submit(&alice, 100).await;
        fx.submit(&bob, 300).await;

        let fields = fx.ledger.read_fields(&fx.identity(&bob)).await.unwrap();
        assert_eq!(fields.entry_count, 2);
        let request = [DecryptRequest {
            handle: fields.aggregate,
            resource: fx.resource,
        }];

        let denied = fx.engine.decrypt(&request, &fx.grant(&bob).await).await;
        assert!(matches!(denied, Err(GatewayError::AccessDenied(_))));

        let values = fx
            .engine
            .decrypt(&request, &fx.grant(&fx.authority).await)
            .await
            .unwrap();
        assert_eq!(values[&fields.aggregate], 400);
    }

    #[tokio::test]
    async fn test_grant_access_covers_future_handles() {
        let fx = fixture();
        let alice = Keypair::from_seed(&[2; 32]);
        let bob = Keypair::from_seed(&[3; 32]);
        let alice_id = fx.identity(&alice);

        fx.submit(&alice, 10).await;
        assert!(!fx
            .ledger
            .check_access(&alice_id, &alice.address(), &bob.address())
            .await
            .unwrap());

        fx.ledger.grant_access(&alice_id, &bob.address()).await.unwrap();
        assert!(fx
            .ledger
            .check_access(&alice_id, &alice.address(), &bob.address())
            .await
            .unwrap());

        fx.submit(&alice, 5).await;
        let handle = fx
            .ledger
            .read_value_of(&fx.identity(&bob), &alice.address())
            .await
            .unwrap();
        let values = fx
            .engine
            .decrypt(
                &[DecryptRequest {
                    handle,
                    resource: fx.resource,
                }],
                &fx.grant(&bob).await,
            )
            .await
            .unwrap();
        assert_eq!(values[&handle], 15);
    }

    #[tokio::test]
    async fn test_expired_grant_refused() {
        let fx = fixture();
        let alice = Keypair::from_seed(&[2; 32]);
        fx.submit(&alice, 10).await;
        let fields = fx.ledger.read_fields(&fx.identity(&alice)).await.unwrap();
        let grant = fx.grant(&alice).await;

        fx.clock.advance(grant.duration_secs() as i64);
        let result = fx
            .engine
            .decrypt(
                &[DecryptRequest {
                    handle: fields.own,
                    resource: fx.resource,
                }],
                &grant,
            )
            .await;
        assert!(matches!(result, Err(GatewayError::AccessDenied(_))));
    }

    #[tokio::test]
    async fn test_proof_binds_account() {
        let fx = fixture();
        let alice = Keypair::from_seed(&[2; 32]);
        let mallory = Keypair::from_seed(&[4; 32]);

        let input = fx
            .engine
            .encrypt(&fx.resource, &alice.address(), 10)
            .await
            .unwrap();
        let result = fx
            .ledger
            .submit_encrypted_value(&fx.identity(&mallory), input)
            .await;
        assert!(matches!(result, Err(GatewayError::Reverted(_))));
        assert_eq!(fx.network.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_injected_failure_hits_next_call_only() {
        let fx = fixture();
        let alice = Keypair::from_seed(&[2; 32]);
        let identity = fx.identity(&alice);

        fx.network.fail_next_call("rpc timeout");
        assert!(matches!(
            fx.ledger.read_fields(&identity).await,
            Err(GatewayError::Unavailable(_))
        ));
        assert!(fx.ledger.read_fields(&identity).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_deployment() {
        let fx = fixture();
        let alice = Keypair::from_seed(&[2; 32]);
        let identity = Identity::new(ChainId(1), alice.address(), fx.resource);
        assert!(matches!(
            fx.ledger.read_fields(&identity).await,
            Err(GatewayError::NotDeployed(_))
        ));
    }

    #[tokio::test]
    async fn test_wallet_publishes_changes() {
        let alice = Keypair::from_seed(&[2; 32]);
        let bob = Keypair::from_seed(&[3; 32]);
        let wallet = MemoryWallet::new(alice.clone(), CHAIN);
        let mut changes = wallet.subscribe();

        wallet.switch_account(bob.clone());
        changes.changed().await.unwrap();
        assert_eq!(changes.borrow().unwrap().account, bob.address());

        wallet.disconnect();
        assert_eq!(wallet.current(), None);
        assert!(matches!(
            wallet.sign(b"msg").await,
            Err(SigningFailure::Unavailable(_))
        ));

        wallet.connect();
        wallet.set_rejecting(true);
        assert_eq!(wallet.sign(b"msg").await, Err(SigningFailure::Rejected));
        assert_eq!(wallet.prompts(), 1);
    }
}
