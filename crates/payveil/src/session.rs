//! The session: coordinates grant acquisition, field tracking and the
//! asynchronous operations that read and write confidential values.
//!
//! Every operation follows the same shape:
//!
//! 1. Claim the in-flight flag of its kind (a second call while it is
//!    held is a no-op).
//! 2. Snapshot the live identity and whatever handles it needs.
//! 3. Suspend on collaborators (wallet prompt, ledger, engine).
//! 4. After every suspension, compare the live state with the snapshot;
//!    on any mismatch throw the result away.
//! 5. Commit under the state lock, in the same step as the last check.
//!
//! The state lock is a plain mutex that is never held across an `.await`,
//! so each lock scope is one indivisible step no matter how operations
//! interleave.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use payveil_core::{Address, ClearValue, Handle, Identity};
use payveil_gateway::{ConfidentialEngine, DecryptRequest, Ledger, LedgerFields, TxHash, TxStatus, Wallet};
use payveil_grants::{AuthorizationSigner, Clock, SignatureManager, SystemClock};
use payveil_store::GrantStore;

use crate::config::{DeploymentRegistry, SessionConfig};
use crate::error::{Result, SessionError};
use crate::field::{FieldKind, FieldTracker};
use crate::outcome::{
    OperationKind, Outcome, PeerInspection, Rejection, StaleReason, Status, StatusKind, Unready,
};

/// The collaborators a session is wired to.
pub struct Collaborators<S, W> {
    pub ledger: Arc<dyn Ledger>,
    pub engine: Arc<dyn ConfidentialEngine>,
    pub wallet: Arc<W>,
    pub store: Arc<S>,
    pub clock: Arc<dyn Clock>,
}

impl<S, W> Collaborators<S, W> {
    /// Wire collaborators, using the system clock for grant expiry.
    pub fn new(
        ledger: Arc<dyn Ledger>,
        engine: Arc<dyn ConfidentialEngine>,
        wallet: Arc<W>,
        store: Arc<S>,
    ) -> Self {
        Self {
            ledger,
            engine,
            wallet,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// The peer last inspected and what came of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerView {
    pub address: Address,
    pub inspection: PeerInspection,
}

/// A point-in-time copy of the session for presentation code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// The live identity, if the wallet is connected to a known deployment.
    pub identity: Option<Identity>,
    /// The identity the fields were last read under.
    pub observed: Option<Identity>,
    pub fields: FieldTracker,
    pub entry_count: Option<u64>,
    pub authority: Option<Address>,
    pub average: Option<ClearValue>,
    pub peer: Option<PeerView>,
    pub in_flight: Vec<OperationKind>,
    pub status: Status,
}

#[derive(Default)]
struct SessionState {
    fields: FieldTracker,
    entry_count: Option<u64>,
    authority: Option<Address>,
    observed: Option<Identity>,
    peer: Option<PeerView>,
    in_flight: [bool; 7],
    refresh_pending: bool,
    /// Bumped on every confirmed submission.
    submissions: u64,
    status: Status,
}

fn lock_state(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds the in-flight flag of one operation kind; clears it on drop.
struct FlightGuard<'a> {
    state: &'a Mutex<SessionState>,
    kind: OperationKind,
    released: bool,
}

impl FlightGuard<'_> {
    /// Release the flag unless a refresh was requested while this one ran.
    /// Returns `true` when the caller should run again.
    fn release_or_rerun(&mut self) -> bool {
        let mut state = lock_state(self.state);
        if std::mem::take(&mut state.refresh_pending) {
            return true;
        }
        state.in_flight[self.kind.index()] = false;
        self.released = true;
        false
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let mut state = lock_state(self.state);
        state.in_flight[self.kind.index()] = false;
        if self.kind == OperationKind::Refresh {
            state.refresh_pending = false;
        }
    }
}

fn operation_for(field: FieldKind) -> OperationKind {
    match field {
        FieldKind::Own => OperationKind::DecryptOwn,
        FieldKind::Aggregate => OperationKind::DecryptAggregate,
        FieldKind::Peer => OperationKind::DecryptPeer,
    }
}

fn ignore_message(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Refresh => "Ignore refresh",
        OperationKind::Submit => "Ignore submit",
        OperationKind::DecryptOwn | OperationKind::DecryptAggregate | OperationKind::DecryptPeer => {
            "Ignore decryption"
        }
        OperationKind::GrantAccess => "Ignore grant access",
        OperationKind::InspectPeer => "Ignore peer inspection",
    }
}

/// A confidential-decryption session for one wallet.
pub struct Session<S: GrantStore, W: Wallet> {
    config: SessionConfig,
    registry: DeploymentRegistry,
    ledger: Arc<dyn Ledger>,
    engine: Arc<dyn ConfidentialEngine>,
    wallet: Arc<W>,
    grants: SignatureManager<S>,
    state: Mutex<SessionState>,
}

impl<S: GrantStore, W: Wallet + 'static> Session<S, W> {
    /// Create a session.
    pub fn new(collaborators: Collaborators<S, W>, config: SessionConfig, registry: DeploymentRegistry) -> Self {
        let Collaborators {
            ledger,
            engine,
            wallet,
            store,
            clock,
        } = collaborators;

        let signer: Arc<dyn AuthorizationSigner> = wallet.clone();
        let grants = SignatureManager::with_clock(store, signer, clock, config.grant_config());

        Self {
            config,
            registry,
            ledger,
            engine,
            wallet,
            grants,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// The grant manager backing this session.
    pub fn grants(&self) -> &SignatureManager<S> {
        &self.grants
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Read the tracked handles, entry count and authority for the live
    /// identity.
    ///
    /// A refresh requested while one is running is folded into it: the
    /// running refresh reads once more before it finishes, even when its
    /// own read failed, and the caller gets `Rejected(Busy)`.
    pub async fn refresh(&self) -> Result<Outcome<LedgerFields>> {
        let Some(mut flight) = self.begin(OperationKind::Refresh) else {
            return Ok(Outcome::Rejected(Rejection::Busy));
        };

        loop {
            let result = self.refresh_once().await;
            if !flight.release_or_rerun() {
                return result;
            }
            match &result {
                Err(e) => tracing::warn!(error = %e, "refresh failed, running the queued one"),
                Ok(_) => tracing::debug!("running coalesced refresh"),
            }
        }
    }

    async fn refresh_once(&self) -> Result<Outcome<LedgerFields>> {
        let kind = OperationKind::Refresh;
        let identity = match self.connection() {
            Ok(identity) => identity,
            Err(reason) => return Ok(self.reject(kind, Rejection::NotReady(reason))),
        };

        tracing::debug!(chain_id = %identity.chain_id, account = %identity.account, "refreshing fields");
        let fields = self
            .ledger
            .read_fields(&identity)
            .await
            .map_err(|e| self.fail(kind, "Failed to fetch data", e))?;

        let committed = {
            let mut state = self.lock();
            if !self.is_live(&identity) {
                false
            } else {
                if state.observed != Some(identity) {
                    state.fields = FieldTracker::new();
                    state.peer = None;
                    state.observed = Some(identity);
                }
                state.fields.record_handle(FieldKind::Own, fields.own);
                state.fields.record_handle(FieldKind::Aggregate, fields.aggregate);
                state.entry_count = Some(fields.entry_count);
                state.authority = Some(fields.authority);
                true
            }
        };

        if !committed {
            return Ok(self.discard(kind, StaleReason::IdentityChanged));
        }
        tracing::info!(
            chain_id = %identity.chain_id,
            account = %identity.account,
            own = %fields.own,
            aggregate = %fields.aggregate,
            entry_count = fields.entry_count,
            "fields refreshed"
        );
        Ok(Outcome::Committed(fields))
    }

    /// Encrypt `amount` and submit it for the connected account, then
    /// refresh.
    pub async fn submit_value(&self, amount: ClearValue) -> Result<Outcome<TxHash>> {
        let kind = OperationKind::Submit;
        if amount == 0 {
            return Err(self.invalid(kind, "Amount must be a positive number"));
        }

        let Some(_flight) = self.begin(kind) else {
            return Ok(self.reject(kind, Rejection::Busy));
        };
        let identity = match self.ready_identity() {
            Ok(identity) => identity,
            Err(reason) => return Ok(self.reject(kind, Rejection::NotReady(reason))),
        };

        self.set_status(StatusKind::Info, format!("Start submitting value {amount}..."));
        let input = self
            .engine
            .encrypt(&identity.resource, &identity.account, amount)
            .await
            .map_err(|e| self.fail(kind, "Submit failed", e))?;
        if !self.is_live(&identity) {
            return Ok(self.discard(kind, StaleReason::IdentityChanged));
        }

        self.set_status(StatusKind::Info, "Call submit...");
        let tx = self
            .ledger
            .submit_encrypted_value(&identity, input)
            .await
            .map_err(|e| self.fail(kind, "Submit failed", e))?;

        self.set_status(StatusKind::Info, format!("Wait for tx:{tx}..."));
        let status = self
            .ledger
            .await_confirmation(&tx)
            .await
            .map_err(|e| self.fail(kind, "Submit failed", e))?;

        if status == TxStatus::Reverted {
            return Err(self.fail(
                kind,
                "Submit failed",
                SessionError::ExternalCallFailure(format!("transaction {tx} reverted")),
            ));
        }

        let committed = {
            let mut state = self.lock();
            if self.is_live(&identity) {
                state.submissions += 1;
                true
            } else {
                false
            }
        };
        if !committed {
            return Ok(self.discard(kind, StaleReason::IdentityChanged));
        }

        self.set_status(
            StatusKind::Success,
            format!("Submit completed status={}", status.code()),
        );
        tracing::info!(%tx, account = %identity.account, "value submitted");

        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "refresh after submit failed");
        }
        Ok(Outcome::Committed(tx))
    }

    /// Decrypt the connected account's own value.
    pub async fn decrypt_own(&self) -> Result<Outcome<ClearValue>> {
        self.decrypt(FieldKind::Own).await
    }

    /// Decrypt the aggregate. Only the authority may do this.
    pub async fn decrypt_aggregate(&self) -> Result<Outcome<ClearValue>> {
        self.decrypt(FieldKind::Aggregate).await
    }

    /// Decrypt the inspected peer's value.
    pub async fn decrypt_peer(&self) -> Result<Outcome<ClearValue>> {
        self.decrypt(FieldKind::Peer).await
    }

    async fn decrypt(&self, field: FieldKind) -> Result<Outcome<ClearValue>> {
        let kind = operation_for(field);
        let Some(_flight) = self.begin(kind) else {
            return Ok(self.reject(kind, Rejection::Busy));
        };
        let identity = match self.ready_identity() {
            Ok(identity) => identity,
            Err(reason) => return Ok(self.reject(kind, Rejection::NotReady(reason))),
        };

        let precondition = {
            let state = self.lock();
            decrypt_precondition(&state, field, &identity).map(|handle| (handle, state.submissions))
        };
        let (handle, epoch) = match precondition {
            Ok(snapshot) => snapshot,
            Err(rejection) => return Ok(self.reject(kind, rejection)),
        };

        self.set_status(StatusKind::Info, format!("Start decrypting {}...", field.label()));
        let grant = self
            .grants
            .obtain_grant(&identity, &[identity.resource])
            .await
            .map_err(|e| self.fail(kind, "Unable to build decryption signature", e))?;

        let stale = self.staleness(&self.lock(), &identity, field, handle, epoch);
        if let Some(reason) = stale {
            return Ok(self.discard(kind, reason));
        }

        self.set_status(StatusKind::Info, "Call decrypt...");
        let request = DecryptRequest {
            handle,
            resource: identity.resource,
        };
        let values = self
            .engine
            .decrypt(&[request], &grant)
            .await
            .map_err(|e| self.fail(kind, "Failed to decrypt", e))?;
        let value = values.get(&handle).copied().ok_or_else(|| {
            self.fail(
                kind,
                "Failed to decrypt",
                SessionError::ExternalCallFailure(format!("engine returned no value for {handle}")),
            )
        })?;

        let committed = {
            let mut state = self.lock();
            match self.staleness(&state, &identity, field, handle, epoch) {
                Some(reason) => Err(reason),
                None => {
                    if state.fields.record_decryption(field, handle, value) {
                        Ok(())
                    } else {
                        Err(StaleReason::HandleChanged)
                    }
                }
            }
        };

        match committed {
            Ok(()) => {
                self.set_status(StatusKind::Success, format!("Decrypted: {value}"));
                tracing::info!(kind = %kind, %handle, account = %identity.account, "decryption committed");
                Ok(Outcome::Committed(value))
            }
            Err(reason) => Ok(self.discard(kind, reason)),
        }
    }

    /// Let `grantee` read the connected account's value, then refresh.
    pub async fn grant_access(&self, grantee: &str) -> Result<Outcome<TxHash>> {
        let kind = OperationKind::GrantAccess;
        let Ok(grantee) = Address::parse(grantee) else {
            return Err(self.invalid(kind, "Invalid grantee address"));
        };

        let Some(_flight) = self.begin(kind) else {
            return Ok(self.reject(kind, Rejection::Busy));
        };
        let identity = match self.connection() {
            Ok(identity) => identity,
            Err(reason) => return Ok(self.reject(kind, Rejection::NotReady(reason))),
        };

        self.set_status(StatusKind::Info, format!("Granting access to {grantee}..."));
        let tx = self
            .ledger
            .grant_access(&identity, &grantee)
            .await
            .map_err(|e| self.fail(kind, "Failed to grant access", e))?;

        self.set_status(StatusKind::Info, format!("Wait for tx:{tx}..."));
        let status = self
            .ledger
            .await_confirmation(&tx)
            .await
            .map_err(|e| self.fail(kind, "Failed to grant access", e))?;

        if status == TxStatus::Reverted {
            return Err(self.fail(
                kind,
                "Failed to grant access",
                SessionError::ExternalCallFailure(format!("transaction {tx} reverted")),
            ));
        }
        if !self.is_live(&identity) {
            return Ok(self.discard(kind, StaleReason::IdentityChanged));
        }

        self.set_status(StatusKind::Success, "Access granted successfully!");
        tracing::info!(%tx, owner = %identity.account, %grantee, "access granted");

        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "refresh after grant failed");
        }
        Ok(Outcome::Committed(tx))
    }

    /// Check whether `peer` shared their value with the connected account
    /// and, if so, fetch its handle for [`Self::decrypt_peer`].
    pub async fn inspect_peer(&self, peer: &str) -> Result<Outcome<PeerInspection>> {
        let kind = OperationKind::InspectPeer;
        let Ok(peer) = Address::parse(peer) else {
            return Err(self.invalid(kind, "Invalid peer address"));
        };

        let Some(_flight) = self.begin(kind) else {
            return Ok(self.reject(kind, Rejection::Busy));
        };
        let identity = match self.connection() {
            Ok(identity) => identity,
            Err(reason) => return Ok(self.reject(kind, Rejection::NotReady(reason))),
        };
        if peer == identity.account {
            return Err(self.invalid(kind, "Use the own-value operations for your own address"));
        }

        {
            let mut state = self.lock();
            state.fields.reset_peer();
            state.peer = None;
        }

        self.set_status(StatusKind::Info, "Checking access and fetching value...");
        let allowed = self
            .ledger
            .check_access(&identity, &peer, &identity.account)
            .await
            .map_err(|e| self.fail(kind, "Failed to inspect peer", e))?;
        if !self.is_live(&identity) {
            return Ok(self.discard(kind, StaleReason::IdentityChanged));
        }

        if !allowed {
            self.lock().peer = Some(PeerView {
                address: peer,
                inspection: PeerInspection::NoAccess,
            });
            self.set_status(StatusKind::Advisory, "You don't have access to view this peer's value");
            tracing::info!(%peer, account = %identity.account, "peer access denied");
            return Ok(Outcome::Committed(PeerInspection::NoAccess));
        }

        let handle = self
            .ledger
            .read_value_of(&identity, &peer)
            .await
            .map_err(|e| self.fail(kind, "Failed to inspect peer", e))?;

        let inspection = {
            let mut state = self.lock();
            if !self.is_live(&identity) {
                None
            } else {
                let inspection = if handle.is_zero() {
                    PeerInspection::NoValue
                } else {
                    state.fields.record_handle(FieldKind::Peer, handle);
                    PeerInspection::Ready(handle)
                };
                state.peer = Some(PeerView {
                    address: peer,
                    inspection,
                });
                Some(inspection)
            }
        };

        match inspection {
            None => Ok(self.discard(kind, StaleReason::IdentityChanged)),
            Some(PeerInspection::NoValue) => {
                self.set_status(StatusKind::Advisory, "Peer has not stored a value yet");
                Ok(Outcome::Committed(PeerInspection::NoValue))
            }
            Some(inspection) => {
                self.set_status(StatusKind::Success, "Peer value fetched. You can decrypt it now.");
                tracing::info!(%peer, %handle, "peer handle fetched");
                Ok(Outcome::Committed(inspection))
            }
        }
    }

    /// Refresh on every wallet change until the wallet goes away.
    ///
    /// Runs one refresh up front. Spawn it on a task holding an
    /// `Arc<Session>`.
    pub async fn watch_identity(&self) {
        let mut changes = self.wallet.subscribe();
        if !self.config.refresh_on_identity_change {
            return;
        }

        self.refresh_logged().await;
        while changes.changed().await.is_ok() {
            let current = *changes.borrow_and_update();
            tracing::debug!(?current, "wallet connection changed");
            self.refresh_logged().await;
        }
    }

    async fn refresh_logged(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "refresh after identity change failed");
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Readiness
    // ─────────────────────────────────────────────────────────────────────────

    pub fn can_refresh(&self) -> bool {
        self.connection().is_ok() && !self.in_flight(OperationKind::Refresh)
    }

    pub fn can_submit(&self) -> bool {
        self.ready_identity()
            .map(|identity| self.idle_and_observed(OperationKind::Submit, &identity))
            .unwrap_or(false)
    }

    /// Whether a decryption of `field` would be attempted right now.
    pub fn can_decrypt(&self, field: FieldKind) -> bool {
        let Ok(identity) = self.ready_identity() else {
            return false;
        };
        let state = self.lock();
        !state.in_flight[operation_for(field).index()]
            && decrypt_precondition(&state, field, &identity).is_ok()
    }

    pub fn can_grant(&self) -> bool {
        self.connection()
            .map(|identity| self.idle_and_observed(OperationKind::GrantAccess, &identity))
            .unwrap_or(false)
    }

    pub fn can_inspect_peer(&self) -> bool {
        self.connection()
            .map(|identity| self.idle_and_observed(OperationKind::InspectPeer, &identity))
            .unwrap_or(false)
    }

    fn idle_and_observed(&self, kind: OperationKind, identity: &Identity) -> bool {
        let state = self.lock();
        !state.in_flight[kind.index()] && state.observed == Some(*identity)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// The live identity, if the wallet is connected to a known deployment.
    pub fn identity(&self) -> Option<Identity> {
        self.connection().ok()
    }

    pub fn in_flight(&self, kind: OperationKind) -> bool {
        self.lock().in_flight[kind.index()]
    }

    pub fn status(&self) -> Status {
        self.lock().status.clone()
    }

    pub fn handle(&self, field: FieldKind) -> Option<Handle> {
        self.lock().fields.current_handle(field)
    }

    /// The clear value of `field`, only while it matches the current handle.
    pub fn clear_value(&self, field: FieldKind) -> Option<ClearValue> {
        self.lock().fields.clear_value(field)
    }

    pub fn entry_count(&self) -> Option<u64> {
        self.lock().entry_count
    }

    pub fn authority(&self) -> Option<Address> {
        self.lock().authority
    }

    /// Whether the connected account is the authority.
    pub fn is_authority(&self) -> bool {
        match (self.identity(), self.authority()) {
            (Some(identity), Some(authority)) => identity.account == authority,
            _ => false,
        }
    }

    /// `aggregate / entry_count`, derived from the decrypted aggregate.
    pub fn average(&self) -> Option<ClearValue> {
        let state = self.lock();
        state.fields.average(state.entry_count?)
    }

    pub fn peer(&self) -> Option<PeerView> {
        self.lock().peer
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let identity = self.identity();
        let state = self.lock();
        SessionSnapshot {
            identity,
            observed: state.observed,
            fields: state.fields.clone(),
            entry_count: state.entry_count,
            authority: state.authority,
            average: state.entry_count.and_then(|count| state.fields.average(count)),
            peer: state.peer,
            in_flight: OperationKind::ALL
                .into_iter()
                .filter(|kind| state.in_flight[kind.index()])
                .collect(),
            status: state.status.clone(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        lock_state(&self.state)
    }

    fn begin(&self, kind: OperationKind) -> Option<FlightGuard<'_>> {
        let mut state = self.lock();
        if state.in_flight[kind.index()] {
            if kind == OperationKind::Refresh {
                state.refresh_pending = true;
            }
            tracing::debug!(kind = %kind, "already in flight");
            return None;
        }
        state.in_flight[kind.index()] = true;
        tracing::debug!(kind = %kind, "operation started");
        Some(FlightGuard {
            state: &self.state,
            kind,
            released: false,
        })
    }

    /// The identity the wallet is connected under.
    fn connection(&self) -> std::result::Result<Identity, Unready> {
        let wallet = self.wallet.current().ok_or(Unready::WalletDisconnected)?;
        let resource = self
            .registry
            .resolve(wallet.chain_id)
            .ok_or(Unready::NotDeployed(wallet.chain_id))?;
        Ok(Identity::new(wallet.chain_id, wallet.account, resource))
    }

    /// As [`Self::connection`], also requiring the engine.
    fn ready_identity(&self) -> std::result::Result<Identity, Unready> {
        let identity = self.connection()?;
        if !self.engine.is_ready() {
            return Err(Unready::EngineNotReady);
        }
        Ok(identity)
    }

    fn is_live(&self, identity: &Identity) -> bool {
        self.connection().ok().as_ref() == Some(identity)
    }

    fn staleness(
        &self,
        state: &SessionState,
        identity: &Identity,
        field: FieldKind,
        handle: Handle,
        epoch: u64,
    ) -> Option<StaleReason> {
        if !self.is_live(identity) || state.observed != Some(*identity) {
            return Some(StaleReason::IdentityChanged);
        }
        if state.fields.current_handle(field) != Some(handle) {
            return Some(StaleReason::HandleChanged);
        }
        if field != FieldKind::Peer && state.submissions != epoch {
            return Some(StaleReason::Superseded);
        }
        None
    }

    fn set_status(&self, kind: StatusKind, message: impl Into<String>) {
        let status = Status::new(kind, message);
        tracing::debug!(status = %status, "status");
        self.lock().status = status;
    }

    fn reject<T>(&self, kind: OperationKind, rejection: Rejection) -> Outcome<T> {
        tracing::debug!(kind = %kind, ?rejection, "operation rejected");
        let message = match rejection {
            Rejection::Busy => None,
            Rejection::NotReady(reason) => Some(reason.to_string()),
            Rejection::AlreadyDecrypted => Some("Already decrypted".to_string()),
            Rejection::NoValue => Some("Nothing to decrypt".to_string()),
            Rejection::NotAuthority => Some("Only the authority can decrypt statistics".to_string()),
            Rejection::NoAccess => Some("You don't have access to view this peer's value".to_string()),
        };
        if let Some(message) = message {
            self.set_status(StatusKind::Advisory, message);
        }
        Outcome::Rejected(rejection)
    }

    fn discard<T>(&self, kind: OperationKind, reason: StaleReason) -> Outcome<T> {
        tracing::warn!(kind = %kind, ?reason, "discarding stale result");
        self.set_status(StatusKind::Advisory, ignore_message(kind));
        Outcome::Discarded(reason)
    }

    fn fail(&self, kind: OperationKind, context: &str, err: impl Into<SessionError>) -> SessionError {
        let err = err.into();
        tracing::warn!(kind = %kind, error = %err, "operation failed");
        self.set_status(StatusKind::Error, format!("{context}: {err}"));
        err
    }

    fn invalid(&self, kind: OperationKind, message: &str) -> SessionError {
        tracing::debug!(kind = %kind, message, "invalid input");
        self.set_status(StatusKind::Error, message);
        SessionError::InvalidInput(message.to_string())
    }
}

/// Why `field` cannot be decrypted under `identity`, if it cannot.
fn decrypt_precondition(
    state: &SessionState,
    field: FieldKind,
    identity: &Identity,
) -> std::result::Result<Handle, Rejection> {
    if state.observed != Some(*identity) {
        return Err(Rejection::NotReady(Unready::NotRefreshed));
    }
    match field {
        FieldKind::Aggregate if state.authority != Some(identity.account) => {
            return Err(Rejection::NotAuthority);
        }
        FieldKind::Peer => match state.peer {
            None => return Err(Rejection::NotReady(Unready::NoPeer)),
            Some(PeerView {
                inspection: PeerInspection::NoAccess,
                ..
            }) => return Err(Rejection::NoAccess),
            Some(_) => {}
        },
        _ => {}
    }

    let handle = state.fields.current_handle(field).ok_or(Rejection::NoValue)?;
    if state.fields.is_decrypted_for(field, &handle) {
        return Err(Rejection::AlreadyDecrypted);
    }
    Ok(handle)
}
