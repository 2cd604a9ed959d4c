//! The signature manager: obtains grants, caching them across sessions.
//!
//! Signing is the only step that needs the user. A grant obtained once is
//! reused for every decryption of the resources it covers until it
//! expires, including after a restart when the store is persistent.
//!
//! Lookup order for `obtain_grant`:
//!
//! 1. Exact key `(chain, holder, resources)`.
//! 2. Any other valid grant of the holder whose resources are a superset.
//! 3. A new signature from the wallet.
//!
//! Concurrent callers are serialized around the wallet prompt and re-check
//! the cache once they hold the lock, so two decryptions racing for the
//! same resource produce one prompt.

use std::sync::Arc;
use std::time::Duration;

use payveil_core::{Address, AuthorizationMessage, Ed25519Signature, Identity};
use payveil_store::{GrantKey, GrantStore};
use tokio::sync::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::crypto::SessionKeypair;
use crate::error::{GrantError, Result};
use crate::grant::AuthorizationGrant;
use crate::signer::{AuthorizationSigner, SigningFailure, WalletSignature};

/// Default grant validity: 365 days.
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Settings for grant issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantConfig {
    /// How long a newly signed grant stays valid.
    pub validity: Duration,
}

impl Default for GrantConfig {
    fn default() -> Self {
        Self {
            validity: DEFAULT_VALIDITY,
        }
    }
}

/// Obtains authorization grants, prompting the wallet only on a cache miss.
pub struct SignatureManager<S: GrantStore> {
    store: Arc<S>,
    signer: Arc<dyn AuthorizationSigner>,
    clock: Arc<dyn Clock>,
    config: GrantConfig,
    prompt: Mutex<()>,
}

impl<S: GrantStore> SignatureManager<S> {
    /// Create a manager using the system clock.
    pub fn new(store: Arc<S>, signer: Arc<dyn AuthorizationSigner>, config: GrantConfig) -> Self {
        Self::with_clock(store, signer, Arc::new(SystemClock), config)
    }

    /// Create a manager with an explicit time source.
    pub fn with_clock(
        store: Arc<S>,
        signer: Arc<dyn AuthorizationSigner>,
        clock: Arc<dyn Clock>,
        config: GrantConfig,
    ) -> Self {
        Self {
            store,
            signer,
            clock,
            config,
            prompt: Mutex::new(()),
        }
    }

    /// The grant store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The time source grants are checked against.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Return a valid grant covering `resources` for the identity's account
    /// on the identity's chain, asking the wallet to sign only if no cached
    /// grant qualifies.
    pub async fn obtain_grant(
        &self,
        identity: &Identity,
        resources: &[Address],
    ) -> Result<AuthorizationGrant> {
        if resources.is_empty() {
            return Err(GrantError::InvalidRequest(
                "a grant must cover at least one resource".into(),
            ));
        }

        let key = GrantKey::new(identity.chain_id, identity.account, resources.iter().copied());

        if let Some(grant) = self.lookup(&key).await {
            tracing::debug!(holder = %key.holder, "grant cache hit");
            return Ok(grant);
        }

        let _prompt = self.prompt.lock().await;

        // Another caller may have signed while we waited.
        if let Some(grant) = self.lookup(&key).await {
            tracing::debug!(holder = %key.holder, "grant obtained by concurrent request");
            return Ok(grant);
        }

        let grant = self.request_signature(&key).await?;

        if let Err(e) = self.store.put(&grant.to_stored()).await {
            tracing::warn!(error = %e, holder = %key.holder, "failed to persist grant");
        }
        tracing::info!(
            holder = %key.holder,
            resources = key.resources.len(),
            expires_at = grant.expires_at(),
            "issued new authorization grant"
        );

        Ok(grant)
    }

    /// Remove every expired grant from the store.
    pub async fn purge_expired(&self) -> Result<usize> {
        Ok(self.store.purge_expired(self.clock.now()).await?)
    }

    async fn lookup(&self, key: &GrantKey) -> Option<AuthorizationGrant> {
        let now = self.clock.now();

        match self.store.get(key).await {
            Ok(Some(stored)) => match AuthorizationGrant::from_stored(stored) {
                Some(grant)
                    if grant.is_valid_at(now)
                        && grant.holder() == key.holder
                        && grant.covers(&key.resources) =>
                {
                    return Some(grant);
                }
                _ => self.evict(key).await,
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "grant store read failed; treating as miss");
                return None;
            }
        }

        let candidates = match self.store.list_for_holder(key.chain_id, &key.holder).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(error = %e, "grant store scan failed; treating as miss");
                return None;
            }
        };

        for stored in candidates {
            let stored_key = stored.key.clone();
            match AuthorizationGrant::from_stored(stored) {
                Some(grant) if grant.is_valid_at(now) && grant.holder() == key.holder => {
                    if grant.covers(&key.resources) {
                        return Some(grant);
                    }
                }
                _ => self.evict(&stored_key).await,
            }
        }

        None
    }

    async fn evict(&self, key: &GrantKey) {
        if let Err(e) = self.store.remove(key).await {
            tracing::warn!(error = %e, "failed to evict unusable grant");
        }
    }

    async fn request_signature(&self, key: &GrantKey) -> Result<AuthorizationGrant> {
        let session = SessionKeypair::generate();
        let message = AuthorizationMessage::new(
            key.chain_id,
            session.public_key(),
            key.resources.iter().copied(),
            key.holder,
            self.clock.now(),
            self.config.validity.as_secs(),
        );

        tracing::debug!(holder = %key.holder, "requesting wallet signature");
        let answer = self
            .signer
            .sign(&message.canonical_bytes())
            .await
            .map_err(|failure| match failure {
                SigningFailure::Rejected => {
                    GrantError::AuthorizationDenied("signature request rejected".into())
                }
                SigningFailure::Unavailable(reason) => GrantError::AuthorizationDenied(reason),
            })?;

        let signature = validate_signature(&message, &answer)?;
        Ok(AuthorizationGrant::from_signed(
            message,
            session,
            answer.public_key,
            signature,
        ))
    }
}

fn validate_signature(
    message: &AuthorizationMessage,
    answer: &WalletSignature,
) -> Result<Ed25519Signature> {
    let signature = Ed25519Signature::from_slice(&answer.signature)
        .map_err(|e| GrantError::AuthorizationMalformed(e.to_string()))?;

    if answer.public_key.address() != message.holder {
        return Err(GrantError::AuthorizationMalformed(format!(
            "signing key does not belong to {}",
            message.holder
        )));
    }

    answer
        .public_key
        .verify(&message.canonical_bytes(), &signature)
        .map_err(|e| GrantError::AuthorizationMalformed(e.to_string()))?;

    Ok(signature)
}
