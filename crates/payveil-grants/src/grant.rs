//! The authorization grant: a signed, time-bounded permission to decrypt.

use payveil_core::{
    Address, AuthorizationMessage, ChainId, Ed25519PublicKey, Ed25519Signature,
};
use payveil_store::{GrantKey, StoredGrant};

use crate::crypto::SessionKeypair;

/// A wallet-signed permission for one holder to decrypt values of a set of
/// resources, valid for a bounded window.
///
/// Grants are immutable once issued. The session keypair is the one the
/// decryption engine seals clear values to.
#[derive(Debug, Clone)]
pub struct AuthorizationGrant {
    chain_id: ChainId,
    holder: Address,
    resources: Vec<Address>,
    session: SessionKeypair,
    signer: Ed25519PublicKey,
    signature: Ed25519Signature,
    issued_at: i64,
    duration_secs: u64,
}

impl AuthorizationGrant {
    /// Assemble a grant from a signed message. Callers verify the signature
    /// before calling this.
    pub(crate) fn from_signed(
        message: AuthorizationMessage,
        session: SessionKeypair,
        signer: Ed25519PublicKey,
        signature: Ed25519Signature,
    ) -> Self {
        Self {
            chain_id: message.chain_id,
            holder: message.holder,
            resources: message.resources,
            session,
            signer,
            signature,
            issued_at: message.issued_at,
            duration_secs: message.duration_secs,
        }
    }

    /// Network the grant was issued on.
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// The account the grant belongs to.
    pub fn holder(&self) -> Address {
        self.holder
    }

    /// Covered resources, sorted and unique.
    pub fn resources(&self) -> &[Address] {
        &self.resources
    }

    /// The session keypair values are sealed to.
    pub fn session(&self) -> &SessionKeypair {
        &self.session
    }

    /// The wallet key that signed the grant.
    pub fn signer(&self) -> &Ed25519PublicKey {
        &self.signer
    }

    /// The wallet's signature over [`Self::message`].
    pub fn signature(&self) -> &Ed25519Signature {
        &self.signature
    }

    /// Issuance time (Unix seconds).
    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }

    /// Validity window in seconds.
    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    /// Unix second at which the grant stops being valid.
    pub fn expires_at(&self) -> i64 {
        self.issued_at
            .saturating_add(i64::try_from(self.duration_secs).unwrap_or(i64::MAX))
    }

    /// Whether the grant is still usable at `now`.
    pub fn is_valid_at(&self, now: i64) -> bool {
        now < self.expires_at()
    }

    /// Whether every resource in `requested` is covered.
    pub fn covers(&self, requested: &[Address]) -> bool {
        requested
            .iter()
            .all(|r| self.resources.binary_search(r).is_ok())
    }

    /// Full check a decryption engine makes before honoring a request.
    pub fn authorizes(&self, holder: &Address, resource: &Address, now: i64) -> bool {
        &self.holder == holder && self.covers(std::slice::from_ref(resource)) && self.is_valid_at(now)
    }

    /// Rebuild the message the wallet signed.
    pub fn message(&self) -> AuthorizationMessage {
        AuthorizationMessage::new(
            self.chain_id,
            self.session.public_key(),
            self.resources.iter().copied(),
            self.holder,
            self.issued_at,
            self.duration_secs,
        )
    }

    /// Check that the signature covers this grant's message and that the
    /// signing key belongs to the holder.
    pub fn verify(&self) -> bool {
        self.signer.address() == self.holder
            && self
                .signer
                .verify(&self.message().canonical_bytes(), &self.signature)
                .is_ok()
    }

    /// The cache key this grant is stored under.
    pub fn key(&self) -> GrantKey {
        GrantKey::new(self.chain_id, self.holder, self.resources.iter().copied())
    }

    /// Convert to the persisted form.
    pub fn to_stored(&self) -> StoredGrant {
        StoredGrant {
            key: self.key(),
            session_public_key: self.session.public_key(),
            session_secret_key: self.session.secret_bytes(),
            signer: self.signer,
            signature: self.signature,
            issued_at: self.issued_at,
            duration_secs: self.duration_secs,
        }
    }

    /// Restore from the persisted form.
    ///
    /// Returns `None` if the record is internally inconsistent (the secret
    /// does not match the public key, or the signature does not verify).
    pub fn from_stored(stored: StoredGrant) -> Option<Self> {
        let session = SessionKeypair::from_secret_bytes(stored.session_secret_key);
        if session.public_key() != stored.session_public_key {
            return None;
        }
        let grant = Self {
            chain_id: stored.key.chain_id,
            holder: stored.key.holder,
            resources: stored.key.resources,
            session,
            signer: stored.signer,
            signature: stored.signature,
            issued_at: stored.issued_at,
            duration_secs: stored.duration_secs,
        };
        grant.verify().then_some(grant)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use payveil_core::Keypair;
    use proptest::prelude::*;

    pub(crate) fn signed_grant(wallet: &Keypair, resources: &[Address], issued_at: i64) -> AuthorizationGrant {
        let session = SessionKeypair::generate();
        let message = AuthorizationMessage::new(
            ChainId(31337),
            session.public_key(),
            resources.iter().copied(),
            wallet.address(),
            issued_at,
            3600,
        );
        let signature = wallet.sign(&message.canonical_bytes());
        AuthorizationGrant::from_signed(message, session, wallet.public_key(), signature)
    }

    #[test]
    fn test_validity_window() {
        let wallet = Keypair::from_seed(&[7; 32]);
        let grant = signed_grant(&wallet, &[Address([1; 20])], 1000);

        assert!(grant.is_valid_at(1000));
        assert!(grant.is_valid_at(4599));
        assert!(!grant.is_valid_at(4600));
    }

    #[test]
    fn test_covers_subsets_only() {
        let wallet = Keypair::from_seed(&[7; 32]);
        let a = Address([1; 20]);
        let b = Address([2; 20]);
        let c = Address([3; 20]);
        let grant = signed_grant(&wallet, &[b, a], 0);

        assert!(grant.covers(&[a]));
        assert!(grant.covers(&[a, b]));
        assert!(!grant.covers(&[a, c]));
    }

    #[test]
    fn test_authorizes_checks_holder() {
        let wallet = Keypair::from_seed(&[7; 32]);
        let resource = Address([1; 20]);
        let grant = signed_grant(&wallet, &[resource], 0);

        assert!(grant.authorizes(&wallet.address(), &resource, 10));
        assert!(!grant.authorizes(&Address([9; 20]), &resource, 10));
        assert!(!grant.authorizes(&wallet.address(), &resource, 3600));
    }

    #[test]
    fn test_stored_roundtrip_preserves_session() {
        let wallet = Keypair::from_seed(&[7; 32]);
        let grant = signed_grant(&wallet, &[Address([1; 20])], 0);

        let restored = AuthorizationGrant::from_stored(grant.to_stored()).unwrap();
        assert_eq!(restored.session().public_key(), grant.session().public_key());
        assert_eq!(restored.key(), grant.key());
    }

    #[test]
    fn test_from_stored_rejects_tampered_record() {
        let wallet = Keypair::from_seed(&[7; 32]);
        let grant = signed_grant(&wallet, &[Address([1; 20])], 0);

        let mut stored = grant.to_stored();
        stored.duration_secs = 10 * 3600;
        assert!(AuthorizationGrant::from_stored(stored).is_none());

        let mut stored = grant.to_stored();
        stored.session_secret_key = [0x55; 32];
        assert!(AuthorizationGrant::from_stored(stored).is_none());
    }

    proptest! {
        #[test]
        fn test_covers_exactly_the_subsets(
            granted in prop::collection::vec(1u8..8, 1..6),
            requested in prop::collection::vec(1u8..8, 0..6),
        ) {
            let wallet = Keypair::from_seed(&[7; 32]);
            let granted: Vec<Address> = granted.into_iter().map(|b| Address([b; 20])).collect();
            let requested: Vec<Address> = requested.into_iter().map(|b| Address([b; 20])).collect();
            let grant = signed_grant(&wallet, &granted, 0);

            let subset = requested.iter().all(|r| granted.contains(r));
            prop_assert_eq!(grant.covers(&requested), subset);
        }
    }
}
