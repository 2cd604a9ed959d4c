//! Session key material and sealing.
//!
//! Every grant carries a fresh X25519 session keypair. The decryption
//! engine seals clear values to the session public key; only the grant
//! holder can open them. Sealing is X25519 key agreement with an ephemeral
//! key, Blake3 key derivation, then ChaCha20-Poly1305.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::error::{GrantError, Result};

const SEAL_CONTEXT: &str = "payveil-grants-v0-seal";

/// An X25519 session keypair.
#[derive(Clone)]
pub struct SessionKeypair {
    secret: StaticSecret,
}

impl SessionKeypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        Self {
            secret: StaticSecret::random_from_rng(rand::thread_rng()),
        }
    }

    /// Restore from secret bytes.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self {
            secret: StaticSecret::from(bytes),
        }
    }

    /// The secret bytes, for persistence.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// The public key.
    pub fn public_key(&self) -> [u8; 32] {
        *PublicKey::from(&self.secret).as_bytes()
    }

    /// Open a value sealed to this keypair's public key.
    pub fn open(&self, sealed: &SealedValue) -> Result<Vec<u8>> {
        let shared = self
            .secret
            .diffie_hellman(&PublicKey::from(sealed.ephemeral_public));
        let key = EncryptionKey::derive(shared.as_bytes(), &sealed.ephemeral_public);
        key.decrypt(&sealed.ciphertext, &sealed.nonce)
    }
}

impl std::fmt::Debug for SessionKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionKeypair({:02x?})", &self.public_key()[..8])
    }
}

/// A value sealed to a session public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedValue {
    /// Ephemeral X25519 public key of the sealer.
    pub ephemeral_public: [u8; 32],
    /// Nonce used for encryption.
    pub nonce: EncryptionNonce,
    /// The encrypted data (includes authentication tag).
    pub ciphertext: Vec<u8>,
}

impl SealedValue {
    /// Seal `plaintext` so only the holder of `recipient`'s secret can open it.
    pub fn seal(recipient: &[u8; 32], plaintext: &[u8]) -> Result<Self> {
        let ephemeral = EphemeralSecret::random_from_rng(rand::thread_rng());
        let ephemeral_public = *PublicKey::from(&ephemeral).as_bytes();
        let shared = ephemeral.diffie_hellman(&PublicKey::from(*recipient));
        let key = EncryptionKey::derive(shared.as_bytes(), &ephemeral_public);
        let nonce = EncryptionNonce::generate();
        let ciphertext = key.encrypt(plaintext, &nonce)?;
        Ok(Self {
            ephemeral_public,
            nonce,
            ciphertext,
        })
    }
}

/// A 256-bit symmetric encryption key for ChaCha20-Poly1305.
#[derive(Clone)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Derive a key from a shared secret and context.
    pub fn derive(shared: &[u8; 32], context: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(SEAL_CONTEXT);
        hasher.update(shared);
        hasher.update(context);
        Self(*hasher.finalize().as_bytes())
    }

    /// Encrypt data with this key.
    pub fn encrypt(&self, plaintext: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| GrantError::Crypto(e.to_string()))?;
        cipher
            .encrypt(Nonce::from_slice(&nonce.0), plaintext)
            .map_err(|e| GrantError::Crypto(e.to_string()))
    }

    /// Decrypt data with this key.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| GrantError::Crypto(e.to_string()))?;
        cipher
            .decrypt(Nonce::from_slice(&nonce.0), ciphertext)
            .map_err(|e| GrantError::Crypto(e.to_string()))
    }
}

/// A 96-bit nonce for ChaCha20-Poly1305.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionNonce(pub [u8; 12]);

impl EncryptionNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_and_open() {
        let keypair = SessionKeypair::generate();
        let sealed = SealedValue::seal(&keypair.public_key(), &42u64.to_be_bytes()).unwrap();

        let opened = keypair.open(&sealed).unwrap();
        assert_eq!(opened, 42u64.to_be_bytes());
    }

    #[test]
    fn test_other_keypair_cannot_open() {
        let holder = SessionKeypair::generate();
        let intruder = SessionKeypair::generate();
        let sealed = SealedValue::seal(&holder.public_key(), b"salary").unwrap();

        assert!(intruder.open(&sealed).is_err());
    }

    #[test]
    fn test_keypair_restores_from_secret() {
        let keypair = SessionKeypair::generate();
        let restored = SessionKeypair::from_secret_bytes(keypair.secret_bytes());
        assert_eq!(keypair.public_key(), restored.public_key());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = EncryptionKey::generate();
        let nonce = EncryptionNonce::generate();
        let mut ciphertext = key.encrypt(b"secret", &nonce).unwrap();
        ciphertext[0] ^= 0x01;
        assert!(key.decrypt(&ciphertext, &nonce).is_err());
    }
}
