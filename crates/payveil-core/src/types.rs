//! Strong type definitions for PayVeil.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A clear (decrypted) value.
pub type ClearValue = u64;

/// Network identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl ChainId {
    /// The raw numeric identifier.
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainId({})", self.0)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A 20-byte account or contract address.
///
/// Displayed and parsed as `0x`-prefixed lowercase hex. Equality is
/// byte-wise, so the case of a parsed string never matters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address (marks an undeployed resource).
    pub const ZERO: Self = Self([0u8; 20]);

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Whether this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Convert to `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex, with or without the `0x` prefix.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(digits).map_err(|e| CoreError::InvalidAddress(format!("{s}: {e}")))?;
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| CoreError::InvalidAddress(format!("{s}: expected 20 bytes, got {}", b.len())))?;
        Ok(Self(arr))
    }

    /// Whether `s` is a well-formed address.
    pub fn is_well_formed(s: &str) -> bool {
        Self::parse(s).is_ok()
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 32-byte ciphertext handle.
///
/// Opaque reference to an encrypted value held by the ledger. The zero
/// handle is the "no value ever stored" sentinel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(pub [u8; 32]);

impl Handle {
    /// The empty/zero sentinel.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether this is the zero sentinel.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Convert to `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex, with or without the `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| CoreError::InvalidHandle(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidHandle(format!("{s}: expected 32 bytes")))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", &hex::encode(self.0)[..16])
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", &hex::encode(self.0)[..16])
    }
}

impl From<[u8; 32]> for Handle {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Handle {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_with_and_without_prefix() {
        let a = Address::parse("0x00112233445566778899aabbccddeeff00112233").unwrap();
        let b = Address::parse("00112233445566778899AABBCCDDEEFF00112233").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_hex(), "0x00112233445566778899aabbccddeeff00112233");
    }

    #[test]
    fn test_address_rejects_malformed() {
        assert!(!Address::is_well_formed("0x1234"));
        assert!(!Address::is_well_formed("not an address"));
        assert!(!Address::is_well_formed("0xzz112233445566778899aabbccddeeff00112233"));
        assert!(!Address::is_well_formed(""));
    }

    #[test]
    fn test_zero_sentinels() {
        assert!(Address::ZERO.is_zero());
        assert!(Handle::ZERO.is_zero());
        assert!(!Handle::from_bytes([1; 32]).is_zero());
    }

    #[test]
    fn test_handle_display() {
        let h = Handle::from_bytes([0xab; 32]);
        assert_eq!(format!("{}", h), "0xabababababababab");
        assert!(format!("{:?}", h).starts_with("Handle("));
        assert_eq!(Handle::from_hex(&h.to_hex()).unwrap(), h);
    }
}
