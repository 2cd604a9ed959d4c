//! Canonical encoding of the authorization message a wallet signs.
//!
//! The message is a CBOR map with small integer keys, written in key order
//! using the smallest valid integer encodings and definite lengths only
//! (RFC 8949 Core Deterministic Encoding). Covered resources are sorted and
//! deduplicated before encoding, so the same grant parameters always yield
//! the same bytes regardless of the order a caller listed them in.

use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{Address, ChainId};

/// Domain separation tag for authorization messages.
pub const AUTHORIZATION_DOMAIN: &str = "payveil-authorization-v0";

/// Map keys (integer keys encode as single bytes).
mod keys {
    pub const DOMAIN: u64 = 0;
    pub const CHAIN_ID: u64 = 1;
    pub const SESSION_KEY: u64 = 2;
    pub const RESOURCES: u64 = 3;
    pub const HOLDER: u64 = 4;
    pub const ISSUED_AT: u64 = 5;
    pub const DURATION: u64 = 6;
}

/// The message a holder signs to obtain a decryption grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationMessage {
    /// Network the grant is issued on.
    pub chain_id: ChainId,
    /// Public half of the session key the decryption engine re-encrypts to.
    pub session_public_key: [u8; 32],
    /// Resources covered by the grant (sorted, unique).
    pub resources: Vec<Address>,
    /// The account requesting decryption.
    pub holder: Address,
    /// Issuance time (Unix seconds).
    pub issued_at: i64,
    /// Validity window in seconds.
    pub duration_secs: u64,
}

impl AuthorizationMessage {
    /// Build a message, normalising the resource list.
    pub fn new(
        chain_id: ChainId,
        session_public_key: [u8; 32],
        resources: impl IntoIterator<Item = Address>,
        holder: Address,
        issued_at: i64,
        duration_secs: u64,
    ) -> Self {
        let mut resources: Vec<Address> = resources.into_iter().collect();
        resources.sort();
        resources.dedup();
        Self {
            chain_id,
            session_public_key,
            resources,
            holder,
            issued_at,
            duration_secs,
        }
    }

    /// Encode to canonical CBOR bytes. These are the bytes a wallet signs.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128 + self.resources.len() * 22);

        // Map header: 7 entries, keys already in ascending order.
        encode_uint(&mut buf, 5, 7);

        encode_uint(&mut buf, 0, keys::DOMAIN);
        encode_text(&mut buf, AUTHORIZATION_DOMAIN);

        encode_uint(&mut buf, 0, keys::CHAIN_ID);
        encode_uint(&mut buf, 0, self.chain_id.0);

        encode_uint(&mut buf, 0, keys::SESSION_KEY);
        encode_bytes(&mut buf, &self.session_public_key);

        encode_uint(&mut buf, 0, keys::RESOURCES);
        encode_uint(&mut buf, 4, self.resources.len() as u64);
        for resource in &self.resources {
            encode_bytes(&mut buf, resource.as_bytes());
        }

        encode_uint(&mut buf, 0, keys::HOLDER);
        encode_bytes(&mut buf, self.holder.as_bytes());

        encode_uint(&mut buf, 0, keys::ISSUED_AT);
        encode_int(&mut buf, self.issued_at);

        encode_uint(&mut buf, 0, keys::DURATION);
        encode_uint(&mut buf, 0, self.duration_secs);

        buf
    }

    /// Decode a message from canonical bytes.
    ///
    /// Rejects messages whose re-encoding differs from the input, so only
    /// canonical encodings are accepted.
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let value: Value =
            ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))?;

        let entries = match value {
            Value::Map(entries) => entries,
            _ => return Err(CoreError::MalformedMessage("expected map".into())),
        };

        let mut domain = None;
        let mut chain_id = None;
        let mut session_public_key = None;
        let mut resources = None;
        let mut holder = None;
        let mut issued_at = None;
        let mut duration_secs = None;

        for (key, value) in entries {
            let key = as_u64(&key)?;
            match key {
                keys::DOMAIN => domain = Some(as_text(value)?),
                keys::CHAIN_ID => chain_id = Some(ChainId(as_u64(&value)?)),
                keys::SESSION_KEY => session_public_key = Some(as_array::<32>(value)?),
                keys::RESOURCES => {
                    let items = match value {
                        Value::Array(items) => items,
                        _ => return Err(CoreError::MalformedMessage("resources".into())),
                    };
                    let parsed = items
                        .into_iter()
                        .map(|v| as_array::<20>(v).map(Address))
                        .collect::<Result<Vec<_>, _>>()?;
                    resources = Some(parsed);
                }
                keys::HOLDER => holder = Some(Address(as_array::<20>(value)?)),
                keys::ISSUED_AT => issued_at = Some(as_i64(&value)?),
                keys::DURATION => duration_secs = Some(as_u64(&value)?),
                other => {
                    return Err(CoreError::MalformedMessage(format!("unknown key {other}")));
                }
            }
        }

        if domain.as_deref() != Some(AUTHORIZATION_DOMAIN) {
            return Err(CoreError::MalformedMessage("wrong domain".into()));
        }

        let missing = |name: &str| CoreError::MalformedMessage(format!("missing {name}"));
        let message = Self {
            chain_id: chain_id.ok_or_else(|| missing("chain_id"))?,
            session_public_key: session_public_key.ok_or_else(|| missing("session key"))?,
            resources: resources.ok_or_else(|| missing("resources"))?,
            holder: holder.ok_or_else(|| missing("holder"))?,
            issued_at: issued_at.ok_or_else(|| missing("issued_at"))?,
            duration_secs: duration_secs.ok_or_else(|| missing("duration"))?,
        };

        if message.canonical_bytes() != bytes {
            return Err(CoreError::MalformedMessage("non-canonical encoding".into()));
        }

        Ok(message)
    }
}

fn as_u64(value: &Value) -> Result<u64, CoreError> {
    match value {
        Value::Integer(i) => u64::try_from(*i)
            .map_err(|_| CoreError::MalformedMessage("expected unsigned integer".into())),
        _ => Err(CoreError::MalformedMessage("expected integer".into())),
    }
}

fn as_i64(value: &Value) -> Result<i64, CoreError> {
    match value {
        Value::Integer(i) => {
            i64::try_from(*i).map_err(|_| CoreError::MalformedMessage("integer out of range".into()))
        }
        _ => Err(CoreError::MalformedMessage("expected integer".into())),
    }
}

fn as_text(value: Value) -> Result<String, CoreError> {
    match value {
        Value::Text(s) => Ok(s),
        _ => Err(CoreError::MalformedMessage("expected text".into())),
    }
}

fn as_array<const N: usize>(value: Value) -> Result<[u8; N], CoreError> {
    match value {
        Value::Bytes(b) => b
            .try_into()
            .map_err(|_| CoreError::MalformedMessage(format!("expected {N} bytes"))),
        _ => Err(CoreError::MalformedMessage("expected bytes".into())),
    }
}

/// Encode a signed integer (major types 0 and 1).
fn encode_int(buf: &mut Vec<u8>, n: i64) {
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}
