//! Proptest generators for property-based testing.

use proptest::prelude::*;

use payveil::FieldKind;
use payveil_core::{Address, ChainId, ClearValue, Handle, Keypair};

/// Generate a random address.
pub fn address() -> impl Strategy<Value = Address> {
    any::<[u8; 20]>().prop_map(Address)
}

/// Generate a handle, the zero sentinel included now and then.
pub fn handle() -> impl Strategy<Value = Handle> {
    prop_oneof![
        1 => Just(Handle::ZERO),
        9 => nonzero_handle(),
    ]
}

/// Generate a handle that is never the zero sentinel.
pub fn nonzero_handle() -> impl Strategy<Value = Handle> {
    any::<[u8; 32]>()
        .prop_filter("zero handle", |bytes| bytes.iter().any(|b| *b != 0))
        .prop_map(Handle)
}

/// Generate a small set of distinct handles, so sequences revisit them.
pub fn handle_from_pool() -> impl Strategy<Value = Handle> {
    prop_oneof![
        Just(Handle::ZERO),
        (1u8..=4).prop_map(|n| Handle([n; 32])),
    ]
}

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a chain id.
pub fn chain_id() -> impl Strategy<Value = ChainId> {
    prop_oneof![Just(ChainId(1)), Just(ChainId(31337)), any::<u64>().prop_map(ChainId)]
}

/// Generate a positive amount.
pub fn amount() -> impl Strategy<Value = ClearValue> {
    1..=1_000_000_000u64
}

/// Generate a tracked field.
pub fn field_kind() -> impl Strategy<Value = FieldKind> {
    prop_oneof![
        Just(FieldKind::Own),
        Just(FieldKind::Aggregate),
        Just(FieldKind::Peer),
    ]
}

/// A step applied to a field tracker.
#[derive(Debug, Clone)]
pub enum FieldOp {
    /// A read returned `handle` for the field.
    Read(FieldKind, Handle),
    /// A decryption of `handle` produced `value`.
    Decrypted(FieldKind, Handle, ClearValue),
    /// The peer was cleared before a new inspection.
    ResetPeer,
}

/// Generate a field tracker operation drawing handles from a small pool.
pub fn field_op() -> impl Strategy<Value = FieldOp> {
    prop_oneof![
        4 => (field_kind(), handle_from_pool()).prop_map(|(field, handle)| FieldOp::Read(field, handle)),
        4 => (field_kind(), handle_from_pool(), any::<u64>())
            .prop_map(|(field, handle, value)| FieldOp::Decrypted(field, handle, value)),
        1 => Just(FieldOp::ResetPeer),
    ]
}

/// Generate a sequence of field tracker operations.
pub fn field_ops() -> impl Strategy<Value = Vec<FieldOp>> {
    prop::collection::vec(field_op(), 0..64)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_nonzero_handles_are_not_zero(handle in nonzero_handle()) {
            prop_assert!(!handle.is_zero());
        }

        #[test]
        fn test_keypair_address_is_stable(keypair in keypair()) {
            prop_assert_eq!(keypair.address(), keypair.public_key().address());
        }
    }
}
