//! Per-field tracking of ciphertext handles and their decrypted values.
//!
//! A clear value is evidence of the current plaintext only while it is
//! tagged with the field's current handle. Recording a new handle never
//! touches the cached value; the mismatch alone marks it out of date.

use serde::{Deserialize, Serialize};

use payveil_core::{ClearValue, Handle};

/// The confidential fields a session tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// The connected account's own entry.
    Own,
    /// The aggregate over all entries.
    Aggregate,
    /// The entry of the peer currently being inspected.
    Peer,
}

impl FieldKind {
    pub const ALL: [FieldKind; 3] = [FieldKind::Own, FieldKind::Aggregate, FieldKind::Peer];

    /// Human-readable name used in status messages.
    pub fn label(&self) -> &'static str {
        match self {
            FieldKind::Own => "own value",
            FieldKind::Aggregate => "statistics",
            FieldKind::Peer => "peer value",
        }
    }
}

/// A clear value and the handle it was decrypted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decrypted {
    pub handle: Handle,
    pub value: ClearValue,
}

/// State of one confidential field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldState {
    handle: Option<Handle>,
    decrypted: Option<Decrypted>,
}

impl FieldState {
    /// The last handle read from the ledger, if a value was ever stored.
    pub fn current_handle(&self) -> Option<Handle> {
        self.handle
    }

    /// The last decryption, whether or not it is still current.
    pub fn decrypted(&self) -> Option<Decrypted> {
        self.decrypted
    }

    /// Replace the handle. The zero sentinel clears it.
    pub fn record_handle(&mut self, handle: Handle) {
        self.handle = (!handle.is_zero()).then_some(handle);
    }

    /// Whether a decrypted value is cached for `handle`.
    pub fn is_decrypted_for(&self, handle: &Handle) -> bool {
        !handle.is_zero() && matches!(self.decrypted, Some(d) if &d.handle == handle)
    }

    /// Cache a decryption of `handle`.
    ///
    /// Dropped, returning `false`, unless `handle` is still the current one.
    pub fn record_decryption(&mut self, handle: Handle, value: ClearValue) -> bool {
        if handle.is_zero() || self.handle != Some(handle) {
            return false;
        }
        self.decrypted = Some(Decrypted { handle, value });
        true
    }

    /// The clear value, only if it matches the current handle.
    pub fn clear_value(&self) -> Option<ClearValue> {
        match (self.handle, self.decrypted) {
            (Some(handle), Some(d)) if d.handle == handle => Some(d.value),
            _ => None,
        }
    }

    /// Whether the current handle still needs decrypting.
    pub fn needs_decryption(&self) -> bool {
        matches!(self.handle, Some(h) if !self.is_decrypted_for(&h))
    }
}

/// The three fields of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTracker {
    own: FieldState,
    aggregate: FieldState,
    peer: FieldState,
}

impl FieldTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(&self, kind: FieldKind) -> &FieldState {
        match kind {
            FieldKind::Own => &self.own,
            FieldKind::Aggregate => &self.aggregate,
            FieldKind::Peer => &self.peer,
        }
    }

    fn field_mut(&mut self, kind: FieldKind) -> &mut FieldState {
        match kind {
            FieldKind::Own => &mut self.own,
            FieldKind::Aggregate => &mut self.aggregate,
            FieldKind::Peer => &mut self.peer,
        }
    }

    pub fn current_handle(&self, kind: FieldKind) -> Option<Handle> {
        self.field(kind).current_handle()
    }

    /// Replace the handle of `kind`. Returns whether it changed.
    pub fn record_handle(&mut self, kind: FieldKind, handle: Handle) -> bool {
        let field = self.field_mut(kind);
        let before = field.current_handle();
        field.record_handle(handle);
        before != field.current_handle()
    }

    pub fn is_decrypted_for(&self, kind: FieldKind, handle: &Handle) -> bool {
        self.field(kind).is_decrypted_for(handle)
    }

    pub fn record_decryption(&mut self, kind: FieldKind, handle: Handle, value: ClearValue) -> bool {
        self.field_mut(kind).record_decryption(handle, value)
    }

    pub fn clear_value(&self, kind: FieldKind) -> Option<ClearValue> {
        self.field(kind).clear_value()
    }

    /// Forget the peer field entirely.
    pub fn reset_peer(&mut self) {
        self.peer = FieldState::default();
    }

    /// `aggregate / entry_count`, when the aggregate is decrypted for its
    /// current handle and there is at least one entry.
    pub fn average(&self, entry_count: u64) -> Option<ClearValue> {
        let total = self.aggregate.clear_value()?;
        total.checked_div(entry_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn handle(b: u8) -> Handle {
        Handle([b; 32])
    }

    #[test]
    fn test_decryption_tracks_handle() {
        let mut field = FieldState::default();
        field.record_handle(handle(1));
        assert!(field.needs_decryption());

        assert!(field.record_decryption(handle(1), 500));
        assert!(field.is_decrypted_for(&handle(1)));
        assert_eq!(field.clear_value(), Some(500));

        field.record_handle(handle(2));
        assert!(!field.is_decrypted_for(&handle(2)));
        assert_eq!(field.clear_value(), None);
        assert!(field.needs_decryption());
    }

    #[test]
    fn test_late_decryption_dropped() {
        let mut field = FieldState::default();
        field.record_handle(handle(1));
        field.record_handle(handle(2));

        assert!(!field.record_decryption(handle(1), 500));
        assert!(!field.is_decrypted_for(&handle(1)));
        assert!(!field.is_decrypted_for(&handle(2)));
        assert_eq!(field.decrypted(), None);
    }

    #[test]
    fn test_zero_sentinel_never_decryptable() {
        let mut field = FieldState::default();
        field.record_handle(Handle::ZERO);
        assert_eq!(field.current_handle(), None);
        assert!(!field.needs_decryption());
        assert!(!field.record_decryption(Handle::ZERO, 1));
        assert!(!field.is_decrypted_for(&Handle::ZERO));
    }

    #[test]
    fn test_same_handle_keeps_value() {
        let mut tracker = FieldTracker::new();
        assert!(tracker.record_handle(FieldKind::Own, handle(1)));
        tracker.record_decryption(FieldKind::Own, handle(1), 7);

        assert!(!tracker.record_handle(FieldKind::Own, handle(1)));
        assert_eq!(tracker.clear_value(FieldKind::Own), Some(7));
    }

    #[test]
    fn test_average_needs_current_aggregate() {
        let mut tracker = FieldTracker::new();
        tracker.record_handle(FieldKind::Aggregate, handle(3));
        assert_eq!(tracker.average(2), None);

        tracker.record_decryption(FieldKind::Aggregate, handle(3), 301);
        assert_eq!(tracker.average(2), Some(150));
        assert_eq!(tracker.average(0), None);

        tracker.record_handle(FieldKind::Aggregate, handle(4));
        assert_eq!(tracker.average(2), None);
    }

    #[test]
    fn test_reset_peer_leaves_others() {
        let mut tracker = FieldTracker::new();
        tracker.record_handle(FieldKind::Own, handle(1));
        tracker.record_handle(FieldKind::Peer, handle(2));
        tracker.record_decryption(FieldKind::Peer, handle(2), 9);

        tracker.reset_peer();
        assert_eq!(tracker.current_handle(FieldKind::Peer), None);
        assert_eq!(tracker.clear_value(FieldKind::Peer), None);
        assert_eq!(tracker.current_handle(FieldKind::Own), Some(handle(1)));
    }

    proptest! {
        #[test]
        fn test_clear_value_only_for_current_handle(
            ops in prop::collection::vec((any::<bool>(), 0u8..4, any::<u64>()), 0..40)
        ) {
            let mut field = FieldState::default();
            for (is_read, h, value) in ops {
                if is_read {
                    field.record_handle(handle(h));
                } else {
                    field.record_decryption(handle(h), value);
                }

                if let Some(value) = field.clear_value() {
                    let current = field.current_handle().unwrap();
                    prop_assert!(field.is_decrypted_for(&current));
                    prop_assert_eq!(field.decrypted().unwrap().value, value);
                }
                if let Some(d) = field.decrypted() {
                    prop_assert!(!d.handle.is_zero());
                }
            }
        }
    }
}
