//! Outbound delta encoding against a send ledger.
//!
//! Rebroadcasting the whole scene on every edit is the simple strategy
//! the bandwidth budget stops affording once scenes grow. The encoder
//! keeps a per-element ledger of what this client last put on the wire
//! and emits only elements whose `(version, isDeleted)` moved past it:
//!
//! ```text
//! scene snapshot ──┐
//!                  ├── diff ──► pending batch ──► transport
//! send ledger  ────┘                  │
//!        ▲                            │ frame accepted
//!        └─────────── mark_sent ──────┘
//! ```
//!
//! The ledger advances in `mark_sent` only, after the transport accepted
//! the frame. A failed send leaves it untouched, so the next pass offers
//! the same elements again — at worst re-sent, never lost, and re-sends
//! are no-ops for the receiving side's merge.

use std::collections::HashMap;

use crate::element::{Element, ElementId};

/// What to put on the wire each pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BroadcastPolicy {
    /// Always send the full element set. Bounded only by scene size;
    /// a blunt fallback for relays that lose frames.
    FullResend,
    /// Send only elements changed since the last successful send.
    #[default]
    DeltaOnly,
}

/// Last state this client successfully sent for one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SentMark {
    version: u64,
    deleted: bool,
}

/// Computes outbound batches and tracks what already went out.
#[derive(Debug)]
pub struct DeltaEncoder {
    policy: BroadcastPolicy,
    ledger: HashMap<ElementId, SentMark>,
}

impl DeltaEncoder {
    pub fn new(policy: BroadcastPolicy) -> Self {
        Self {
            policy,
            ledger: HashMap::new(),
        }
    }

    /// Elements owed to the wire given the current scene snapshot.
    pub fn pending(&self, snapshot: &HashMap<ElementId, Element>) -> Vec<Element> {
        match self.policy {
            BroadcastPolicy::FullResend => snapshot.values().cloned().collect(),
            BroadcastPolicy::DeltaOnly => snapshot
                .values()
                .filter(|el| self.needs_send(el))
                .cloned()
                .collect(),
        }
    }

    fn needs_send(&self, el: &Element) -> bool {
        match self.ledger.get(&el.id) {
            None => true,
            Some(mark) => mark.version != el.version || mark.deleted != el.is_deleted,
        }
    }

    /// Advance the ledger for a batch the transport accepted.
    pub fn mark_sent(&mut self, batch: &[Element]) {
        for el in batch {
            self.ledger.insert(
                el.id.clone(),
                SentMark {
                    version: el.version,
                    deleted: el.is_deleted,
                },
            );
        }
    }

    /// Number of elements the ledger has seen go out.
    pub fn ledger_len(&self) -> usize {
        self.ledger.len()
    }

    pub fn policy(&self) -> BroadcastPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(elements: &[Element]) -> HashMap<ElementId, Element> {
        elements
            .iter()
            .map(|el| (el.id.clone(), el.clone()))
            .collect()
    }

    #[test]
    fn test_default_policy_is_delta_only() {
        assert_eq!(BroadcastPolicy::default(), BroadcastPolicy::DeltaOnly);
    }

    #[test]
    fn test_first_pass_sends_everything() {
        let enc = DeltaEncoder::new(BroadcastPolicy::DeltaOnly);
        let scene = snap(&[Element::new("a", 1), Element::new("b", 2)]);

        let batch = enc.pending(&scene);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_quiet_after_mark_sent() {
        let mut enc = DeltaEncoder::new(BroadcastPolicy::DeltaOnly);
        let scene = snap(&[Element::new("a", 1), Element::new("b", 2)]);

        let batch = enc.pending(&scene);
        enc.mark_sent(&batch);

        // Nothing changed since the send: the next pass owes nothing.
        assert!(enc.pending(&scene).is_empty());
        assert_eq!(enc.ledger_len(), 2);
    }

    #[test]
    fn test_only_changed_elements_resent() {
        let mut enc = DeltaEncoder::new(BroadcastPolicy::DeltaOnly);
        let a = Element::new("a", 1);
        let b = Element::new("b", 1);
        let c = Element::new("c", 1);
        let scene = snap(&[a.clone(), b.clone(), c.clone()]);
        enc.mark_sent(&enc.pending(&scene));

        let scene = snap(&[a, b.bumped(), c]);
        let batch = enc.pending(&scene);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, "b");
        assert_eq!(batch[0].version, 2);
    }

    #[test]
    fn test_tombstone_flip_counts_as_change() {
        // Surfaces are supposed to bump the version on delete, but the
        // ledger also watches the flag itself.
        let mut enc = DeltaEncoder::new(BroadcastPolicy::DeltaOnly);
        let a = Element::new("a", 3);
        enc.mark_sent(&[a.clone()]);

        let mut gone = a;
        gone.is_deleted = true;
        let scene = snap(&[gone]);

        let batch = enc.pending(&scene);
        assert_eq!(batch.len(), 1);
        assert!(batch[0].is_deleted);
    }

    #[test]
    fn test_failed_send_keeps_elements_pending() {
        let mut enc = DeltaEncoder::new(BroadcastPolicy::DeltaOnly);
        let scene = snap(&[Element::new("a", 1), Element::new("b", 1)]);

        // First batch goes out, second batch never reaches the wire:
        // the ledger is only advanced for the first.
        let batch = enc.pending(&scene);
        enc.mark_sent(&batch);

        let scene = snap(&[Element::new("a", 2), Element::new("b", 1)]);
        let lost = enc.pending(&scene);
        assert_eq!(lost.len(), 1);

        // No mark_sent — the element is still owed.
        let retry = enc.pending(&scene);
        assert_eq!(retry, lost);
    }

    #[test]
    fn test_full_resend_ignores_ledger() {
        let mut enc = DeltaEncoder::new(BroadcastPolicy::FullResend);
        let scene = snap(&[Element::new("a", 1), Element::new("b", 2)]);

        let batch = enc.pending(&scene);
        enc.mark_sent(&batch);

        // Full resend keeps emitting everything regardless.
        assert_eq!(enc.pending(&scene).len(), 2);
        assert_eq!(enc.policy(), BroadcastPolicy::FullResend);
    }

    #[test]
    fn test_remotely_learned_elements_offered_until_sent() {
        // An element first seen from a peer has no ledger entry, so it is
        // offered once; after that send it goes quiet like any other.
        let mut enc = DeltaEncoder::new(BroadcastPolicy::DeltaOnly);
        let remote = Element::new("from-peer", 7);
        let scene = snap(&[remote]);

        let batch = enc.pending(&scene);
        assert_eq!(batch.len(), 1);
        enc.mark_sent(&batch);
        assert!(enc.pending(&scene).is_empty());
    }

    #[test]
    fn test_empty_scene_owes_nothing() {
        let enc = DeltaEncoder::new(BroadcastPolicy::DeltaOnly);
        assert!(enc.pending(&HashMap::new()).is_empty());
    }
}
