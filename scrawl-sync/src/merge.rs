//! Last-writer-wins merge rule.
//!
//! The relay fans frames out with no ordering or delivery guarantees, so
//! the merge must produce the same scene from any arrival order and any
//! number of duplicates. A strictly greater element version wins; equal
//! versions keep whatever arrived first. Tombstones participate like any
//! other write, which lets a deletion outrace stale re-creations.
//!
//! Reference: Kleppmann, Chapter 5 — Replication, conflict resolution

use crate::element::Element;

/// Outcome of merging one incoming element against the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The incoming element is newer and replaces the stored state.
    Applied,
    /// The incoming element is stale or a duplicate; ignored.
    Stale,
}

impl MergeOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Decide whether `incoming` supersedes `stored`.
///
/// `None` means the element is unknown locally; first sight always wins.
/// Equal versions are never overwritten, so re-delivered frames are no-ops.
pub fn reconcile(stored: Option<&Element>, incoming: &Element) -> MergeOutcome {
    match stored {
        None => MergeOutcome::Applied,
        Some(current) if incoming.version > current.version => MergeOutcome::Applied,
        Some(_) => MergeOutcome::Stale,
    }
}
