//! Local scene store: the client's authoritative element set.
//!
//! One store per sync agent, owned by the agent task. Remote batches and
//! local edits both funnel through [`SceneStore::apply`], so nothing can
//! regress an element behind a version already accepted. Tombstones are
//! kept forever; the scene only grows, which is what makes replays and
//! duplicated frames harmless.

use std::collections::HashMap;

use crate::element::{Element, ElementId};
use crate::merge::reconcile;

/// Element id → latest accepted revision.
#[derive(Debug, Default)]
pub struct SceneStore {
    elements: HashMap<ElementId, Element>,
}

impl SceneStore {
    pub fn new() -> Self {
        Self {
            elements: HashMap::new(),
        }
    }

    /// Merge a batch of elements, returning the subset that was accepted.
    ///
    /// The returned elements are exactly the ones whose stored state
    /// changed; callers push those to the drawing surface and nothing
    /// else, so stale frames cause zero redraws.
    pub fn apply(&mut self, batch: Vec<Element>) -> Vec<Element> {
        let mut changed = Vec::new();
        for el in batch {
            if reconcile(self.elements.get(&el.id), &el).is_applied() {
                self.elements.insert(el.id.clone(), el.clone());
                changed.push(el);
            }
        }
        changed
    }

    /// Replace the whole scene with a snapshot. Join path only — a replace
    /// drops anything the snapshot does not mention.
    pub fn replace(&mut self, elements: Vec<Element>) {
        self.elements.clear();
        for el in elements {
            self.elements.insert(el.id.clone(), el);
        }
    }

    /// Clone of the current element set, unordered, tombstones included.
    pub fn all(&self) -> Vec<Element> {
        self.elements.values().cloned().collect()
    }

    /// Borrow of the underlying map for diffing.
    pub fn snapshot(&self) -> &HashMap<ElementId, Element> {
        &self.elements
    }

    pub fn get(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    /// Total elements, tombstones included.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements still visible on the surface.
    pub fn live_count(&self) -> usize {
        self.elements.values().filter(|e| !e.is_deleted).count()
    }
}
