//! Seam between the sync engine and the drawing surface.
//!
//! The engine does not render and does not interpret element payloads; it
//! talks to whatever canvas hosts the drawing through [`CanvasSurface`].
//! The surface mints element ids, bumps versions on local edits and
//! redraws whatever the engine pushes at it. [`MemoryCanvas`] is a
//! thread-safe in-memory surface for tests and headless embedders.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::element::{Element, ElementId};

/// The drawing surface a sync agent keeps in step with the room.
pub trait CanvasSurface: Send + Sync {
    /// Whether the surface can exchange elements yet. Agents poll this
    /// before joining; surfaces backed by slow-starting hosts report
    /// false until their state container is live.
    fn ready(&self) -> bool {
        true
    }

    /// Current element set, tombstones included.
    fn current_elements(&self) -> Vec<Element>;

    /// Redraw the given elements. Called with exactly the subset that
    /// changed, never the whole scene.
    fn apply_elements(&self, elements: Vec<Element>);
}

/// In-memory canvas: a plain element map behind a mutex.
#[derive(Debug, Default)]
pub struct MemoryCanvas {
    elements: Mutex<HashMap<ElementId, Element>>,
}

impl MemoryCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an element on the canvas as a local edit.
    pub fn insert(&self, element: Element) {
        self.elements
            .lock()
            .unwrap()
            .insert(element.id.clone(), element);
    }

    /// Edit an element in place, bumping its version the way a real
    /// surface does. Returns false if the element is unknown.
    pub fn edit(&self, id: &str, f: impl FnOnce(&mut Element)) -> bool {
        let mut elements = self.elements.lock().unwrap();
        match elements.get_mut(id) {
            Some(el) => {
                f(el);
                el.version += 1;
                true
            }
            None => false,
        }
    }

    /// Delete an element, leaving a version-bumped tombstone.
    pub fn delete(&self, id: &str) -> bool {
        self.edit(id, |el| el.is_deleted = true)
    }

    pub fn get(&self, id: &str) -> Option<Element> {
        self.elements.lock().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.elements.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.lock().unwrap().is_empty()
    }
}

impl CanvasSurface for MemoryCanvas {
    fn current_elements(&self) -> Vec<Element> {
        self.elements.lock().unwrap().values().cloned().collect()
    }

    fn apply_elements(&self, elements: Vec<Element>) {
        let mut map = self.elements.lock().unwrap();
        for el in elements {
            map.insert(el.id.clone(), el);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let canvas = MemoryCanvas::new();
        canvas.insert(Element::new("a", 1).with_field("width", 80));

        let el = canvas.get("a").unwrap();
        assert_eq!(el.version, 1);
        assert_eq!(el.payload["width"], 80);
        assert_eq!(canvas.len(), 1);
    }

    #[test]
    fn test_edit_bumps_version() {
        let canvas = MemoryCanvas::new();
        canvas.insert(Element::new("a", 1));

        assert!(canvas.edit("a", |el| {
            el.payload.insert("x".into(), 42.into());
        }));
        let el = canvas.get("a").unwrap();
        assert_eq!(el.version, 2);
        assert_eq!(el.payload["x"], 42);

        assert!(!canvas.edit("missing", |_| {}));
    }

    #[test]
    fn test_delete_leaves_tombstone() {
        let canvas = MemoryCanvas::new();
        canvas.insert(Element::new("a", 3));

        assert!(canvas.delete("a"));
        let el = canvas.get("a").unwrap();
        assert!(el.is_deleted);
        assert_eq!(el.version, 4);
        // Tombstones stay on the canvas.
        assert_eq!(canvas.len(), 1);
    }

    #[test]
    fn test_apply_elements_overwrites() {
        let canvas = MemoryCanvas::new();
        canvas.insert(Element::new("a", 1));

        // The engine hands over already-merged state; the canvas trusts it.
        canvas.apply_elements(vec![Element::new("a", 5), Element::new("b", 1)]);
        assert_eq!(canvas.get("a").unwrap().version, 5);
        assert_eq!(canvas.len(), 2);
    }

    #[test]
    fn test_default_ready() {
        let canvas = MemoryCanvas::new();
        assert!(canvas.ready());
    }

    #[test]
    fn test_current_elements_includes_tombstones() {
        let canvas = MemoryCanvas::new();
        canvas.insert(Element::new("a", 1));
        canvas.insert(Element::new("b", 1));
        canvas.delete("b");

        let all = canvas.current_elements();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|e| e.is_deleted));
    }
}
