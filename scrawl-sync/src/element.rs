//! Versioned scene elements.
//!
//! Every drawable object in the shared scene carries last-writer-wins
//! metadata next to an opaque payload owned by the drawing surface:
//!
//! ```text
//! {
//!   "id": "pfE3…",          stable identity, minted once by the surface
//!   "version": 12,          bumped by the editing client on every mutation
//!   "isDeleted": false,     tombstone flag (deleted elements are kept)
//!   …payload                geometry/style fields, never interpreted here
//! }
//! ```
//!
//! The engine never looks inside the payload; it merges, stores and
//! re-broadcasts whole elements based on `(version, isDeleted)` alone.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stable element identity, minted by the drawing surface.
pub type ElementId = String;

/// One versioned element of the shared scene.
///
/// Deleted elements stay in the scene as tombstones so their version
/// keeps outranking stale re-creations from slow peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    /// Monotonically increasing per-element edit counter.
    pub version: u64,
    #[serde(rename = "isDeleted", default)]
    pub is_deleted: bool,
    /// Surface-owned fields (geometry, style), carried verbatim.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Element {
    /// Create a live element with an empty payload.
    pub fn new(id: impl Into<ElementId>, version: u64) -> Self {
        Self {
            id: id.into(),
            version,
            is_deleted: false,
            payload: Map::new(),
        }
    }

    /// Create a deletion tombstone.
    pub fn tombstone(id: impl Into<ElementId>, version: u64) -> Self {
        Self {
            id: id.into(),
            version,
            is_deleted: true,
            payload: Map::new(),
        }
    }

    /// Builder-style payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Copy of this element with the version advanced by one.
    pub fn bumped(&self) -> Self {
        let mut next = self.clone();
        next.version += 1;
        next
    }

    /// Copy of this element turned into a tombstone, version advanced.
    pub fn deleted(&self) -> Self {
        let mut next = self.bumped();
        next.is_deleted = true;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_new() {
        let el = Element::new("rect-1", 1);
        assert_eq!(el.id, "rect-1");
        assert_eq!(el.version, 1);
        assert!(!el.is_deleted);
        assert!(el.payload.is_empty());
    }

    #[test]
    fn test_tombstone() {
        let el = Element::tombstone("rect-1", 7);
        assert!(el.is_deleted);
        assert_eq!(el.version, 7);
    }

    #[test]
    fn test_bumped_and_deleted() {
        let el = Element::new("a", 3).with_field("strokeColor", "#1e1e1e");
        let edited = el.bumped();
        assert_eq!(edited.version, 4);
        assert!(!edited.is_deleted);

        let gone = el.deleted();
        assert_eq!(gone.version, 4);
        assert!(gone.is_deleted);
        // Payload survives deletion; the surface may resurrect it later
        assert_eq!(gone.payload["strokeColor"], "#1e1e1e");
    }

    #[test]
    fn test_serialize_camel_case_tombstone_flag() {
        let el = Element::tombstone("a", 2);
        let json = serde_json::to_value(&el).unwrap();
        assert_eq!(json["isDeleted"], true);
        assert!(json.get("is_deleted").is_none());
    }

    #[test]
    fn test_payload_flattens_to_top_level() {
        let el = Element::new("a", 1)
            .with_field("x", 120.5)
            .with_field("strokeColor", "#e03131");
        let json = serde_json::to_value(&el).unwrap();
        assert_eq!(json["x"], 120.5);
        assert_eq!(json["strokeColor"], "#e03131");
    }

    #[test]
    fn test_deserialize_missing_tombstone_defaults_live() {
        let el: Element = serde_json::from_str(r#"{"id":"a","version":1}"#).unwrap();
        assert!(!el.is_deleted);
    }

    #[test]
    fn test_deserialize_captures_surface_fields() {
        let raw = r#"{"id":"a","version":3,"isDeleted":false,"type":"rectangle","width":80}"#;
        let el: Element = serde_json::from_str(raw).unwrap();
        assert_eq!(el.payload["type"], "rectangle");
        assert_eq!(el.payload["width"], 80);
    }

    #[test]
    fn test_roundtrip_preserves_payload() {
        let el = Element::new("a", 9).with_field("points", serde_json::json!([[0, 0], [10, 14]]));
        let json = serde_json::to_string(&el).unwrap();
        let back: Element = serde_json::from_str(&json).unwrap();
        assert_eq!(back, el);
    }
}
