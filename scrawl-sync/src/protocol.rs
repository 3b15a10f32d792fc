//! JSON wire protocol for whiteboard synchronization.
//!
//! Every frame is one JSON object tagged by `type`:
//!
//! ```text
//! {"type":"sync",   "clientId":"…", "elements":[…]}     client ⇄ relay ⇄ clients
//! {"type":"init",   "elements":[…]}                     relay → joining client
//! {"type":"cursor", "clientId":"…", "name":"…", "x":…, "y":…}
//! ```
//!
//! Field names are camelCase on the wire. Unknown `type` tags and
//! non-conforming bodies are decode errors; receivers log and drop such
//! frames, they never abort the session.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::element::Element;

/// A single wire frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireMessage {
    /// Element batch: the sender's changed elements since its last send.
    Sync {
        #[serde(rename = "clientId")]
        client_id: Uuid,
        elements: Vec<Element>,
    },
    /// Full scene snapshot handed to a newly joined client.
    Init { elements: Vec<Element> },
    /// Ephemeral pointer position, one frame per movement.
    Cursor {
        #[serde(rename = "clientId")]
        client_id: Uuid,
        name: String,
        x: f64,
        y: f64,
    },
}

impl WireMessage {
    /// Create a sync frame carrying an element batch.
    pub fn sync(client_id: Uuid, elements: Vec<Element>) -> Self {
        Self::Sync {
            client_id,
            elements,
        }
    }

    /// Create an init snapshot frame.
    pub fn init(elements: Vec<Element>) -> Self {
        Self::Init { elements }
    }

    /// Create a cursor frame.
    pub fn cursor(client_id: Uuid, name: impl Into<String>, x: f64, y: f64) -> Self {
        Self::Cursor {
            client_id,
            name: name.into(),
            x,
            y,
        }
    }

    /// Serialize to a JSON frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Deserialize from a JSON frame.
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(|e| ProtocolError::Decode(e.to_string()))
    }

    /// Originating client, if the frame carries one (`init` does not).
    pub fn client_id(&self) -> Option<Uuid> {
        match self {
            Self::Sync { client_id, .. } | Self::Cursor { client_id, .. } => Some(*client_id),
            Self::Init { .. } => None,
        }
    }

    /// Wire tag of this frame, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sync { .. } => "sync",
            Self::Init { .. } => "init",
            Self::Cursor { .. } => "cursor",
        }
    }
}

/// Protocol errors.
#[derive(Debug, Clone)]
pub enum ProtocolError {
    Encode(String),
    Decode(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(e) => write!(f, "Encode error: {e}"),
            Self::Decode(e) => write!(f, "Decode error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}
