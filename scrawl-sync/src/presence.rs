//! Ephemeral peer presence: remote cursors that fade when peers go quiet.
//!
//! Presence rides the same channel as element sync but shares none of its
//! guarantees — positions are not versioned, not merged and not stored.
//! Each cursor frame renews a per-peer deadline; a periodic sweep drops
//! peers whose deadline passed, so a crashed or departed peer disappears
//! from the overlay within seconds without any goodbye message.
//!
//! ```text
//! cursor frame ──► observe() ──► upsert peer, deadline = now + TTL
//!                                      │
//! sweep tick ───► sweep() ─────────────┴──► expired ids (overlay removal)
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

/// Default lifetime of a cursor sighting before it fades.
pub const DEFAULT_PRESENCE_TTL: Duration = Duration::from_secs(3);

/// Display name a client shows for itself; never shown for a remote peer.
pub const LOCAL_NAME_SENTINEL: &str = "me";

/// Fixed cursor palette. Peers pick deterministically by id hash, so every
/// client colors a given peer identically without any coordination.
const CURSOR_PALETTE: [&str; 10] = [
    "#e03131", "#2f9e44", "#1971c2", "#f08c00", "#6741d9", "#0c8599", "#c2255c", "#5c940d",
    "#e8590c", "#364fc7",
];

/// Stable palette pick for a client id.
pub fn palette_color(client_id: Uuid) -> &'static str {
    let idx = (client_id.as_u128() % CURSOR_PALETTE.len() as u128) as usize;
    CURSOR_PALETTE[idx]
}

/// Resolve the label to show for a cursor.
///
/// A blank name or the reserved self-placeholder falls back to a
/// synthesized `guest-` label built from the client id prefix, so remote
/// overlays never render an empty tag or somebody else's "me".
pub fn resolve_display_name(raw: Option<&str>, client_id: Uuid) -> String {
    match raw.map(str::trim) {
        Some(name) if !name.is_empty() && name != LOCAL_NAME_SENTINEL => name.to_string(),
        _ => format!("guest-{}", &client_id.to_string()[..8]),
    }
}

/// One remote peer's cursor as last seen.
#[derive(Debug, Clone)]
pub struct PeerPresence {
    pub client_id: Uuid,
    pub name: String,
    pub x: f64,
    pub y: f64,
    /// Palette entry, fixed for the peer's lifetime.
    pub color: &'static str,
    expires_at: Instant,
}

impl PeerPresence {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Tracks every remote cursor and its expiry deadline.
#[derive(Debug)]
pub struct PresenceTracker {
    ttl: Duration,
    peers: HashMap<Uuid, PeerPresence>,
}

impl PresenceTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            peers: HashMap::new(),
        }
    }

    /// Record a cursor sighting, creating the peer on first sight.
    ///
    /// Every sighting renews the expiry deadline and updates position and
    /// name; the color never changes once assigned.
    pub fn observe(&mut self, client_id: Uuid, name: &str, x: f64, y: f64) -> &PeerPresence {
        self.observe_at(client_id, name, x, y, Instant::now())
    }

    /// Deterministic variant of [`observe`](Self::observe) for tests.
    pub fn observe_at(
        &mut self,
        client_id: Uuid,
        name: &str,
        x: f64,
        y: f64,
        now: Instant,
    ) -> &PeerPresence {
        let deadline = now + self.ttl;
        let peer = self.peers.entry(client_id).or_insert_with(|| PeerPresence {
            client_id,
            name: String::new(),
            x,
            y,
            color: palette_color(client_id),
            expires_at: deadline,
        });
        peer.name = resolve_display_name(Some(name), client_id);
        peer.x = x;
        peer.y = y;
        peer.expires_at = deadline;
        peer
    }

    /// Remove peers whose deadline passed, returning their ids so the
    /// overlay can drop the cursors.
    pub fn sweep(&mut self) -> Vec<Uuid> {
        self.sweep_at(Instant::now())
    }

    /// Deterministic variant of [`sweep`](Self::sweep) for tests.
    pub fn sweep_at(&mut self, now: Instant) -> Vec<Uuid> {
        let expired: Vec<Uuid> = self
            .peers
            .iter()
            .filter(|(_, p)| p.is_expired(now))
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            self.peers.remove(id);
        }

        expired
    }

    pub fn get(&self, client_id: &Uuid) -> Option<&PeerPresence> {
        self.peers.get(client_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerPresence> {
        self.peers.values()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Drop every peer. Teardown path.
    pub fn clear(&mut self) {
        self.peers.clear();
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new(DEFAULT_PRESENCE_TTL)
    }
}
