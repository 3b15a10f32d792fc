//! The sync agent: one task that owns a client's whole sync state.
//!
//! ```text
//!   inbound frames      local events        timers
//!        │                   │      (send / sweep / join wait)
//!        ▼                   ▼                 ▼
//!   ┌─────────────────────────────────────────────────┐
//!   │           agent task (tokio::select!)           │
//!   │   SceneStore ── DeltaEncoder ── PresenceTracker │
//!   └──────────┬──────────────────────────┬───────────┘
//!              ▼                          ▼
//!      Transport::try_send          SyncEvent stream
//! ```
//!
//! Everything that touches the scene store or the send ledger runs on
//! this one task, so no two merges or broadcast passes ever interleave
//! for a client. The host talks to the task through a [`SyncHandle`]:
//! edit notifications and pointer positions go in, [`SyncEvent`]s come
//! out, and `shutdown` tears the task and all of its timers down.
//!
//! Local edits are throttled: `scene_changed` only marks the scene
//! dirty, and a periodic tick turns dirty into one delta frame. `flush`
//! runs the same pass immediately, which is what pointer-release uses so
//! the last stroke of a drag is never left behind.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::delta::{BroadcastPolicy, DeltaEncoder};
use crate::element::Element;
use crate::presence::{resolve_display_name, PeerPresence, PresenceTracker, DEFAULT_PRESENCE_TTL};
use crate::protocol::WireMessage;
use crate::scene::SceneStore;
use crate::surface::CanvasSurface;
use crate::transport::Transport;

/// Agent lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Not running (never started, or torn down).
    Disconnected,
    /// Waiting for a scene snapshot from the relay.
    Joining,
    /// Live: merging remote frames and broadcasting local edits.
    Synced,
}

/// Events emitted to the host application.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// The agent entered `Synced`, with or without a snapshot.
    Joined,
    /// A join snapshot replaced the scene (element count included).
    SceneReplaced(usize),
    /// A remote cursor moved; render or refresh its overlay.
    PeerCursor(PeerPresence),
    /// A peer went quiet past the presence TTL; drop its cursor.
    PeerExpired(Uuid),
}

/// Agent start-up errors.
#[derive(Debug)]
pub enum SyncError {
    /// The drawing surface never became ready within the bounded wait.
    SurfaceUnavailable { waited: Duration },
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SurfaceUnavailable { waited } => {
                write!(f, "Drawing surface not ready after {waited:?}")
            }
        }
    }
}

impl std::error::Error for SyncError {}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// This client's identity on the wire.
    pub client_id: Uuid,
    /// Display name sent with cursor frames. `None` or the reserved
    /// self-placeholder fall back to a `guest-` label.
    pub display_name: Option<String>,
    /// Outbound batch policy.
    pub policy: BroadcastPolicy,
    /// Minimum spacing between delta broadcasts.
    pub send_interval: Duration,
    /// How long a remote cursor lives without renewal.
    pub presence_ttl: Duration,
    /// How long to wait for a join snapshot before starting empty.
    pub init_wait: Duration,
    /// Poll cadence while waiting for the surface to become ready.
    pub ready_poll_interval: Duration,
    /// Give up on the surface after this long.
    pub ready_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            client_id: Uuid::new_v4(),
            display_name: None,
            policy: BroadcastPolicy::default(),
            send_interval: Duration::from_millis(100),
            presence_ttl: DEFAULT_PRESENCE_TTL,
            init_wait: Duration::from_secs(2),
            ready_poll_interval: Duration::from_millis(50),
            ready_timeout: Duration::from_secs(5),
        }
    }
}

/// Commands from the handle to the agent task.
enum LocalEvent {
    SceneChanged,
    PointerMoved { x: f64, y: f64 },
    Flush(oneshot::Sender<()>),
    Snapshot(oneshot::Sender<Vec<Element>>),
}

/// The host's grip on a running agent.
pub struct SyncHandle {
    client_id: Uuid,
    local_tx: mpsc::Sender<LocalEvent>,
    events_rx: Option<mpsc::Receiver<SyncEvent>>,
    state_rx: watch::Receiver<AgentState>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AgentState {
        *self.state_rx.borrow()
    }

    /// Tell the agent the surface mutated. Cheap and non-blocking; any
    /// number of calls collapse into the next broadcast pass.
    pub fn scene_changed(&self) {
        let _ = self.local_tx.try_send(LocalEvent::SceneChanged);
    }

    /// Broadcast the local pointer position. Not throttled here — a
    /// dropped frame is superseded by the next movement.
    pub fn pointer_moved(&self, x: f64, y: f64) {
        let _ = self.local_tx.try_send(LocalEvent::PointerMoved { x, y });
    }

    /// Run a broadcast pass right now and wait until it completed.
    /// Pointer-release calls this so the final state of a drag goes out
    /// even when the throttle window has not elapsed.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.local_tx.send(LocalEvent::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// The agent's authoritative element set, tombstones included.
    pub async fn snapshot(&self) -> Vec<Element> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .local_tx
            .send(LocalEvent::Snapshot(reply_tx))
            .await
            .is_err()
        {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }

    /// Take the event receiver (can only be called once). Events are
    /// advisory; if the host stops draining, extras are dropped.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<SyncEvent>> {
        self.events_rx.take()
    }

    /// Stop the agent: cancels every timer, detaches from the channel
    /// and publishes `Disconnected`. Safe to call at any point of the
    /// session; a fresh agent can be started afterwards.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

/// The agent task's owned state. Constructed by [`SyncAgent::start`],
/// consumed by the run loop.
pub struct SyncAgent {
    config: SyncConfig,
    transport: Arc<dyn Transport>,
    surface: Arc<dyn CanvasSurface>,
    store: SceneStore,
    encoder: DeltaEncoder,
    presence: PresenceTracker,
    state: AgentState,
    dirty: bool,
    local_name: String,
    event_tx: mpsc::Sender<SyncEvent>,
    state_tx: watch::Sender<AgentState>,
}

impl SyncAgent {
    /// Start a sync agent over an already-connected channel.
    ///
    /// Waits for the surface to report ready (bounded, fixed-cadence
    /// poll) before anything touches the wire; a surface that never
    /// comes up yields [`SyncError::SurfaceUnavailable`] instead of a
    /// hang. The returned handle is the only way to reach the agent.
    pub async fn start(
        transport: Arc<dyn Transport>,
        inbound: mpsc::Receiver<String>,
        surface: Arc<dyn CanvasSurface>,
        config: SyncConfig,
    ) -> Result<SyncHandle, SyncError> {
        wait_until_ready(surface.as_ref(), &config).await?;

        let (local_tx, local_rx) = mpsc::channel(256);
        let (event_tx, event_rx) = mpsc::channel(256);
        let (state_tx, state_rx) = watch::channel(AgentState::Joining);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let client_id = config.client_id;
        let local_name = resolve_display_name(config.display_name.as_deref(), client_id);

        let agent = SyncAgent {
            store: SceneStore::new(),
            encoder: DeltaEncoder::new(config.policy),
            presence: PresenceTracker::new(config.presence_ttl),
            state: AgentState::Joining,
            dirty: false,
            local_name,
            event_tx,
            state_tx,
            transport,
            surface,
            config,
        };
        let task = tokio::spawn(agent.run(inbound, local_rx, shutdown_rx));

        Ok(SyncHandle {
            client_id,
            local_tx,
            events_rx: Some(event_rx),
            state_rx,
            shutdown_tx,
            task,
        })
    }

    async fn run(
        mut self,
        mut inbound: mpsc::Receiver<String>,
        mut local_rx: mpsc::Receiver<LocalEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut send_tick = tokio::time::interval(self.config.send_interval);
        send_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sweep_tick = tokio::time::interval(self.config.presence_ttl / 3);
        sweep_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let join_deadline = tokio::time::sleep(self.config.init_wait);
        tokio::pin!(join_deadline);

        let mut inbound_open = true;
        log::info!("Sync agent {} joining", self.config.client_id);

        loop {
            tokio::select! {
                frame = inbound.recv(), if inbound_open => {
                    match frame {
                        Some(raw) => self.handle_frame(&raw),
                        None => {
                            log::debug!("Inbound channel closed");
                            inbound_open = false;
                        }
                    }
                }

                event = local_rx.recv() => {
                    match event {
                        Some(LocalEvent::SceneChanged) => self.dirty = true,
                        Some(LocalEvent::PointerMoved { x, y }) => self.send_cursor(x, y),
                        Some(LocalEvent::Flush(ack)) => {
                            self.broadcast_pass();
                            let _ = ack.send(());
                        }
                        Some(LocalEvent::Snapshot(reply)) => {
                            let _ = reply.send(self.store.all());
                        }
                        None => break,
                    }
                }

                _ = send_tick.tick() => {
                    if self.dirty {
                        self.broadcast_pass();
                    }
                }

                _ = sweep_tick.tick() => {
                    for id in self.presence.sweep() {
                        log::debug!("Peer {id} went quiet; dropping cursor");
                        self.emit(SyncEvent::PeerExpired(id));
                    }
                }

                _ = &mut join_deadline, if self.state == AgentState::Joining => {
                    log::info!(
                        "No snapshot within {:?}; starting with an empty scene",
                        self.config.init_wait
                    );
                    self.set_state(AgentState::Synced);
                    self.emit(SyncEvent::Joined);
                }

                _ = shutdown_rx.changed() => break,
            }
        }

        self.presence.clear();
        self.set_state(AgentState::Disconnected);
        log::info!("Sync agent {} stopped", self.config.client_id);
    }

    /// Decode and dispatch one inbound frame. Malformed frames and our
    /// own echoes are dropped without touching any state.
    fn handle_frame(&mut self, raw: &str) {
        let msg = match WireMessage::decode(raw) {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("Dropping malformed frame: {e}");
                return;
            }
        };

        log::trace!("Inbound {} frame", msg.kind());

        // The relay fans our own frames back; skip them.
        if msg.client_id() == Some(self.config.client_id) {
            return;
        }

        match msg {
            WireMessage::Sync { elements, .. } => {
                let changed = self.store.apply(elements);
                if !changed.is_empty() {
                    log::debug!("Merged {} remote elements", changed.len());
                    self.surface.apply_elements(changed);
                }
            }
            WireMessage::Init { elements } => self.handle_init(elements),
            WireMessage::Cursor {
                client_id,
                name,
                x,
                y,
            } => {
                let peer = self.presence.observe(client_id, &name, x, y).clone();
                self.emit(SyncEvent::PeerCursor(peer));
            }
        }
    }

    fn handle_init(&mut self, elements: Vec<Element>) {
        match self.state {
            AgentState::Joining => {
                let count = elements.len();
                self.store.replace(elements);
                self.surface.apply_elements(self.store.all());
                log::info!("Adopted snapshot with {count} elements");
                self.set_state(AgentState::Synced);
                self.emit(SyncEvent::Joined);
                self.emit(SyncEvent::SceneReplaced(count));
            }
            _ => {
                // A late snapshot can only add newer state; merge it like
                // a sync batch instead of rolling the scene back.
                log::debug!("Late snapshot with {} elements; merging", elements.len());
                let changed = self.store.apply(elements);
                if !changed.is_empty() {
                    self.surface.apply_elements(changed);
                }
            }
        }
    }

    /// One broadcast pass: record surface edits, diff against the send
    /// ledger, put the batch on the wire. The ledger advances only when
    /// the transport accepted the frame; otherwise the dirty flag stays
    /// set and a later tick retries from current state.
    fn broadcast_pass(&mut self) {
        let local = self.surface.current_elements();
        if !local.is_empty() {
            self.store.apply(local);
        }

        let batch = self.encoder.pending(self.store.snapshot());
        if batch.is_empty() {
            self.dirty = false;
            return;
        }

        if !self.transport.is_open() {
            log::trace!("Transport closed; {} elements stay pending", batch.len());
            return;
        }

        let frame = match WireMessage::sync(self.config.client_id, batch.clone()).encode() {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Failed to encode sync frame: {e}");
                self.dirty = false;
                return;
            }
        };

        if self.transport.try_send(frame) {
            self.encoder.mark_sent(&batch);
            self.dirty = false;
            log::debug!("Sent {} elements", batch.len());
        } else {
            log::debug!(
                "Transport refused sync frame; {} elements stay pending",
                batch.len()
            );
        }
    }

    fn send_cursor(&self, x: f64, y: f64) {
        if !self.transport.is_open() {
            return; // cursor frames are disposable
        }
        let msg = WireMessage::cursor(self.config.client_id, self.local_name.clone(), x, y);
        match msg.encode() {
            Ok(frame) => {
                if !self.transport.try_send(frame) {
                    log::trace!("Transport refused cursor frame");
                }
            }
            Err(e) => log::error!("Failed to encode cursor frame: {e}"),
        }
    }

    fn set_state(&mut self, next: AgentState) {
        if self.state != next {
            log::debug!("Agent state {:?} -> {next:?}", self.state);
            self.state = next;
            let _ = self.state_tx.send(next);
        }
    }

    fn emit(&self, event: SyncEvent) {
        if self.event_tx.try_send(event).is_err() {
            log::trace!("Event receiver full or gone; event dropped");
        }
    }
}

/// Poll the surface on a fixed cadence until it reports ready.
async fn wait_until_ready(
    surface: &dyn CanvasSurface,
    config: &SyncConfig,
) -> Result<(), SyncError> {
    let started = Instant::now();
    loop {
        if surface.ready() {
            return Ok(());
        }
        if started.elapsed() >= config.ready_timeout {
            log::warn!(
                "Drawing surface still not ready after {:?}; giving up",
                config.ready_timeout
            );
            return Err(SyncError::SurfaceUnavailable {
                waited: config.ready_timeout,
            });
        }
        tokio::time::sleep(config.ready_poll_interval).await;
    }
}
