//! WebSocket relay with scene-cache snapshots for joiners.
//!
//! Architecture:
//! ```text
//! Client A ──┐
//!            ├── accept ── tokio broadcast ──► every other client
//! Client B ──┤                  │
//! Client C ──┘                  └── SceneStore (passive LWW cache)
//!                                        │
//!                                        └── init snapshot on connect
//! ```
//!
//! The relay is deliberately dumb: every `sync` and `cursor` frame is
//! fanned out to all other connections byte-for-byte, in arrival order.
//! It never merges on a client's behalf — clients reconcile themselves,
//! which is what makes the relay replaceable by any text-frame
//! broadcaster.
//!
//! The one extra it carries is a passive scene cache: inbound `sync`
//! batches are folded into a [`SceneStore`] so a joiner can be served
//! the current scene immediately instead of waiting out its join
//! window. The cache is fed by the same last-writer-wins merge the
//! clients run, so a stale or duplicated batch cannot corrupt it.
//!
//! Reference: Kleppmann — Designing Data-Intensive Applications,
//! Chapter 11 (fan-out messaging)

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};

use crate::element::Element;
use crate::protocol::WireMessage;
use crate::scene::SceneStore;

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind to
    pub bind_addr: String,
    /// Fan-out channel capacity
    pub broadcast_capacity: usize,
    /// Serve an init snapshot from the scene cache on every connect
    pub serve_snapshots: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:1234".to_string(),
            broadcast_capacity: 256,
            serve_snapshots: true,
        }
    }
}

/// Relay statistics.
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    pub total_connections: u64,
    pub active_connections: u64,
    pub total_messages: u64,
    pub total_bytes: u64,
}

/// The relay server. One shared scene; every connection joins it.
pub struct RelayServer {
    config: RelayConfig,
    /// Passive scene cache, fed by inbound sync batches
    scene: Arc<RwLock<SceneStore>>,
    /// Server-wide statistics
    stats: Arc<RwLock<RelayStats>>,
    /// Fan-out channel: (origin connection, raw frame)
    frames: broadcast::Sender<(u64, Utf8Bytes)>,
    /// Connection id counter; ids tag frames so senders skip their echo
    next_conn: Arc<AtomicU64>,
}

impl RelayServer {
    /// Create a new relay with the given configuration.
    pub fn new(config: RelayConfig) -> Self {
        let (frames, _) = broadcast::channel(config.broadcast_capacity);
        Self {
            config,
            scene: Arc::new(RwLock::new(SceneStore::new())),
            stats: Arc::new(RwLock::new(RelayStats::default())),
            frames,
            next_conn: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(RelayConfig::default())
    }

    /// Start listening for WebSocket connections.
    ///
    /// This runs the relay event loop. Call from an async runtime.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        log::info!("Relay listening on {}", self.config.bind_addr);

        loop {
            let (stream, addr) = listener.accept().await?;
            log::debug!("New TCP connection from {addr}");

            let scene = self.scene.clone();
            let stats = self.stats.clone();
            let config = self.config.clone();
            let frames = self.frames.clone();
            let conn_id = self.next_conn.fetch_add(1, Ordering::SeqCst);

            tokio::spawn(async move {
                if let Err(e) =
                    Self::handle_connection(stream, addr, scene, stats, config, frames, conn_id)
                        .await
                {
                    log::error!("Connection error from {addr}: {e}");
                }
            });
        }
    }

    /// Handle a single WebSocket connection.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        scene: Arc<RwLock<SceneStore>>,
        stats: Arc<RwLock<RelayStats>>,
        config: RelayConfig,
        frames: broadcast::Sender<(u64, Utf8Bytes)>,
        conn_id: u64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        log::info!("WebSocket connection established from {addr}");

        {
            let mut s = stats.write().await;
            s.total_connections += 1;
            s.active_connections += 1;
        }

        let mut frames_rx = frames.subscribe();
        let mut alive = true;

        // Serve the join snapshot up front. An empty scene still gets
        // one, so joiners never sit out their whole join window.
        if config.serve_snapshots {
            let snapshot = { scene.read().await.all() };
            let count = snapshot.len();
            match WireMessage::init(snapshot).encode() {
                Ok(frame) => {
                    if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                        log::debug!("Connection from {addr} dropped before init");
                        alive = false;
                    } else {
                        log::debug!("Sent init snapshot with {count} elements to {addr}");
                    }
                }
                Err(e) => log::error!("Failed to encode init snapshot: {e}"),
            }
        }

        while alive {
            tokio::select! {
                // Incoming WebSocket message
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            {
                                let mut s = stats.write().await;
                                s.total_messages += 1;
                                s.total_bytes += text.len() as u64;
                            }

                            match WireMessage::decode(text.as_str()) {
                                Ok(WireMessage::Sync { elements, .. }) => {
                                    {
                                        let mut scene_w = scene.write().await;
                                        scene_w.apply(elements);
                                    }
                                    let _ = frames.send((conn_id, text));
                                }
                                Ok(WireMessage::Cursor { .. }) => {
                                    // Presence is ephemeral: fan out, never cache.
                                    let _ = frames.send((conn_id, text));
                                }
                                Ok(WireMessage::Init { .. }) => {
                                    log::debug!("Ignoring client-sent init from {addr}");
                                }
                                Err(e) => {
                                    log::warn!("Failed to decode message from {addr}: {e}");
                                }
                            }
                        }

                        Some(Ok(Message::Close(_))) | None => {
                            log::info!("Connection closed from {addr}");
                            break;
                        }

                        Some(Ok(Message::Ping(data))) => {
                            if ws_sender.send(Message::Pong(data)).await.is_err() {
                                break;
                            }
                        }

                        Some(Err(e)) => {
                            log::error!("WebSocket error from {addr}: {e}");
                            break;
                        }

                        _ => {}
                    }
                }

                // Outgoing relayed frame
                msg = frames_rx.recv() => {
                    match msg {
                        Ok((origin, frame)) => {
                            // Don't echo back to sender
                            if origin == conn_id {
                                continue;
                            }
                            if ws_sender.send(Message::Text(frame)).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            log::warn!("Connection {conn_id} lagged by {n} frames");
                        }
                        Err(_) => break,
                    }
                }
            }
        }

        {
            let mut s = stats.write().await;
            s.active_connections -= 1;
        }

        Ok(())
    }

    /// Get relay statistics.
    pub async fn stats(&self) -> RelayStats {
        self.stats.read().await.clone()
    }

    /// Get the configured bind address.
    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }

    /// Current contents of the scene cache, tombstones included.
    pub async fn cached_elements(&self) -> Vec<Element> {
        self.scene.read().await.all()
    }
}
