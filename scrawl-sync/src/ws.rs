//! WebSocket adapter: bridges a live socket to the transport seam.
//!
//! [`WsTransport::connect`] splits the socket into a writer task fed by
//! an mpsc channel and a reader task that forwards text frames to the
//! agent's inbound channel:
//!
//! ```text
//! try_send ─► out_tx ─► writer task ─► ws sink
//! agent ◄─ inbound rx ◄─ reader task ◄─ ws stream
//! ```
//!
//! Both tasks end when the socket closes; dropping the transport drains
//! the writer, which finishes with a close handshake. The shared open
//! flag flips so later `try_send` calls refuse immediately instead of
//! queueing into a dead writer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::transport::{Transport, TransportError};

/// Outbound half of a live WebSocket connection.
pub struct WsTransport {
    out_tx: mpsc::Sender<String>,
    open: Arc<AtomicBool>,
}

impl WsTransport {
    /// Connect to a relay and spawn the reader/writer tasks.
    ///
    /// Returns the transport plus the inbound frame stream to hand to a
    /// sync agent.
    pub async fn connect(url: &str) -> Result<(Self, mpsc::Receiver<String>), TransportError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        let open = Arc::new(AtomicBool::new(true));
        let (out_tx, mut out_rx) = mpsc::channel::<String>(256);
        let (in_tx, in_rx) = mpsc::channel::<String>(256);

        // Writer task: forward outgoing frames to the socket.
        let writer_open = open.clone();
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if ws_writer.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            // Sender side gone: start the closing handshake before exiting.
            let _ = ws_writer.send(Message::Close(None)).await;
            writer_open.store(false, Ordering::Relaxed);
            log::debug!("WebSocket writer stopped");
        });

        // Reader task: forward text frames to the agent.
        let reader_open = open.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if in_tx.send(text.as_str().to_owned()).await.is_err() {
                            break; // agent gone
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Err(e) => {
                        log::debug!("WebSocket read error: {e}");
                        break;
                    }
                    _ => {}
                }
            }
            reader_open.store(false, Ordering::Relaxed);
            log::debug!("WebSocket reader stopped");
        });

        Ok((Self { out_tx, open }, in_rx))
    }
}

impl Transport for WsTransport {
    fn try_send(&self, frame: String) -> bool {
        if !self.open.load(Ordering::Relaxed) {
            return false;
        }
        self.out_tx.try_send(frame).is_ok()
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed) && !self.out_tx.is_closed()
    }
}
