//! Outbound transport seam: fire-and-forget frame delivery.
//!
//! The engine assumes an already-connected bidirectional channel. Sends
//! never wait for acknowledgment: [`Transport::try_send`] hands a fully
//! built frame to the channel and reports only whether the channel took
//! it. A refused frame is simply dropped — pending element state stays in
//! the scene store and goes out on a later encoder pass, and cursor
//! frames are superseded by the next movement anyway.
//!
//! [`ChannelTransport`] backs the in-process tests; the WebSocket adapter
//! lives in [`crate::ws`].

use tokio::sync::mpsc;

/// One-way frame sink toward the relay.
pub trait Transport: Send + Sync {
    /// Hand one frame to the channel. Returns false when the channel is
    /// closed or refuses the frame; callers drop the frame and move on.
    fn try_send(&self, frame: String) -> bool;

    /// Whether the channel still looks open.
    fn is_open(&self) -> bool;
}

/// Transport errors. Only connection establishment can fail loudly;
/// everything after that degrades to refused frames.
#[derive(Debug)]
pub enum TransportError {
    /// Establishing the connection failed.
    Connect(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "Connect error: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// In-process transport over a tokio channel.
///
/// The paired receiver plays the relay: tests read frames from it the
/// way the relay would, and feed replies through the agent's inbound
/// channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<String>,
}

impl ChannelTransport {
    /// Create a transport and the receiving end of its channel.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn try_send(&self, frame: String) -> bool {
        self.tx.try_send(frame).is_ok()
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_try_send_delivers() {
        let (transport, mut rx) = ChannelTransport::new(8);
        assert!(transport.is_open());
        assert!(transport.try_send("frame-1".into()));
        assert_eq!(rx.recv().await.unwrap(), "frame-1");
    }

    #[tokio::test]
    async fn test_closed_channel_refuses_frames() {
        let (transport, rx) = ChannelTransport::new(8);
        drop(rx);

        assert!(!transport.is_open());
        // The frame is refused, not queued; the caller drops it.
        assert!(!transport.try_send("lost".into()));
    }

    #[tokio::test]
    async fn test_full_channel_refuses_without_blocking() {
        let (transport, _rx) = ChannelTransport::new(1);
        assert!(transport.try_send("first".into()));
        // Capacity exhausted: refuse instead of waiting.
        assert!(!transport.try_send("second".into()));
        assert!(transport.is_open());
    }
}
