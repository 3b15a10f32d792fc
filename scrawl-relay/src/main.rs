//! scrawl-relay — standalone WebSocket relay for whiteboard clients.
//!
//! Fans frames out between every connected client and serves scene
//! snapshots to joiners. Bind address comes from the first argument,
//! falling back to the stock 127.0.0.1:1234.
//!
//! ```text
//! RUST_LOG=info scrawl-relay 0.0.0.0:1234
//! ```

use log::info;
use scrawl_sync::{RelayConfig, RelayServer};

#[tokio::main]
async fn main() {
    env_logger::init();

    let bind_addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| RelayConfig::default().bind_addr);

    info!("Starting scrawl relay on {bind_addr}...");

    let relay = RelayServer::new(RelayConfig {
        bind_addr,
        ..RelayConfig::default()
    });

    if let Err(e) = relay.run().await {
        log::error!("Relay failed: {e}");
        std::process::exit(1);
    }
}
