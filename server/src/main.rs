//! Relay server entrypoint.
//!
//! Run with: cargo run --bin relay-server [listen-addr]

use edit_relay_server::RelayServer;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());

    let server = RelayServer::bind(&addr).await?;
    tracing::info!(addr = %server.local_addr()?, "relay listening");

    server.run().await?;
    Ok(())
}
