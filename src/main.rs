//! Chat Relay - Entry Point
//!
//! Loads the port from an optional JSON config file and serves forever.

use std::env;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_relay::{serve, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    // Config path from command line, otherwise defaults
    let config = match env::args().nth(1) {
        Some(path) => ServerConfig::load(&path).inspect_err(|e| {
            error!("Unable to read config {}: {}", path, e);
        })?,
        None => ServerConfig::default(),
    };

    info!("Initializing the server on port {}", config.port);

    if let Err(e) = serve(config.port).await {
        error!("Unable to initialize the server: {}", e);
        return Err(e.into());
    }

    Ok(())
}
