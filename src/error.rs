//! Error types for the chat relay
//!
//! Defines application-level errors and peer delivery errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Every variant is fatal to whatever raised it: the whole server for
/// `Bind`/`Config`, a single session for the rest.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error on a connection or while reading config (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Listening socket could not be bound
    #[error("Failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON for `ServerConfig`
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Session's own outbound channel is closed (writer task ended)
    #[error("Channel send error")]
    ChannelSend,

    /// Registry actor has shut down
    #[error("Registry closed")]
    RegistryClosed,
}

/// Peer delivery errors
///
/// Delivery never waits, so both variants mean the line was dropped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// Peer's outbox is full because its client is not reading
    #[error("Peer outbox full")]
    Full,

    /// Peer session is tearing down
    #[error("Peer session closed")]
    Closed,
}
