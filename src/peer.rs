//! Peer struct definition
//!
//! A registered session as seen by everyone else: its identity, username,
//! and the channel feeding its connection writer.

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::SendError;
use crate::types::SessionId;

/// Registered session handle
///
/// Cloning a `Peer` clones the channel sender, so a snapshot of peers can be
/// written to after the registry has moved on.
#[derive(Debug, Clone)]
pub struct Peer {
    /// Identity of the owning session
    pub id: SessionId,
    /// Username captured during the handshake
    pub username: String,
    /// Relay → client line channel
    sender: mpsc::Sender<String>,
}

impl Peer {
    /// Create a peer for the given session and outbound channel
    pub fn new(id: SessionId, username: String, sender: mpsc::Sender<String>) -> Self {
        Self {
            id,
            username,
            sender,
        }
    }

    /// Queue one line for this peer's connection without waiting.
    ///
    /// A peer whose client stops reading must not stall the sender, so a full
    /// outbox drops the line.
    pub fn send(&self, line: impl Into<String>) -> Result<(), SendError> {
        self.sender.try_send(line.into()).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }
}
