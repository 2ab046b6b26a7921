//! Message routing
//!
//! Broadcast, direct delivery and the user listing, built on registry
//! snapshots. Delivery is best-effort: a failed write to one peer is logged
//! and skipped.

use tracing::{debug, warn};

use crate::error::{AppError, SendError};
use crate::peer::Peer;
use crate::registry::RegistryHandle;
use crate::types::SessionId;

/// Routes lines between sessions
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: RegistryHandle,
}

impl Dispatcher {
    pub fn new(registry: RegistryHandle) -> Self {
        Self { registry }
    }

    /// The registry this dispatcher routes over
    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    /// Deliver `text` to every registered session except `exclude`.
    ///
    /// Returns how many peers accepted the line.
    pub async fn broadcast(&self, text: &str, exclude: SessionId) -> Result<usize, AppError> {
        let peers = self.registry.snapshot().await?;
        let mut delivered = 0;

        for peer in peers.iter().filter(|peer| peer.id != exclude) {
            if deliver(text, peer) {
                delivered += 1;
            }
        }

        Ok(delivered)
    }

    /// Deliver `text` to exactly one session.
    pub fn send_direct(&self, text: &str, recipient: &Peer) -> bool {
        deliver(text, recipient)
    }

    /// Usernames of every registered session, in registration order.
    pub async fn list_usernames(&self) -> Result<Vec<String>, AppError> {
        let peers = self.registry.snapshot().await?;
        Ok(peers.into_iter().map(|peer| peer.username).collect())
    }
}

fn deliver(text: &str, peer: &Peer) -> bool {
    match peer.send(text) {
        Ok(()) => true,
        Err(SendError::Full) => {
            warn!("Dropped line for {} ({}): outbox full", peer.username, peer.id);
            false
        }
        Err(SendError::Closed) => {
            debug!("Dropped line for {}: session closed", peer.id);
            false
        }
    }
}
