//! Registry actor implementation
//!
//! The single owner of the set of registered sessions. Sessions talk to it
//! through a cloneable `RegistryHandle`; every membership change and query is
//! serialized through one mpsc channel, so no locks are needed.
//!
//! The actor never performs I/O. Queries hand back cloned `Peer`s and the
//! caller does the (possibly slow) delivery outside the actor, so a stalled
//! client cannot hold up registration or deregistration of anyone else.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::error::AppError;
use crate::peer::Peer;
use crate::types::SessionId;

/// Channel buffer size for registry commands
const CHANNEL_BUFFER_SIZE: usize = 256;

/// Commands sent from sessions to the Registry actor
#[derive(Debug)]
pub enum RegistryCommand {
    /// Session finished its handshake
    Add { peer: Peer },
    /// Session closed
    Remove { id: SessionId },
    /// Resolve a direct message recipient
    FindByUsername {
        username: String,
        reply: oneshot::Sender<Option<Peer>>,
    },
    /// Point-in-time copy of the membership, in insertion order
    Snapshot { reply: oneshot::Sender<Vec<Peer>> },
}

/// The Registry actor
///
/// Peers are kept in insertion order; lookups by name return the earliest
/// registered match.
pub struct Registry {
    /// Registered peers, oldest first
    peers: Vec<Peer>,
    /// Command receiver channel
    receiver: mpsc::Receiver<RegistryCommand>,
}

impl Registry {
    /// Create a new Registry with the given command receiver
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>) -> Self {
        Self {
            peers: Vec::new(),
            receiver,
        }
    }

    /// Run the Registry event loop
    ///
    /// Continuously receives and processes commands until all handles are dropped.
    pub async fn run(mut self) {
        info!("Registry started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("Registry shutting down");
    }

    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Add { peer } => self.handle_add(peer),
            RegistryCommand::Remove { id } => self.handle_remove(id),
            RegistryCommand::FindByUsername { username, reply } => {
                let _ = reply.send(self.find_by_username(&username));
            }
            RegistryCommand::Snapshot { reply } => {
                let _ = reply.send(self.peers.clone());
            }
        }
    }

    fn handle_add(&mut self, peer: Peer) {
        debug!("Registering session {} as '{}'", peer.id, peer.username);
        self.peers.push(peer);
        debug!("Registered sessions: {}", self.peers.len());
    }

    /// Absent ids are ignored so teardown paths can remove unconditionally.
    fn handle_remove(&mut self, id: SessionId) {
        let before = self.peers.len();
        self.peers.retain(|peer| peer.id != id);

        if self.peers.len() < before {
            debug!("Removed session {}, registered sessions: {}", id, self.peers.len());
        }
    }

    fn find_by_username(&self, username: &str) -> Option<Peer> {
        self.peers
            .iter()
            .find(|peer| peer.username == username)
            .cloned()
    }
}

/// Handle for interacting with the registry actor.
///
/// Cheap to clone; one is shared by every session and the listener.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Create a handle around the actor's command sender
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Insert a registered session.
    pub async fn add(&self, peer: Peer) -> Result<(), AppError> {
        self.send(RegistryCommand::Add { peer }).await
    }

    /// Delete a session if present; a no-op otherwise.
    pub async fn remove(&self, id: SessionId) -> Result<(), AppError> {
        self.send(RegistryCommand::Remove { id }).await
    }

    /// Look up a session by username.
    ///
    /// With duplicate usernames the earliest registered session wins.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<Peer>, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::FindByUsername {
            username: username.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| AppError::RegistryClosed)
    }

    /// Copy of the current membership in insertion order.
    pub async fn snapshot(&self) -> Result<Vec<Peer>, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| AppError::RegistryClosed)
    }

    async fn send(&self, cmd: RegistryCommand) -> Result<(), AppError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| AppError::RegistryClosed)
    }
}

/// Spawn the registry actor and return a handle to it.
///
/// Must be called from within a tokio runtime.
pub fn spawn_registry() -> RegistryHandle {
    let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    tokio::spawn(Registry::new(rx).run());
    RegistryHandle::new(tx)
}
