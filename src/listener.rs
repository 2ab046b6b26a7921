//! TCP listener and accept loop
//!
//! Accepts connections and spawns one session task per connection.

use std::net::{Ipv4Addr, SocketAddr};

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::AppError;
use crate::registry::spawn_registry;
use crate::session::handle_connection;

/// Bound listening socket plus the live session tasks it spawned
pub struct Listener {
    listener: TcpListener,
    dispatcher: Dispatcher,
    connections: JoinSet<()>,
}

impl Listener {
    /// Bind all interfaces on `port`. Port 0 picks an ephemeral port.
    pub async fn bind(port: u16, dispatcher: Dispatcher) -> Result<Self, AppError> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map_err(|source| AppError::Bind { port, source })?;

        Ok(Self {
            listener,
            dispatcher,
            connections: JoinSet::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        Ok(self.listener.local_addr()?)
    }

    /// Number of session tasks not yet reaped
    pub fn live_connections(&self) -> usize {
        self.connections.len()
    }

    /// Accept connections until the process is terminated.
    pub async fn run(mut self) -> Result<(), AppError> {
        info!("Waiting for new clients");

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let dispatcher = self.dispatcher.clone();

                    self.connections.spawn(async move {
                        if let Err(e) = handle_connection(stream, dispatcher).await {
                            warn!("Connection {} ended with error: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }

            self.reap_finished();
        }
    }

    fn reap_finished(&mut self) {
        while let Some(result) = self.connections.try_join_next() {
            if let Err(e) = result {
                error!("Session task failed: {}", e);
            }
        }
        debug!("Live connections: {}", self.live_connections());
    }
}

/// Start a registry, bind `port` and serve forever.
///
/// Only returns on a bind failure.
pub async fn serve(port: u16) -> Result<(), AppError> {
    let dispatcher = Dispatcher::new(spawn_registry());
    let listener = Listener::bind(port, dispatcher).await?;
    info!("Chat relay listening on {}", listener.local_addr()?);
    listener.run().await
}
