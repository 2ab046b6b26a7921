//! Line-oriented TCP Chat Relay Library
//!
//! Clients connect over TCP, pick a username, and exchange newline-delimited
//! text messages, either broadcast to everyone or sent to one named user.
//!
//! # Protocol
//! - `Enter your username:` prompt, answered with one line
//! - `/users` lists everyone in the chat
//! - `@name text` sends `text` to `name` only
//! - `/exit` leaves after the line is relayed
//! - anything else is broadcast as `username: text`
//!
//! # Architecture
//! - `Registry` is an actor owning the set of registered sessions
//! - `Dispatcher` routes lines using registry snapshots, outside the actor
//! - Each connection runs a `Session` task plus a writer task
//! - `Listener` accepts connections and spawns sessions
//!
//! # Example
//! ```ignore
//! use chat_relay::{serve, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default();
//!     serve(config.port).await.unwrap();
//! }
//! ```

pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod listener;
pub mod peer;
pub mod registry;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use command::Command;
pub use config::ServerConfig;
pub use dispatcher::Dispatcher;
pub use error::{AppError, SendError};
pub use listener::{serve, Listener};
pub use peer::Peer;
pub use registry::{spawn_registry, Registry, RegistryCommand, RegistryHandle};
pub use session::{handle_connection, Session, SessionState};
pub use types::SessionId;
