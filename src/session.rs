//! Connection session
//!
//! Drives one client connection through its lifecycle: username handshake,
//! registration, the command read loop, and teardown.
//!
//! Each connection gets two tasks. The session task owns the read half and
//! interprets lines; a writer task owns the write half and drains the
//! session's outbound channel. Other sessions write to this client only by
//! queueing on that channel through the `Peer` in the registry.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::command::{
    broadcast_line, connected_notice, is_exit, not_found_reply, users_reply, Command,
    NO_TEXT_REPLY, USERNAME_PROMPT,
};
use crate::dispatcher::Dispatcher;
use crate::error::AppError;
use crate::peer::Peer;
use crate::types::SessionId;

/// Outbound lines buffered per connection. Lines from other sessions are
/// dropped once it is full; the session's own replies wait for room.
const OUTBOX_CAPACITY: usize = 32;

/// Session lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, username not yet received
    Unregistered,
    /// In the registry, routing messages
    Registered,
    /// Removed from the registry; terminal
    Closed,
}

/// Server-side state for one connected client
pub struct Session<R> {
    id: SessionId,
    username: Option<String>,
    state: SessionState,
    reader: BufReader<R>,
    line_buf: Vec<u8>,
    outbox: mpsc::Sender<String>,
    dispatcher: Dispatcher,
}

impl<R> Session<R>
where
    R: AsyncRead + Unpin,
{
    /// Create an unregistered session reading from `reader` and writing
    /// through `outbox`
    pub fn new(reader: R, outbox: mpsc::Sender<String>, dispatcher: Dispatcher) -> Self {
        Self {
            id: SessionId::new(),
            username: None,
            state: SessionState::Unregistered,
            reader: BufReader::new(reader),
            line_buf: Vec::new(),
            outbox,
            dispatcher,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Username if set, otherwise "Unknown"
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("Unknown")
    }

    /// Run the session to completion.
    ///
    /// Teardown happens on every exit path, including errors.
    pub async fn run(&mut self) -> Result<(), AppError> {
        let result = self.serve().await;
        self.teardown().await;
        result
    }

    async fn serve(&mut self) -> Result<(), AppError> {
        if !self.handshake().await? {
            debug!("Session {} closed before sending a username", self.id);
            return Ok(());
        }

        self.register().await?;
        self.read_loop().await
    }

    /// Prompt for and read the username. Returns false on end-of-stream.
    async fn handshake(&mut self) -> Result<bool, AppError> {
        self.reply(USERNAME_PROMPT).await?;

        match self.next_line().await? {
            Some(username) => {
                self.username = Some(username);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn register(&mut self) -> Result<(), AppError> {
        let username = self.display_name().to_string();
        let peer = Peer::new(self.id, username.clone(), self.outbox.clone());

        self.dispatcher.registry().add(peer).await?;
        self.state = SessionState::Registered;
        info!("Client {} connected with username '{}'", self.id, username);

        self.dispatcher
            .broadcast(&connected_notice(&username), self.id)
            .await?;
        Ok(())
    }

    async fn read_loop(&mut self) -> Result<(), AppError> {
        while let Some(line) = self.next_line().await? {
            self.handle_line(&line).await?;

            if is_exit(&line) {
                debug!("Client {} requested exit", self.id);
                break;
            }
        }
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> Result<(), AppError> {
        let username = self.display_name().to_string();

        match Command::parse(line) {
            Command::ListUsers => {
                let usernames = self.dispatcher.list_usernames().await?;
                self.reply(users_reply(&usernames)).await?;
                info!("{} requested the user list", username);
            }
            Command::MissingText => {
                self.reply(NO_TEXT_REPLY).await?;
            }
            Command::Direct { recipient, body } => {
                let found = self.dispatcher.registry().find_by_username(recipient).await?;
                match found {
                    Some(peer) => {
                        if body.is_empty() {
                            warn!("Empty message from {}", username);
                        }
                        info!("Message from {} to {}", username, recipient);
                        self.dispatcher.send_direct(body, &peer);
                    }
                    None => {
                        self.reply(not_found_reply(recipient)).await?;
                    }
                }
            }
            Command::Broadcast(text) => {
                if text.is_empty() {
                    warn!("Empty message from {}", username);
                }
                info!("Broadcast message '{}' from {}", text, username);
                self.dispatcher
                    .broadcast(&broadcast_line(&username, text), self.id)
                    .await?;
            }
        }
        Ok(())
    }

    /// Read one input line without its `\n` or `\r\n` terminator.
    ///
    /// Invalid UTF-8 is replaced rather than treated as a read failure.
    /// Returns None at end-of-stream.
    async fn next_line(&mut self) -> Result<Option<String>, AppError> {
        self.line_buf.clear();
        if self.reader.read_until(b'\n', &mut self.line_buf).await? == 0 {
            return Ok(None);
        }

        if self.line_buf.ends_with(b"\n") {
            self.line_buf.pop();
            if self.line_buf.ends_with(b"\r") {
                self.line_buf.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&self.line_buf).into_owned()))
    }

    /// Write a line to this session's own client
    async fn reply(&self, line: impl Into<String>) -> Result<(), AppError> {
        self.outbox
            .send(line.into())
            .await
            .map_err(|_| AppError::ChannelSend)
    }

    async fn teardown(&mut self) {
        if self.state == SessionState::Registered {
            if let Err(e) = self.dispatcher.registry().remove(self.id).await {
                warn!("Failed to deregister {}: {}", self.id, e);
            }
        }
        self.state = SessionState::Closed;
        info!("Client {} ({}) disconnected", self.display_name(), self.id);
    }
}

/// Handle a new connection
///
/// Runs the session and its writer task, and returns once the connection
/// is fully closed.
pub async fn handle_connection<S>(stream: S, dispatcher: Dispatcher) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let (outbox, inbox) = mpsc::channel::<String>(OUTBOX_CAPACITY);

    let write_task = tokio::spawn(write_lines(writer, inbox));

    let mut session = Session::new(reader, outbox, dispatcher);
    let result = session.run().await;

    // Dropping the session releases its outbox; the writer drains what is
    // queued and closes once no peer handle remains.
    drop(session);
    if let Err(e) = write_task.await {
        warn!("Writer task failed: {}", e);
    }

    result
}

/// Drain queued lines to the connection, one `\n`-terminated line each.
async fn write_lines<W>(mut writer: W, mut inbox: mpsc::Receiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = inbox.recv().await {
        let mut bytes = line.into_bytes();
        bytes.push(b'\n');

        if let Err(e) = writer.write_all(&bytes).await {
            debug!("Connection write failed, ending writer: {}", e);
            break;
        }
        if let Err(e) = writer.flush().await {
            debug!("Connection flush failed, ending writer: {}", e);
            break;
        }
    }

    let _ = writer.shutdown().await;
}
