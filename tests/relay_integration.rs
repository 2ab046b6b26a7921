//! Integration tests for the TCP chat relay.
//!
//! Each test starts a listener on an ephemeral port and drives it with real
//! TCP clients speaking the line protocol.

use std::collections::BTreeSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use chat_relay::{spawn_registry, Dispatcher, Listener};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};

// ============================================================================
// Constants
// ============================================================================

/// Upper bound on waiting for an expected line
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a client must stay silent to count as "received nothing"
const SILENCE_WINDOW: Duration = Duration::from_millis(150);

/// Delay between `/users` polls while waiting for membership to settle
const POLL_INTERVAL: Duration = Duration::from_millis(20);

// ============================================================================
// Test Helpers
// ============================================================================

async fn start_relay() -> SocketAddr {
    let listener = Listener::bind(0, Dispatcher::new(spawn_registry()))
        .await
        .expect("bind listener");
    let port = listener.local_addr().expect("local addr").port();

    tokio::spawn(async move {
        let _ = listener.run().await;
    });

    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    /// Connect and consume the username prompt without answering it
    async fn connect_raw(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (reader, writer) = stream.into_split();
        let mut client = Self {
            lines: BufReader::new(reader).lines(),
            writer,
        };
        assert_eq!(client.recv().await.as_deref(), Some("Enter your username:"));
        client
    }

    /// Connect, register, and wait until the relay has the client registered
    async fn connect(addr: SocketAddr, username: &str) -> Self {
        let mut client = Self::connect_raw(addr).await;
        client.send(username).await;
        client.send("/users").await;
        client.recv_users_reply().await;
        client
    }

    /// Skip relayed lines until the next `/users` reply
    async fn recv_users_reply(&mut self) -> String {
        loop {
            let line = self.recv().await.expect("users reply");
            if line.starts_with("Users in chat: ") {
                return line;
            }
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("write line");
    }

    /// Next line, or None once the relay closed the connection
    async fn recv(&mut self) -> Option<String> {
        timeout(RECV_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for line")
            .expect("read line")
    }

    async fn expect_line(&mut self, expected: &str) {
        assert_eq!(self.recv().await.as_deref(), Some(expected));
    }

    async fn expect_silence(&mut self) {
        let result = timeout(SILENCE_WINDOW, self.lines.next_line()).await;
        assert!(result.is_err(), "unexpected line: {:?}", result);
    }

    async fn expect_closed(&mut self) {
        assert_eq!(self.recv().await, None);
    }

    async fn users(&mut self) -> BTreeSet<String> {
        self.send("/users").await;
        let reply = self.recv_users_reply().await;
        let names = reply
            .strip_prefix("Users in chat: ")
            .expect("users prefix");
        names.split_whitespace().map(str::to_string).collect()
    }

    /// Poll `/users` until it lists exactly `expected`.
    ///
    /// Every line received meanwhile must be a `/users` reply.
    async fn wait_for_users(&mut self, expected: &[&str]) {
        let expected = set(expected);
        let deadline = Instant::now() + RECV_TIMEOUT;

        loop {
            self.send("/users").await;
            let reply = self.recv().await.expect("users reply");
            let names: BTreeSet<String> = reply
                .strip_prefix("Users in chat: ")
                .unwrap_or_else(|| panic!("unexpected line: {reply}"))
                .split_whitespace()
                .map(str::to_string)
                .collect();

            if names == expected {
                return;
            }
            assert!(
                Instant::now() < deadline,
                "users still {names:?}, expected {expected:?}"
            );
            sleep(POLL_INTERVAL).await;
        }
    }
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_chat_scenario() {
    let addr = start_relay().await;

    let mut alice = TestClient::connect(addr, "alice").await;
    let mut bob = TestClient::connect(addr, "bob").await;
    alice.expect_line("bob connected to the chat.").await;

    bob.send("hello everyone").await;
    alice.expect_line("bob: hello everyone").await;
    bob.expect_silence().await;

    alice.send("@bob hi").await;
    bob.expect_line("hi").await;
    alice.expect_silence().await;

    alice.send("@carol hi").await;
    alice.expect_line("User carol not found.").await;
    bob.expect_silence().await;

    alice.send("/users").await;
    alice.expect_line("Users in chat: alice bob ").await;

    bob.send("/exit").await;
    alice.expect_line("bob: /exit").await;
    bob.expect_closed().await;

    assert_eq!(alice.users().await, set(&["alice"]));
}

#[tokio::test]
async fn test_connect_notice_not_sent_to_self() {
    let addr = start_relay().await;

    let mut alice = TestClient::connect(addr, "alice").await;
    alice.expect_silence().await;

    let _bob = TestClient::connect(addr, "bob").await;
    alice.expect_line("bob connected to the chat.").await;
}

#[tokio::test]
async fn test_direct_message_without_text() {
    let addr = start_relay().await;

    let mut alice = TestClient::connect(addr, "alice").await;
    let mut bob = TestClient::connect(addr, "bob").await;
    alice.expect_line("bob connected to the chat.").await;

    alice.send("@bob").await;
    alice.expect_line("Message contains no text.").await;
    bob.expect_silence().await;

    // Empty body after the space is still delivered
    alice.send("@bob ").await;
    bob.expect_line("").await;
}

#[tokio::test]
async fn test_empty_line_is_broadcast() {
    let addr = start_relay().await;

    let mut alice = TestClient::connect(addr, "alice").await;
    let mut bob = TestClient::connect(addr, "bob").await;
    alice.expect_line("bob connected to the chat.").await;

    bob.send("").await;
    alice.expect_line("bob: ").await;
}

#[tokio::test]
async fn test_commands_are_case_insensitive() {
    let addr = start_relay().await;

    let mut alice = TestClient::connect(addr, "alice").await;
    alice.send("/USERS").await;
    alice.expect_line("Users in chat: alice ").await;

    alice.send("/Exit").await;
    alice.expect_closed().await;
}

#[tokio::test]
async fn test_abandoned_handshake_never_registers() {
    let addr = start_relay().await;

    let mut alice = TestClient::connect(addr, "alice").await;

    let ghost = TestClient::connect_raw(addr).await;
    drop(ghost);

    alice.expect_silence().await;
    assert_eq!(alice.users().await, set(&["alice"]));
}

#[tokio::test]
async fn test_abrupt_disconnect_deregisters() {
    let addr = start_relay().await;

    let mut alice = TestClient::connect(addr, "alice").await;
    let bob = TestClient::connect(addr, "bob").await;
    alice.expect_line("bob connected to the chat.").await;

    drop(bob);

    // No leave notice is broadcast; membership converges without bob
    alice.wait_for_users(&["alice"]).await;
    alice.expect_silence().await;

    alice.send("@bob still there?").await;
    alice.expect_line("User bob not found.").await;
}

#[tokio::test]
async fn test_duplicate_usernames_are_allowed() {
    let addr = start_relay().await;

    let mut first = TestClient::connect(addr, "sam").await;
    let mut second = TestClient::connect(addr, "sam").await;
    first.expect_line("sam connected to the chat.").await;

    second.send("/users").await;
    second.expect_line("Users in chat: sam sam ").await;

    // Lookups resolve to the earliest registration
    second.send("@sam ping").await;
    first.expect_line("ping").await;
    second.expect_silence().await;
}

#[tokio::test]
async fn test_membership_after_concurrent_join_and_leave() {
    const CLIENTS: usize = 8;

    let addr = start_relay().await;
    let mut observer = TestClient::connect(addr, "observer").await;

    let joins = (0..CLIENTS).map(|i| {
        tokio::spawn(async move { TestClient::connect(addr, &format!("user{i}")).await })
    });
    let mut clients = Vec::new();
    for join in joins {
        clients.push(join.await.expect("join task"));
    }

    for _ in 0..CLIENTS {
        let notice = observer.recv().await.expect("connect notice");
        assert!(notice.ends_with(" connected to the chat."), "{notice}");
    }

    let mut leavers: Vec<TestClient> = clients.drain(..CLIENTS / 2).collect();
    let leaves = leavers.iter_mut().map(|client| async move {
        client.send("/exit").await;
        loop {
            // Drain /exit broadcasts from other leavers until our socket closes
            if client.recv().await.is_none() {
                break;
            }
        }
    });
    for leave in leaves {
        leave.await;
    }

    let mut expected: BTreeSet<String> = (CLIENTS / 2..CLIENTS)
        .map(|i| format!("user{i}"))
        .collect();
    expected.insert("observer".to_string());

    // Skips the "/exit" broadcasts from the leavers
    observer.send("/users").await;
    let reply = observer.recv_users_reply().await;
    let names: Vec<&str> = reply["Users in chat: ".len()..].split_whitespace().collect();
    assert_eq!(names.len(), CLIENTS / 2 + 1, "duplicate entries: {reply}");
    assert_eq!(names.into_iter().map(str::to_string).collect::<BTreeSet<_>>(), expected);
}
