//! Line protocol definitions
//!
//! Classifies client input lines and formats every line the relay writes.
//! All replies are plain text; the writer adds the trailing newline.

/// First line sent on every new connection
pub const USERNAME_PROMPT: &str = "Enter your username:";

/// Reply to `@name` with no message part
pub const NO_TEXT_REPLY: &str = "Message contains no text.";

const USERS_PREFIX: &str = "Users in chat: ";

/// Client → relay command, parsed from one input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// `/users`, any case
    ListUsers,
    /// `@recipient body`
    Direct { recipient: &'a str, body: &'a str },
    /// `@recipient` with no space-separated payload
    MissingText,
    /// Anything else, including an empty line
    Broadcast(&'a str),
}

impl<'a> Command<'a> {
    /// Classify an input line (without its line terminator)
    pub fn parse(line: &'a str) -> Self {
        if line.eq_ignore_ascii_case("/users") {
            return Command::ListUsers;
        }

        match line.strip_prefix('@') {
            Some(rest) => match rest.split_once(' ') {
                Some((recipient, body)) => Command::Direct { recipient, body },
                None => Command::MissingText,
            },
            None => Command::Broadcast(line),
        }
    }
}

/// `/exit`, any case, ends the session once the line has been handled.
pub fn is_exit(line: &str) -> bool {
    line.eq_ignore_ascii_case("/exit")
}

/// Notice sent to everyone else when a session registers
pub fn connected_notice(username: &str) -> String {
    format!("{} connected to the chat.", username)
}

/// Broadcast line as seen by the other sessions
pub fn broadcast_line(username: &str, text: &str) -> String {
    format!("{}: {}", username, text)
}

/// Reply to a direct message for an unknown recipient
pub fn not_found_reply(recipient: &str) -> String {
    format!("User {} not found.", recipient)
}

/// Reply to `/users`: every name followed by a single space
pub fn users_reply<S: AsRef<str>>(usernames: &[S]) -> String {
    let mut reply = String::from(USERS_PREFIX);
    for name in usernames {
        reply.push_str(name.as_ref());
        reply.push(' ');
    }
    reply
}
