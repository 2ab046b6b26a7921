//! Session identity
//!
//! Usernames may collide, so every connection gets a `SessionId` that the
//! registry and the broadcast exclusion check compare instead.

use uuid::Uuid;

/// Hex digits of the UUID shown in log lines
const SHORT_LEN: usize = 8;

/// Opaque per-connection identifier, random UUID v4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs show only the leading hex digits; collisions there are harmless.
impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut buf = Uuid::encode_buffer();
        let hex = self.0.simple().encode_lower(&mut buf);
        f.write_str(&hex[..SHORT_LEN])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn test_session_id_display_is_uuid_prefix() {
        let id = SessionId::new();
        let shown = id.to_string();

        assert_eq!(shown.len(), SHORT_LEN);
        assert!(id.as_uuid().simple().to_string().starts_with(&shown));
    }
}
