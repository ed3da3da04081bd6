//! Shared wire types used by the gateway and its transports.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one persistent-channel session.
///
/// Assigned once at registration and never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message exchanged on the persistent channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: SessionId,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>, session_id: SessionId) -> Self {
        Self::new(Role::User, text, session_id)
    }

    pub fn assistant(text: impl Into<String>, session_id: SessionId) -> Self {
        Self::new(Role::Assistant, text, session_id)
    }

    fn new(role: Role, text: impl Into<String>, session_id: SessionId) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
            session_id,
        }
    }

    /// Wall-clock label (`HH:mm`, local time) shown next to the message.
    pub fn clock_label(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%H:%M")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_unique() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_session_id_parse_roundtrip() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<SessionId>().is_err());
    }

    #[test]
    fn test_session_id_serializes_as_plain_string() {
        let id = SessionId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
    }

    #[test]
    fn test_chat_message_constructors() {
        let sid = SessionId::new();
        let user = ChatMessage::user("hello", sid);
        assert_eq!(user.role, Role::User);
        assert_eq!(user.text, "hello");
        assert_eq!(user.session_id, sid);

        let bot = ChatMessage::assistant("hi there", sid);
        assert_eq!(bot.role, Role::Assistant);
        assert_eq!(bot.role.as_str(), "assistant");
    }

    #[test]
    fn test_chat_message_json_shape() {
        let msg = ChatMessage::user("ping", SessionId::new());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["text"], "ping");
        assert!(json.get("sessionId").is_some());
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn test_clock_label_format() {
        let msg = ChatMessage::assistant("x", SessionId::new());
        let label = msg.clock_label();
        assert_eq!(label.len(), 5);
        assert_eq!(&label[2..3], ":");
    }
}
