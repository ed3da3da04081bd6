//! JSON frames exchanged on the persistent channel.

use chrono::Local;
use serde::{Deserialize, Serialize};

use advisor_core::{ChatMessage, SessionId};

/// Frame sent from the gateway to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    Bot {
        message: String,
        timestamp: String,
        #[serde(rename = "sessionId")]
        session_id: SessionId,
    },
    Typing {
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },
}

impl ServerFrame {
    pub fn bot(message: impl Into<String>, session_id: SessionId) -> Self {
        ServerFrame::Bot {
            message: message.into(),
            timestamp: Local::now().format("%H:%M").to_string(),
            session_id,
        }
    }

    pub fn typing(is_typing: bool) -> Self {
        ServerFrame::Typing { is_typing }
    }
}

impl From<&ChatMessage> for ServerFrame {
    fn from(msg: &ChatMessage) -> Self {
        ServerFrame::Bot {
            message: msg.text.clone(),
            timestamp: msg.clock_label(),
            session_id: msg.session_id,
        }
    }
}

/// Frame received from a client. Only `message` is acted upon.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientFrame {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ClientFrame {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
