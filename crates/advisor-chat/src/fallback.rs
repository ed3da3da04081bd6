//! Failure taxonomy and the user-facing text substituted for each failure.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Category of an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Upstream unreachable.
    Connection,
    /// No response within the configured bound.
    Timeout,
    /// Upstream rejected the request (4xx).
    Client,
    /// Upstream failed (5xx) or answered without a usable body.
    Server,
    /// Anything else, including undecodable payloads.
    Unexpected,
}

impl FailureKind {
    pub const ALL: [FailureKind; 5] = [
        FailureKind::Connection,
        FailureKind::Timeout,
        FailureKind::Client,
        FailureKind::Server,
        FailureKind::Unexpected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Connection => "connection",
            FailureKind::Timeout => "timeout",
            FailureKind::Client => "client",
            FailureKind::Server => "server",
            FailureKind::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connection" => Ok(FailureKind::Connection),
            "timeout" => Ok(FailureKind::Timeout),
            "client" => Ok(FailureKind::Client),
            "server" => Ok(FailureKind::Server),
            "unexpected" => Ok(FailureKind::Unexpected),
            other => Err(format!("unknown failure kind '{}'", other)),
        }
    }
}

pub const CONNECTION_FALLBACK: &str =
    "I'm unable to connect to the AI service right now. Please try again in a moment.";
pub const TIMEOUT_FALLBACK: &str = "The AI service is taking longer than expected to respond. \
                                    Please try a simpler query or try again later.";
pub const CLIENT_FALLBACK: &str =
    "There was an issue with your request format. Please try rephrasing your question.";
pub const SERVER_FALLBACK: &str =
    "The AI service encountered an internal error. Please try again later.";
pub const UNEXPECTED_FALLBACK: &str =
    "Something unexpected went wrong while answering your question. Please try again later.";
pub const DEFAULT_FALLBACK: &str = "I'm experiencing technical difficulties. Please try again \
                                    later or contact support if the issue persists.";

/// User-safe text for a failure kind.
pub fn fallback_text(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::Connection => CONNECTION_FALLBACK,
        FailureKind::Timeout => TIMEOUT_FALLBACK,
        FailureKind::Client => CLIENT_FALLBACK,
        FailureKind::Server => SERVER_FALLBACK,
        FailureKind::Unexpected => UNEXPECTED_FALLBACK,
    }
}

/// User-safe text for a free-form kind label; unknown labels get the default.
pub fn fallback_text_for_label(label: &str) -> &'static str {
    label
        .parse::<FailureKind>()
        .map(fallback_text)
        .unwrap_or(DEFAULT_FALLBACK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_kind_has_non_empty_text() {
        for kind in FailureKind::ALL {
            assert!(!fallback_text(kind).is_empty(), "{kind} has empty text");
        }
    }

    #[test]
    fn test_texts_are_kind_specific() {
        let texts: HashSet<&str> = FailureKind::ALL.iter().map(|k| fallback_text(*k)).collect();
        assert_eq!(texts.len(), FailureKind::ALL.len());
        assert!(!texts.contains(DEFAULT_FALLBACK));
    }

    #[test]
    fn test_mapping_is_deterministic() {
        for kind in FailureKind::ALL {
            assert_eq!(fallback_text(kind), fallback_text(kind));
            assert_eq!(fallback_text_for_label(kind.as_str()), fallback_text(kind));
        }
    }

    #[test]
    fn test_unknown_label_uses_default() {
        assert_eq!(fallback_text_for_label("gateway_exploded"), DEFAULT_FALLBACK);
        assert_eq!(fallback_text_for_label(""), DEFAULT_FALLBACK);
        assert_eq!(fallback_text_for_label("Connection"), DEFAULT_FALLBACK);
    }

    #[test]
    fn test_label_roundtrip() {
        for kind in FailureKind::ALL {
            assert_eq!(kind.as_str().parse::<FailureKind>().unwrap(), kind);
            assert_eq!(kind.to_string(), kind.as_str());
        }
        assert!("nope".parse::<FailureKind>().is_err());
    }

    #[test]
    fn test_texts_leak_no_internal_detail() {
        for kind in FailureKind::ALL {
            let text = fallback_text(kind).to_lowercase();
            assert!(!text.contains("http"));
            assert!(!text.contains("error:"));
        }
    }

    #[test]
    fn test_serde_uses_lowercase_labels() {
        let json = serde_json::to_string(&FailureKind::Timeout).unwrap();
        assert_eq!(json, "\"timeout\"");
    }
}
