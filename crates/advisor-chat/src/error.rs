//! Error types for the chat gateway.

use advisor_core::AdvisorError;

use crate::dispatcher::QueryState;

/// Errors from the chat gateway.
///
/// Upstream failures are deliberately absent: they are recovered into
/// fallback text inside the dispatcher and never surface as errors.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("history unavailable: {0}")]
    HistoryUnavailable(String),
    #[error("invalid query transition: {0:?} -> {1:?}")]
    InvalidTransition(QueryState, QueryState),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("dispatch task failed: {0}")]
    TaskFailed(String),
    #[error("client initialization failed: {0}")]
    ClientInit(String),
}

impl ChatError {
    /// Text shown to the end user when a query is rejected before dispatch.
    pub fn user_notice(&self) -> String {
        match self {
            ChatError::EmptyMessage => "Message cannot be empty".to_string(),
            ChatError::MessageTooLong(max) => {
                format!("Message exceeds the maximum length of {} characters", max)
            }
            _ => "Unable to process your request at the moment. Please try again later."
                .to_string(),
        }
    }
}

impl From<ChatError> for AdvisorError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::ClientInit(msg) => AdvisorError::Config(msg),
            other => AdvisorError::Server(other.to_string()),
        }
    }
}
