//! Chat gateway core for the Advisor service.
//!
//! Tracks live sessions, dispatches queries to the upstream AI service
//! without blocking the transport, turns upstream failures into safe
//! fallback text, and keeps an in-memory history of every exchange.

pub mod auth;
pub mod dispatcher;
pub mod error;
pub mod fallback;
pub mod frames;
pub mod gateway;
pub mod history;
pub mod resources;
pub mod session;
pub mod upstream;

pub use auth::{Authenticator, IssuedToken, TokenAuthenticator};
pub use dispatcher::{Channel, DispatchOutcome, DispatchStatus, Dispatcher, QueryState};
pub use error::ChatError;
pub use fallback::{fallback_text, fallback_text_for_label, FailureKind};
pub use frames::{ClientFrame, ServerFrame};
pub use gateway::{ChatGateway, ChatReply, HealthReport, HistoryView, SessionHandle};
pub use history::{HistoryEntry, HistoryLog, HistoryStats};
pub use resources::{HttpResourceProxy, ResourceProxy};
pub use session::{Session, SessionOutbox, SessionRegistry};
pub use upstream::{HttpUpstreamClient, UpstreamClient, UpstreamOutcome};
