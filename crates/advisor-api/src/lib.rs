//! HTTP and WebSocket surface of the Advisor gateway.
//!
//! Exposes the persistent chat channel at `/ws` and the stateless REST
//! endpoints under `/api`, all backed by one shared [`ChatGateway`].
//!
//! [`ChatGateway`]: advisor_chat::ChatGateway

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
