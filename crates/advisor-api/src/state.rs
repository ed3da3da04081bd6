//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use advisor_chat::{ChatGateway, TokenAuthenticator};
use advisor_core::AdvisorConfig;

/// Shared application state.
///
/// Cloned into every handler; all fields are cheap `Arc` clones.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<ChatGateway>,
    /// Issues the bearer tokens the gateway later validates.
    pub tokens: Arc<TokenAuthenticator>,
    pub config: Arc<AdvisorConfig>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: AdvisorConfig,
        gateway: ChatGateway,
        tokens: Arc<TokenAuthenticator>,
    ) -> Self {
        Self {
            gateway: Arc::new(gateway),
            tokens,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }
}
