use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AdvisorError, Result};

/// Longest accepted bearer token lifetime: ten years.
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Top-level configuration for the Advisor gateway.
///
/// Loaded from `advisor.toml` unless another path is given. Every section is optional
/// in the file; missing sections and fields fall back to their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvisorConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub resources: ResourceConfig,
}

impl AdvisorConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AdvisorConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Reject values the gateway cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.upstream.base_url.trim().is_empty() {
            return Err(AdvisorError::Config(
                "upstream.base_url must not be empty".to_string(),
            ));
        }
        if self.upstream.timeout_ms == 0 || self.upstream.ping_timeout_ms == 0 {
            return Err(AdvisorError::Config(
                "upstream timeouts must be greater than zero".to_string(),
            ));
        }
        if self.resources.timeout_ms == 0 {
            return Err(AdvisorError::Config(
                "resources.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.dispatch.max_concurrent_queries == 0 {
            return Err(AdvisorError::Config(
                "dispatch.max_concurrent_queries must be at least 1".to_string(),
            ));
        }
        if self.dispatch.session_queue_depth == 0 {
            return Err(AdvisorError::Config(
                "dispatch.session_queue_depth must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&self.auth.token_ttl_secs) {
            return Err(AdvisorError::Config(format!(
                "auth.token_ttl_secs must be between 1 and {}",
                MAX_TOKEN_TTL_SECS
            )));
        }
        if self.dispatch.max_message_length == 0 {
            return Err(AdvisorError::Config(
                "dispatch.max_message_length must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// HTTP/WebSocket listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Browser origins allowed by CORS.
    pub allowed_origins: Vec<String>,
    /// Global request body limit in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8080,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Upstream AI inference service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL, e.g. `http://localhost:5000`.
    pub base_url: String,
    /// Path receiving `POST {"prompt": ...}`.
    pub query_path: String,
    /// Path probed by the liveness check.
    pub health_path: String,
    /// Bound on one query round trip, in milliseconds.
    pub timeout_ms: u64,
    /// Bound on one liveness probe, in milliseconds.
    pub ping_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            query_path: "/llm-query".to_string(),
            health_path: "/health".to_string(),
            timeout_ms: 30_000,
            ping_timeout_ms: 5_000,
            user_agent: format!("advisor-gateway/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Bounds on query scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Upstream calls allowed in flight across all sessions.
    pub max_concurrent_queries: usize,
    /// Queries a single session may have waiting before it is told to slow down.
    pub session_queue_depth: usize,
    /// Longest accepted query, in characters.
    pub max_message_length: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_queries: 64,
            session_queue_depth: 16,
            max_message_length: 4000,
        }
    }
}

/// Conversation presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// First message sent on every new persistent-channel session.
    pub greeting: String,
    /// Entries returned by the history endpoint when no limit is given.
    pub history_default_limit: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            greeting: "Hello! I'm the grid operations assistant. I can help you with grid \
                       operations, meter readings, alerts, and system monitoring. How can I \
                       assist you today?"
                .to_string(),
            history_default_limit: 50,
        }
    }
}

/// Credential issuance for the stateless API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
    /// Lifetime of an issued bearer token, in seconds.
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "password".to_string(),
            token_ttl_secs: 86_400,
        }
    }
}

/// Third-party inventory API (assets and outages).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub base_url: String,
    /// Bearer token presented to the inventory API. Empty means none.
    pub api_token: String,
    pub timeout_ms: u64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000/api".to_string(),
            api_token: String::new(),
            timeout_ms: 10_000,
        }
    }
}
