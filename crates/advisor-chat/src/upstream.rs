//! Client for the upstream AI inference service.
//!
//! Every failure mode is folded into [`UpstreamOutcome::Failure`] here, so
//! callers never see transport or decoding errors.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use advisor_core::config::UpstreamConfig;

use crate::error::ChatError;
use crate::fallback::FailureKind;

/// Result of one upstream query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamOutcome {
    Success(String),
    Failure(FailureKind),
}

/// Capability to ask the AI service a question.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Send a prompt and wait (bounded) for the generated answer.
    async fn query(&self, prompt: &str) -> UpstreamOutcome;

    /// Lightweight liveness probe.
    async fn ping(&self) -> bool;
}

#[derive(Debug, Serialize)]
struct UpstreamRequest<'a> {
    prompt: &'a str,
}

/// Body returned by the AI service.
#[derive(Debug, Default, Deserialize)]
pub struct UpstreamResponse {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default, alias = "processingTime")]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl UpstreamResponse {
    /// Interpret a successfully decoded 2xx body.
    pub fn into_outcome(self) -> UpstreamOutcome {
        match (self.response, self.error) {
            (Some(text), _) => UpstreamOutcome::Success(text),
            (None, Some(error)) => {
                warn!(upstream_error = %error, "Upstream reported an error without a response");
                UpstreamOutcome::Failure(FailureKind::Server)
            }
            (None, None) => {
                warn!("Upstream body carried neither response nor error");
                UpstreamOutcome::Failure(FailureKind::Server)
            }
        }
    }
}

/// Map a non-success HTTP status to a failure kind. `None` means 2xx.
pub fn classify_status(status: u16) -> Option<FailureKind> {
    match status {
        200..=299 => None,
        400..=499 => Some(FailureKind::Client),
        500..=599 => Some(FailureKind::Server),
        _ => Some(FailureKind::Unexpected),
    }
}

pub(crate) fn classify_transport_error(err: &reqwest::Error) -> FailureKind {
    // Connect timeouts report both flags; the bound is what the user hit.
    if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_connect() {
        FailureKind::Connection
    } else if let Some(status) = err.status() {
        classify_status(status.as_u16()).unwrap_or(FailureKind::Unexpected)
    } else {
        FailureKind::Unexpected
    }
}

/// HTTP implementation talking JSON to the AI service.
pub struct HttpUpstreamClient {
    client: reqwest::Client,
    base_url: String,
    query_url: String,
    health_url: String,
    ping_timeout: Duration,
}

impl HttpUpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ChatError::ClientInit(e.to_string()))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            client,
            query_url: format!("{}{}", base_url, config.query_path),
            health_url: format!("{}{}", base_url, config.health_path),
            base_url,
            ping_timeout: Duration::from_millis(config.ping_timeout_ms),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn query(&self, prompt: &str) -> UpstreamOutcome {
        let started = Instant::now();
        debug!(url = %self.query_url, prompt_len = prompt.len(), "Sending query upstream");

        let response = match self
            .client
            .post(&self.query_url)
            .json(&UpstreamRequest { prompt })
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                let kind = classify_transport_error(&e);
                warn!(error = %e, %kind, "Upstream request failed");
                return UpstreamOutcome::Failure(kind);
            }
        };

        let status = response.status();
        if let Some(kind) = classify_status(status.as_u16()) {
            warn!(status = status.as_u16(), %kind, "Upstream returned an error status");
            return UpstreamOutcome::Failure(kind);
        }

        let outcome = match response.json::<UpstreamResponse>().await {
            Ok(body) => {
                if let Some(upstream_ms) = body.processing_time {
                    debug!(upstream_ms, "Upstream reported processing time");
                }
                body.into_outcome()
            }
            Err(e) if e.is_timeout() => {
                warn!(error = %e, "Upstream body timed out");
                UpstreamOutcome::Failure(FailureKind::Timeout)
            }
            Err(e) => {
                warn!(error = %e, "Upstream body could not be decoded");
                UpstreamOutcome::Failure(FailureKind::Unexpected)
            }
        };

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            success = matches!(outcome, UpstreamOutcome::Success(_)),
            "Upstream query finished"
        );
        outcome
    }

    async fn ping(&self) -> bool {
        match self
            .client
            .get(&self.health_url)
            .timeout(self.ping_timeout)
            .send()
            .await
        {
            Ok(r) => r.status().is_success(),
            Err(e) => {
                warn!(error = %e, "Upstream health check failed");
                false
            }
        }
    }
}
