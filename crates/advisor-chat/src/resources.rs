//! Read-through access to the grid inventory service (assets, outages).

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use advisor_core::config::ResourceConfig;

use crate::error::ChatError;
use crate::fallback::FailureKind;
use crate::upstream::{classify_status, classify_transport_error};

/// Source of inventory documents.
///
/// Implementations never fail: problems come back as an error document
/// built by [`error_document`].
#[async_trait]
pub trait ResourceProxy: Send + Sync {
    async fn fetch_assets(&self) -> Value;
    async fn fetch_outages(&self) -> Value;
}

/// `{status:"error", errorType, message, timestamp}`.
pub fn error_document(kind: FailureKind, message: impl Into<String>) -> Value {
    json!({
        "status": "error",
        "errorType": kind.as_str(),
        "message": message.into(),
        "timestamp": Utc::now(),
    })
}

pub struct HttpResourceProxy {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl HttpResourceProxy {
    pub fn new(config: &ResourceConfig, user_agent: &str) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(user_agent)
            .build()
            .map_err(|e| ChatError::ClientInit(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    async fn fetch(&self, resource: &str) -> Value {
        let url = format!("{}/{}", self.base_url, resource);
        info!(%url, resource, "Fetching inventory resource");

        let mut request = self.client.get(&url);
        if !self.api_token.is_empty() {
            request = request.bearer_auth(&self.api_token);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                let kind = classify_transport_error(&e);
                warn!(error = %e, %kind, resource, "Inventory request failed");
                return error_document(kind, format!("Unable to retrieve {}", resource));
            }
        };

        let status = response.status();
        if let Some(kind) = classify_status(status.as_u16()) {
            warn!(status = status.as_u16(), %kind, resource, "Inventory returned an error status");
            return error_document(kind, format!("Inventory service returned {}", status.as_u16()));
        }

        match response.json::<Value>().await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, resource, "Inventory body could not be decoded");
                error_document(FailureKind::Unexpected, "Unexpected error occurred")
            }
        }
    }
}

#[async_trait]
impl ResourceProxy for HttpResourceProxy {
    async fn fetch_assets(&self) -> Value {
        self.fetch("assets").await
    }

    async fn fetch_outages(&self) -> Value {
        self.fetch("outages").await
    }
}
