//! Per-query lifecycle: validate, call upstream off the transport task,
//! substitute fallback text on failure, then record the exchange.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use advisor_core::config::DispatchConfig;

use crate::error::ChatError;
use crate::fallback::{fallback_text, FailureKind};
use crate::history::{HistoryEntry, HistoryLog};
use crate::session::SessionOutbox;
use crate::upstream::{UpstreamClient, UpstreamOutcome};

/// Lifecycle state of one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Received,
    Dispatching,
    Succeeded,
    Failed,
    Logged,
}

/// Validate a query state transition.
///
/// Valid transitions:
/// - Received -> Dispatching
/// - Dispatching -> Succeeded
/// - Dispatching -> Failed
/// - Succeeded -> Logged
/// - Failed -> Logged
pub fn validate_transition(from: QueryState, to: QueryState) -> Result<(), ChatError> {
    let valid = matches!(
        (from, to),
        (QueryState::Received, QueryState::Dispatching)
            | (QueryState::Dispatching, QueryState::Succeeded)
            | (QueryState::Dispatching, QueryState::Failed)
            | (QueryState::Succeeded, QueryState::Logged)
            | (QueryState::Failed, QueryState::Logged)
    );

    if valid {
        Ok(())
    } else {
        Err(ChatError::InvalidTransition(from, to))
    }
}

/// Tracks the current state of one in-flight query.
#[derive(Debug)]
struct QueryRun {
    state: QueryState,
}

impl QueryRun {
    fn new() -> Self {
        Self {
            state: QueryState::Received,
        }
    }

    fn advance(&mut self, to: QueryState) -> Result<(), ChatError> {
        validate_transition(self.state, to)?;
        self.state = to;
        Ok(())
    }
}

/// Where a query came from, and therefore where progress goes.
#[derive(Clone)]
pub enum Channel {
    /// A live session; receives typing and bot frames.
    Persistent(SessionOutbox),
    /// One-shot request; the caller reads the returned outcome.
    Stateless,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Succeeded,
    Failed(FailureKind),
}

/// Everything the caller needs after a query completes.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub query: String,
    pub response: String,
    pub status: DispatchStatus,
    pub processing_time_ms: u64,
    pub entry: HistoryEntry,
    pub completed_at: DateTime<Utc>,
}

/// Runs queries against the upstream service with bounded concurrency.
pub struct Dispatcher {
    upstream: Arc<dyn UpstreamClient>,
    history: Arc<HistoryLog>,
    permits: Arc<Semaphore>,
    max_message_length: usize,
}

impl Dispatcher {
    pub fn new(
        upstream: Arc<dyn UpstreamClient>,
        history: Arc<HistoryLog>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            upstream,
            history,
            permits: Arc::new(Semaphore::new(config.max_concurrent_queries)),
            max_message_length: config.max_message_length,
        }
    }

    pub fn history(&self) -> &Arc<HistoryLog> {
        &self.history
    }

    pub fn upstream(&self) -> &Arc<dyn UpstreamClient> {
        &self.upstream
    }

    /// Trim and check a raw query. Length is counted in characters.
    pub fn validate<'a>(&self, raw: &'a str) -> Result<&'a str, ChatError> {
        let query = raw.trim();
        if query.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if query.chars().count() > self.max_message_length {
            return Err(ChatError::MessageTooLong(self.max_message_length));
        }
        Ok(query)
    }

    /// Run one query to completion.
    ///
    /// Upstream failures never produce an error here; they come back as
    /// fallback text with [`DispatchStatus::Failed`]. Errors are limited to
    /// rejected input and an unavailable history log.
    pub async fn dispatch(&self, raw: &str, channel: &Channel) -> Result<DispatchOutcome, ChatError> {
        let mut run = QueryRun::new();

        let query = match self.validate(raw) {
            Ok(q) => q.to_string(),
            Err(e) => {
                debug!(error = %e, "Rejected query before dispatch");
                if let Channel::Persistent(outbox) = channel {
                    outbox.reply(e.user_notice());
                }
                return Err(e);
            }
        };

        run.advance(QueryState::Dispatching)?;
        if let Channel::Persistent(outbox) = channel {
            outbox.typing(true);
        }
        let started = Instant::now();

        let outcome = self.call_upstream(&query).await;
        let (response, status) = match outcome {
            UpstreamOutcome::Success(text) => {
                run.advance(QueryState::Succeeded)?;
                (text, DispatchStatus::Succeeded)
            }
            UpstreamOutcome::Failure(kind) => {
                run.advance(QueryState::Failed)?;
                warn!(%kind, "Upstream query failed, using fallback text");
                (fallback_text(kind).to_string(), DispatchStatus::Failed(kind))
            }
        };
        let processing_time_ms = started.elapsed().as_millis() as u64;

        if let Channel::Persistent(outbox) = channel {
            outbox.reply(response.as_str());
        }

        let appended = self.history.append(&query, &response, processing_time_ms);
        if let Channel::Persistent(outbox) = channel {
            if let Err(e) = &appended {
                outbox.reply(e.user_notice());
            }
            outbox.typing(false);
        }
        let entry = appended.map_err(|e| {
            error!(error = %e, "Failed to record chat entry");
            e
        })?;
        run.advance(QueryState::Logged)?;

        info!(
            entry_id = %entry.id,
            processing_time_ms,
            succeeded = status == DispatchStatus::Succeeded,
            "Query dispatched"
        );

        Ok(DispatchOutcome {
            query,
            response,
            status,
            processing_time_ms,
            entry,
            completed_at: Utc::now(),
        })
    }

    /// Run the upstream call on its own task, holding a concurrency permit.
    async fn call_upstream(&self, query: &str) -> UpstreamOutcome {
        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "Dispatch semaphore closed");
                return UpstreamOutcome::Failure(FailureKind::Unexpected);
            }
        };

        let upstream = Arc::clone(&self.upstream);
        let prompt = query.to_string();
        let task = tokio::spawn(async move {
            let outcome = upstream.query(&prompt).await;
            drop(permit);
            outcome
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Upstream task aborted");
                UpstreamOutcome::Failure(FailureKind::Unexpected)
            }
        }
    }
}
