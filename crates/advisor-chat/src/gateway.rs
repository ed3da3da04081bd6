//! Façade binding channel events and stateless requests to the dispatcher.
//!
//! Persistent sessions get a bounded FIFO queue drained by a single worker,
//! so replies on one session arrive in submission order while sessions run
//! independently of each other.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use advisor_core::{AdvisorConfig, SessionId};

use crate::auth::Authenticator;
use crate::dispatcher::{Channel, Dispatcher};
use crate::error::ChatError;
use crate::frames::{ClientFrame, ServerFrame};
use crate::history::{HistoryEntry, HistoryLog, HistoryStats};
use crate::resources::ResourceProxy;
use crate::session::{SessionOutbox, SessionRegistry};
use crate::upstream::UpstreamClient;

pub const MALFORMED_FRAME_NOTICE: &str = "Error processing your message";
pub const BUSY_NOTICE: &str =
    "I'm still working on your previous questions. Please wait a moment before sending more.";

/// Result of a stateless query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub query: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
    pub processing_time_ms: u64,
}

/// History page plus statistics over the whole log.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
    pub history: Vec<HistoryEntry>,
    pub stats: HistoryStats,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    pub upstream_online: bool,
    pub upstream_status_text: String,
    pub active_sessions: usize,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

/// Handle to one open persistent session, owned by its connection.
pub struct SessionHandle {
    pub id: SessionId,
    queue: mpsc::Sender<String>,
    worker: JoinHandle<()>,
}

pub struct ChatGateway {
    registry: Arc<SessionRegistry>,
    dispatcher: Arc<Dispatcher>,
    authenticator: Arc<dyn Authenticator>,
    resources: Arc<dyn ResourceProxy>,
    greeting: String,
    queue_depth: usize,
    history_default_limit: usize,
}

impl ChatGateway {
    pub fn new(
        config: &AdvisorConfig,
        upstream: Arc<dyn UpstreamClient>,
        authenticator: Arc<dyn Authenticator>,
        resources: Arc<dyn ResourceProxy>,
    ) -> Self {
        let history = Arc::new(HistoryLog::new());
        Self {
            registry: Arc::new(SessionRegistry::new()),
            dispatcher: Arc::new(Dispatcher::new(upstream, history, &config.dispatch)),
            authenticator,
            resources,
            greeting: config.chat.greeting.clone(),
            queue_depth: config.dispatch.session_queue_depth,
            history_default_limit: config.chat.history_default_limit,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn history_log(&self) -> &Arc<HistoryLog> {
        self.dispatcher.history()
    }

    // ---------------------------------------------------------------------
    // Persistent channel
    // ---------------------------------------------------------------------

    /// Register a connection, greet it and start its worker.
    pub fn open_session(&self, sender: mpsc::UnboundedSender<ServerFrame>) -> SessionHandle {
        let id = self.registry.register(sender);
        let outbox = SessionOutbox::new(Arc::clone(&self.registry), id);
        outbox.reply(self.greeting.as_str());

        let (queue, mut pending) = mpsc::channel::<String>(self.queue_depth);
        let dispatcher = Arc::clone(&self.dispatcher);
        let worker = tokio::spawn(async move {
            let channel = Channel::Persistent(outbox);
            while let Some(query) = pending.recv().await {
                if let Err(e) = dispatcher.dispatch(&query, &channel).await {
                    warn!(session_id = %id, error = %e, "Session query did not complete");
                }
            }
            debug!(session_id = %id, "Session worker stopped");
        });

        SessionHandle { id, queue, worker }
    }

    /// Handle one inbound text frame. Never blocks on the upstream call.
    pub fn handle_message(&self, handle: &SessionHandle, raw: &str) {
        let id = handle.id;
        if !self.registry.is_live(id) {
            debug!(session_id = %id, "Ignoring message for inactive session");
            return;
        }

        let frame = match ClientFrame::parse(raw) {
            Ok(f) => f,
            Err(e) => {
                warn!(session_id = %id, error = %e, "Malformed client frame");
                self.registry
                    .send(id, ServerFrame::bot(MALFORMED_FRAME_NOTICE, id));
                return;
            }
        };

        let query = match self.dispatcher.validate(&frame.message) {
            Ok(q) => q.to_string(),
            Err(e) => {
                debug!(session_id = %id, error = %e, "Rejected message");
                self.registry.send(id, ServerFrame::bot(e.user_notice(), id));
                return;
            }
        };

        match handle.queue.try_send(query) {
            Ok(()) => debug!(session_id = %id, "Queued message"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(session_id = %id, depth = self.queue_depth, "Session queue full");
                self.registry.send(id, ServerFrame::bot(BUSY_NOTICE, id));
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(session_id = %id, "Session worker already stopped");
            }
        }
    }

    /// Release a session. Queued queries still run and are still logged;
    /// the returned handle resolves once the session's worker has drained.
    pub fn close_session(&self, handle: SessionHandle) -> JoinHandle<()> {
        let SessionHandle { id, queue, worker } = handle;
        drop(queue);
        self.registry.unregister(id);
        info!(session_id = %id, "Session closed");
        worker
    }

    pub fn active_sessions(&self) -> usize {
        self.registry.live_count()
    }

    // ---------------------------------------------------------------------
    // Stateless surface
    // ---------------------------------------------------------------------

    pub fn authorize(&self, token: Option<&str>) -> Result<(), ChatError> {
        match token {
            None => Err(ChatError::Unauthorized("Missing bearer token".to_string())),
            Some(t) if self.authenticator.validate(t) => Ok(()),
            Some(_) => Err(ChatError::Unauthorized(
                "Invalid or expired token".to_string(),
            )),
        }
    }

    /// Run one query to completion on its own task. Dropping the returned
    /// future does not cancel the query or skip its history entry.
    pub async fn chat(&self, query: &str) -> Result<ChatReply, ChatError> {
        let dispatcher = Arc::clone(&self.dispatcher);
        let query = query.to_string();
        let task = tokio::spawn(async move {
            dispatcher.dispatch(&query, &Channel::Stateless).await
        });
        let outcome = task
            .await
            .map_err(|e| ChatError::TaskFailed(e.to_string()))??;
        Ok(ChatReply {
            query: outcome.query,
            response: outcome.response,
            timestamp: outcome.completed_at,
            processing_time_ms: outcome.processing_time_ms,
        })
    }

    pub fn history(&self, limit: Option<usize>) -> HistoryView {
        let limit = limit.unwrap_or(self.history_default_limit);
        let (history, stats) = self.history_log().snapshot(limit);
        HistoryView {
            history,
            stats,
            timestamp: Utc::now(),
        }
    }

    pub fn clear_history(&self) -> usize {
        self.history_log().clear()
    }

    pub async fn health(&self) -> HealthReport {
        let online = self.dispatcher.upstream().ping().await;
        let upstream_status_text = format!(
            "AI service: {}",
            if online { "Online" } else { "Offline" }
        );
        HealthReport {
            status: "UP".to_string(),
            upstream_online: online,
            upstream_status_text,
            active_sessions: self.active_sessions(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
        }
    }

    pub async fn assets(&self) -> Value {
        self.resources.fetch_assets().await
    }

    pub async fn outages(&self) -> Value {
        self.resources.fetch_outages().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::{fallback_text, FailureKind};
    use crate::upstream::UpstreamOutcome;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const GOOD_TOKEN: &str = "letmein";

    /// Accepts exactly one fixed token.
    struct StubAuthenticator;

    impl Authenticator for StubAuthenticator {
        fn validate(&self, token: &str) -> bool {
            token == GOOD_TOKEN
        }
    }

    struct StubUpstream {
        outcome: UpstreamOutcome,
        delay: Duration,
        online: bool,
        completed: AtomicUsize,
    }

    #[async_trait]
    impl UpstreamClient for StubUpstream {
        async fn query(&self, prompt: &str) -> UpstreamOutcome {
            tokio::time::sleep(self.delay).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            match &self.outcome {
                UpstreamOutcome::Success(text) if text.is_empty() => {
                    UpstreamOutcome::Success(format!("re: {}", prompt))
                }
                other => other.clone(),
            }
        }

        async fn ping(&self) -> bool {
            self.online
        }
    }

    struct StubResources;

    #[async_trait]
    impl ResourceProxy for StubResources {
        async fn fetch_assets(&self) -> Value {
            json!({ "assets": ["T-1"] })
        }

        async fn fetch_outages(&self) -> Value {
            json!({ "outages": [] })
        }
    }

    fn gateway_with(outcome: UpstreamOutcome, delay: Duration, config: AdvisorConfig) -> ChatGateway {
        let upstream = Arc::new(StubUpstream {
            outcome,
            delay,
            online: true,
            completed: AtomicUsize::new(0),
        });
        ChatGateway::new(&config, upstream, Arc::new(StubAuthenticator), Arc::new(StubResources))
    }

    fn echo_gateway() -> ChatGateway {
        gateway_with(
            UpstreamOutcome::Success(String::new()),
            Duration::ZERO,
            AdvisorConfig::default(),
        )
    }

    async fn next_bot(rx: &mut mpsc::UnboundedReceiver<ServerFrame>) -> String {
        loop {
            match rx.recv().await.unwrap() {
                ServerFrame::Bot { message, .. } => return message,
                ServerFrame::Typing { .. } => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_open_session_sends_greeting() {
        let gw = echo_gateway();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = gw.open_session(tx);

        match rx.recv().await.unwrap() {
            ServerFrame::Bot {
                message,
                session_id,
                ..
            } => {
                assert_eq!(message, AdvisorConfig::default().chat.greeting);
                assert_eq!(session_id, handle.id);
            }
            other => panic!("expected greeting, got {:?}", other),
        }
        assert_eq!(gw.active_sessions(), 1);
        // Greeting is not a user exchange.
        assert!(gw.history_log().is_empty());
    }

    #[tokio::test]
    async fn test_message_round_trip() {
        let gw = echo_gateway();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = gw.open_session(tx);
        next_bot(&mut rx).await;

        gw.handle_message(&handle, r#"{"type":"user","message":"feeder 12 status"}"#);
        assert_eq!(rx.recv().await.unwrap(), ServerFrame::typing(true));
        assert_eq!(next_bot(&mut rx).await, "re: feeder 12 status");
        assert_eq!(rx.recv().await.unwrap(), ServerFrame::typing(false));
        assert_eq!(gw.history_log().len(), 1);
    }

    #[tokio::test]
    async fn test_replies_keep_submission_order() {
        let gw = gateway_with(
            UpstreamOutcome::Success(String::new()),
            Duration::from_millis(5),
            AdvisorConfig::default(),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = gw.open_session(tx);
        next_bot(&mut rx).await;

        for i in 0..5 {
            gw.handle_message(&handle, &format!(r#"{{"message":"q{}"}}"#, i));
        }
        for i in 0..5 {
            assert_eq!(next_bot(&mut rx).await, format!("re: q{}", i));
        }
    }

    #[tokio::test]
    async fn test_malformed_frame_gets_error_notice() {
        let gw = echo_gateway();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = gw.open_session(tx);
        next_bot(&mut rx).await;

        gw.handle_message(&handle, "{not json");
        assert_eq!(next_bot(&mut rx).await, MALFORMED_FRAME_NOTICE);
        assert!(gw.history_log().is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_gets_notice_and_is_not_logged() {
        let gw = echo_gateway();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = gw.open_session(tx);
        next_bot(&mut rx).await;

        gw.handle_message(&handle, r#"{"message":"   "}"#);
        assert_eq!(next_bot(&mut rx).await, "Message cannot be empty");
        assert!(rx.try_recv().is_err());
        assert!(gw.history_log().is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_answers_busy() {
        let mut config = AdvisorConfig::default();
        config.dispatch.session_queue_depth = 1;
        let gw = gateway_with(
            UpstreamOutcome::Success(String::new()),
            Duration::from_millis(300),
            config,
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = gw.open_session(tx);
        next_bot(&mut rx).await;

        for i in 0..5 {
            gw.handle_message(&handle, &format!(r#"{{"message":"q{}"}}"#, i));
        }

        let mut busy = 0;
        while let Ok(frame) = rx.try_recv() {
            if matches!(&frame, ServerFrame::Bot { message, .. } if message == BUSY_NOTICE) {
                busy += 1;
            }
        }
        assert!(busy >= 3, "expected at least 3 busy notices, got {}", busy);
    }

    #[tokio::test]
    async fn test_close_session_is_idempotent_for_registry() {
        let gw = echo_gateway();
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = gw.open_session(tx);
        let id = handle.id;

        gw.close_session(handle);
        assert_eq!(gw.active_sessions(), 0);
        assert!(!gw.registry().unregister(id));
    }

    #[tokio::test]
    async fn test_worker_stops_after_close() {
        let gw = echo_gateway();
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = gw.open_session(tx);
        let worker_done = gw.close_session(handle);
        tokio::time::timeout(Duration::from_secs(1), worker_done)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_stateless_chat_success() {
        let gw = echo_gateway();
        let reply = gw.chat("load forecast").await.unwrap();
        assert_eq!(reply.query, "load forecast");
        assert_eq!(reply.response, "re: load forecast");
        assert_eq!(gw.history(None).history.len(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_chat_still_logged() {
        let upstream = Arc::new(StubUpstream {
            outcome: UpstreamOutcome::Success(String::new()),
            delay: Duration::from_millis(100),
            online: true,
            completed: AtomicUsize::new(0),
        });
        let config = AdvisorConfig::default();
        let gw = ChatGateway::new(
            &config,
            Arc::clone(&upstream) as Arc<dyn UpstreamClient>,
            Arc::new(StubAuthenticator),
            Arc::new(StubResources),
        );

        // The caller gives up long before the upstream answers.
        let abandoned = tokio::time::timeout(Duration::from_millis(20), gw.chat("q")).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(upstream.completed.load(Ordering::SeqCst), 1);
        assert_eq!(gw.history_log().len(), 1);
        assert_eq!(gw.history_log().all()[0].response, "re: q");
    }

    #[tokio::test]
    async fn test_stateless_chat_failure_recovers() {
        let gw = gateway_with(
            UpstreamOutcome::Failure(FailureKind::Timeout),
            Duration::ZERO,
            AdvisorConfig::default(),
        );
        let reply = gw.chat("anything").await.unwrap();
        assert_eq!(reply.response, fallback_text(FailureKind::Timeout));
    }

    #[tokio::test]
    async fn test_stateless_chat_rejects_empty() {
        let gw = echo_gateway();
        assert!(matches!(gw.chat("  ").await, Err(ChatError::EmptyMessage)));
        assert!(gw.history_log().is_empty());
    }

    #[tokio::test]
    async fn test_history_view_and_clear() {
        let gw = echo_gateway();
        for q in ["a", "b", "c"] {
            gw.chat(q).await.unwrap();
        }

        let view = gw.history(Some(2));
        assert_eq!(view.history.len(), 2);
        assert_eq!(view.history[0].query, "b");
        assert_eq!(view.stats.total_entries, 3);

        assert_eq!(gw.clear_history(), 3);
        let view = gw.history(None);
        assert!(view.history.is_empty());
        assert_eq!(view.stats.total_entries, 0);
    }

    #[tokio::test]
    async fn test_authorize() {
        let gw = echo_gateway();
        assert!(matches!(gw.authorize(None), Err(ChatError::Unauthorized(_))));
        assert!(matches!(gw.authorize(Some("nope")), Err(ChatError::Unauthorized(_))));
        assert!(gw.authorize(Some(GOOD_TOKEN)).is_ok());
    }

    #[tokio::test]
    async fn test_health_report() {
        let gw = echo_gateway();
        let report = gw.health().await;
        assert_eq!(report.status, "UP");
        assert!(report.upstream_online);
        assert_eq!(report.upstream_status_text, "AI service: Online");
        assert!(!report.upstream_status_text.contains("localhost"));
        assert_eq!(report.active_sessions, 0);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("upstreamOnline").is_some());
        assert!(json.get("activeSessions").is_some());
    }

    #[tokio::test]
    async fn test_resources_pass_through() {
        let gw = echo_gateway();
        assert_eq!(gw.assets().await["assets"][0], "T-1");
        assert!(gw.outages().await["outages"].is_array());
    }
}
