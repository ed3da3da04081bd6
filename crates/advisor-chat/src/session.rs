//! Registry of live persistent-channel sessions.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use advisor_core::{ChatMessage, SessionId};

use crate::frames::ServerFrame;

/// A connection-scoped identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub live: bool,
    pub created_at: DateTime<Utc>,
}

struct SessionSlot {
    session: Session,
    /// Feeds the connection's write loop.
    sender: mpsc::UnboundedSender<ServerFrame>,
}

/// Owns every live session and its outbound channel.
///
/// Entries are added and removed only by connection lifecycle events; any
/// task may look a session up to send to it.
#[derive(Default)]
pub struct SessionRegistry {
    slots: RwLock<HashMap<SessionId, SessionSlot>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and return its fresh identifier.
    pub fn register(&self, sender: mpsc::UnboundedSender<ServerFrame>) -> SessionId {
        let id = SessionId::new();
        let session = Session {
            id,
            live: true,
            created_at: Utc::now(),
        };
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, SessionSlot { session, sender });
        info!(session_id = %id, "Session registered");
        id
    }

    pub fn is_live(&self, id: SessionId) -> bool {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .is_some_and(|slot| slot.session.live && !slot.sender.is_closed())
    }

    /// Release a session. Returns `false` if it was already gone.
    pub fn unregister(&self, id: SessionId) -> bool {
        let removed = self
            .slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some();
        if removed {
            info!(session_id = %id, "Session unregistered");
        }
        removed
    }

    pub fn live_count(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.session.live)
            .count()
    }

    /// Queue a frame for a session.
    ///
    /// Frames for unknown or closed sessions are dropped; the return value
    /// only reports whether the frame was queued.
    pub fn send(&self, id: SessionId, frame: ServerFrame) -> bool {
        let delivered = {
            let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
            match slots.get(&id) {
                Some(slot) if slot.session.live => slot.sender.send(frame).is_ok(),
                _ => {
                    debug!(session_id = %id, "Dropping frame for inactive session");
                    return false;
                }
            }
        };

        if !delivered {
            // Write loop is gone; stop accepting frames until unregister.
            if let Some(slot) = self
                .slots
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .get_mut(&id)
            {
                slot.session.live = false;
            }
            debug!(session_id = %id, "Session write loop closed");
        }
        delivered
    }
}

/// Send-side view of one session, handed to the dispatcher.
#[derive(Clone)]
pub struct SessionOutbox {
    registry: Arc<SessionRegistry>,
    session_id: SessionId,
}

impl SessionOutbox {
    pub fn new(registry: Arc<SessionRegistry>, session_id: SessionId) -> Self {
        Self {
            registry,
            session_id,
        }
    }

    pub fn typing(&self, active: bool) -> bool {
        self.registry
            .send(self.session_id, ServerFrame::typing(active))
    }

    pub fn reply(&self, text: impl Into<String>) -> bool {
        let msg = ChatMessage::assistant(text, self.session_id);
        self.registry.send(self.session_id, ServerFrame::from(&msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_session() -> (
        SessionRegistry,
        SessionId,
        mpsc::UnboundedReceiver<ServerFrame>,
    ) {
        let registry = SessionRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let id = registry.register(tx);
        (registry, id, rx)
    }

    #[test]
    fn test_register_marks_live() {
        let (registry, id, _rx) = registry_with_session();
        assert!(registry.is_live(id));
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn test_register_issues_distinct_ids() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let a = registry.register(tx.clone());
        let b = registry.register(tx);
        assert_ne!(a, b);
        assert_eq!(registry.live_count(), 2);
    }

    #[test]
    fn test_unregister_twice_is_noop() {
        let (registry, id, _rx) = registry_with_session();
        assert!(registry.unregister(id));
        assert!(!registry.is_live(id));
        assert!(!registry.unregister(id));
        assert!(!registry.is_live(id));
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_unknown_session_is_not_live() {
        let registry = SessionRegistry::new();
        assert!(!registry.is_live(SessionId::new()));
    }

    #[test]
    fn test_send_delivers_to_live_session() {
        let (registry, id, mut rx) = registry_with_session();
        assert!(registry.send(id, ServerFrame::typing(true)));
        assert_eq!(rx.try_recv().unwrap(), ServerFrame::typing(true));
    }

    #[test]
    fn test_send_to_unregistered_session_is_dropped() {
        let (registry, id, mut rx) = registry_with_session();
        registry.unregister(id);
        assert!(!registry.send(id, ServerFrame::typing(true)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_after_receiver_dropped_marks_not_live() {
        let (registry, id, rx) = registry_with_session();
        drop(rx);
        assert!(!registry.is_live(id));
        assert!(!registry.send(id, ServerFrame::typing(false)));
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_outbox_reply_and_typing() {
        let registry = Arc::new(SessionRegistry::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = registry.register(tx);
        let outbox = SessionOutbox::new(Arc::clone(&registry), id);

        assert!(outbox.typing(true));
        assert!(outbox.reply("42"));

        assert_eq!(rx.try_recv().unwrap(), ServerFrame::typing(true));
        match rx.try_recv().unwrap() {
            ServerFrame::Bot {
                message,
                session_id,
                ..
            } => {
                assert_eq!(message, "42");
                assert_eq!(session_id, id);
            }
            other => panic!("expected bot frame, got {:?}", other),
        }
    }
}
