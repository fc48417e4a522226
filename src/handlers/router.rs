use std::collections::HashMap;
use std::sync::Arc;

use super::chat::ChatHandler;
use super::connection::ConnectionHandler;
use super::discovery::DiscoveryHandler;
use super::jingle::JingleHandler;
use super::presence::PresenceHandler;
use super::room::RoomHandler;
use super::traits::SignalingHandler;
use crate::session::Session;
use crate::signaling::{EventKind, SignalingEvent};

/// Dispatches inbound signaling events to the handler registered for their
/// [`EventKind`].
pub struct EventRouter {
    handlers: HashMap<EventKind, Arc<dyn SignalingHandler>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// A router with a handler for every event kind.
    pub fn with_default_handlers() -> Self {
        let mut router = Self::new();
        router.register(Arc::new(PresenceHandler));
        router.register(Arc::new(JingleHandler));
        router.register(Arc::new(DiscoveryHandler));
        router.register(Arc::new(RoomHandler));
        router.register(Arc::new(ChatHandler));
        router.register(Arc::new(ConnectionHandler));
        router
    }

    /// Register a handler for its event kind.
    ///
    /// # Panics
    /// Panics if a handler is already registered for the same kind.
    pub fn register(&mut self, handler: Arc<dyn SignalingHandler>) {
        let kind = handler.kind();
        if self.handlers.insert(kind, handler).is_some() {
            panic!("Handler for event kind '{}' already registered", kind);
        }
    }

    /// Returns `true` if a handler was found and acted on the event.
    pub async fn dispatch(&self, session: &mut Session, event: &SignalingEvent) -> bool {
        match self.handlers.get(&event.kind()) {
            Some(handler) => handler.handle(session, event).await,
            None => false,
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestRig;
    use rtccore::types::CallType;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MockHandler {
        kind: EventKind,
        handled: AtomicBool,
    }

    impl MockHandler {
        fn new(kind: EventKind) -> Self {
            Self {
                kind,
                handled: AtomicBool::new(false),
            }
        }
    }

    #[async_trait::async_trait]
    impl SignalingHandler for MockHandler {
        fn kind(&self) -> EventKind {
            self.kind
        }

        async fn handle(&self, _session: &mut Session, _event: &SignalingEvent) -> bool {
            self.handled.store(true, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn test_default_handlers_cover_every_kind() {
        assert_eq!(EventRouter::with_default_handlers().handler_count(), 6);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_registration_panics() {
        let mut router = EventRouter::new();
        router.register(Arc::new(MockHandler::new(EventKind::Chat)));
        router.register(Arc::new(MockHandler::new(EventKind::Chat)));
    }

    #[tokio::test]
    async fn test_dispatch_by_kind() {
        let rig = TestRig::new();
        let mut session = rig.session(CallType::Chat);
        let mut router = EventRouter::new();
        let chat = Arc::new(MockHandler::new(EventKind::Chat));
        router.register(chat.clone());

        let ack = SignalingEvent::ChatAck { id: "m1".to_string() };
        assert!(router.dispatch(&mut session, &ack).await);
        assert!(chat.handled.load(Ordering::SeqCst));

        let gone = SignalingEvent::Disconnected { reason: None };
        assert!(!router.dispatch(&mut session, &gone).await);
    }
}
