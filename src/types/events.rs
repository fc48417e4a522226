use std::sync::{Arc, RwLock};

use rtccore::bridge::BridgeMessage;
use rtccore::state::{CallState, EndReason, PstnState};
use rtccore::types::Participant;
use rtccore::xml::Jid;
use serde::Serialize;

use crate::transport::IceConnectionState;

/// Session and room events delivered to the application.
#[derive(Debug, Clone, Serialize)]
pub enum Event {
    /// An entry point rejected its configuration.
    ConfigurationError {
        message: String,
    },
    SessionStarted {
        session_id: String,
    },
    CallStateChanged {
        session_id: String,
        state: CallState,
    },
    /// Our own presence in the room was confirmed.
    RoomJoined {
        occupant: Jid,
    },
    ParticipantJoined(Participant),
    ParticipantUpdated(Participant),
    ParticipantLeft {
        jid: Jid,
    },
    /// The last remote participant left. The session stays up until the
    /// application ends it.
    AllParticipantsLeft {
        session_id: String,
    },
    RemoteStreamAdded {
        stream_id: String,
        /// Occupant that sends the stream, when its SSRC owner is known.
        participant: Option<Jid>,
    },
    RemoteStreamRemoved {
        stream_id: String,
    },
    IceConnectionStateChanged(IceConnectionState),
    DataChannelOpened,
    DataChannelClosed,
    Bridge(BridgeMessage),
    GroupChatMessage {
        from: Jid,
        id: Option<String>,
        body: String,
    },
    ChatAck {
        id: String,
    },
    PstnStateChanged(PstnState),
    /// A recoverable failure. The session keeps running.
    SessionError {
        session_id: String,
        message: String,
    },
    SessionEnded {
        session_id: String,
        reason: EndReason,
    },
}

pub trait EventHandler: Send + Sync {
    fn handle_event(&self, event: &Event);
}

#[derive(Default, Clone)]
pub struct CoreEventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
}

impl CoreEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(&self, handler: Arc<dyn EventHandler>) {
        match self.handlers.write() {
            Ok(mut handlers) => handlers.push(handler),
            Err(poisoned) => poisoned.into_inner().push(handler),
        }
    }

    /// Returns true if there are any event handlers registered.
    pub fn has_handlers(&self) -> bool {
        match self.handlers.read() {
            Ok(handlers) => !handlers.is_empty(),
            Err(poisoned) => !poisoned.into_inner().is_empty(),
        }
    }

    pub fn dispatch(&self, event: &Event) {
        let handlers = match self.handlers.read() {
            Ok(handlers) => handlers.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for handler in handlers.iter() {
            handler.handle_event(event);
        }
    }
}

impl std::fmt::Debug for CoreEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreEventBus")
            .field("has_handlers", &self.has_handlers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collector(Mutex<Vec<Event>>);

    impl EventHandler for Collector {
        fn handle_event(&self, event: &Event) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_dispatch_reaches_every_handler() {
        let bus = CoreEventBus::new();
        assert!(!bus.has_handlers());
        let a = Arc::new(Collector::default());
        let b = Arc::new(Collector::default());
        bus.add_handler(a.clone());
        bus.add_handler(b.clone());
        bus.dispatch(&Event::ChatAck { id: "m1".to_string() });
        assert_eq!(a.0.lock().unwrap().len(), 1);
        assert_eq!(b.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_events_serialize() {
        let json = serde_json::to_value(Event::PstnStateChanged(PstnState::Dialing)).unwrap();
        assert_eq!(json["PstnStateChanged"], "Dialing");
    }
}
