use async_trait::async_trait;
use log::debug;

use super::traits::SignalingHandler;
use crate::session::Session;
use crate::signaling::{EventKind, SignalingEvent};
use crate::types::events::Event;

pub struct ChatHandler;

#[async_trait]
impl SignalingHandler for ChatHandler {
    fn kind(&self) -> EventKind {
        EventKind::Chat
    }

    async fn handle(&self, session: &mut Session, event: &SignalingEvent) -> bool {
        match event {
            SignalingEvent::GroupChatMessage { from, id, body } => {
                if !session.in_room(from) {
                    debug!(target: "Session/Chat", "[{}] Ignoring message from {from}", session.id);
                    return false;
                }
                session.emit(Event::GroupChatMessage {
                    from: from.clone(),
                    id: id.clone(),
                    body: body.clone(),
                });
                true
            }
            SignalingEvent::ChatAck { id } => {
                session.emit(Event::ChatAck { id: id.clone() });
                true
            }
            _ => false,
        }
    }
}
