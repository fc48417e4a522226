use async_trait::async_trait;
use log::{debug, info};
use rtccore::types::SessionType;

use super::traits::SignalingHandler;
use crate::session::Session;
use crate::signaling::{EventKind, SignalingEvent};

/// Joins the room the allocation service created for us.
pub struct RoomHandler;

#[async_trait]
impl SignalingHandler for RoomHandler {
    fn kind(&self) -> EventKind {
        EventKind::Room
    }

    async fn handle(&self, session: &mut Session, event: &SignalingEvent) -> bool {
        let SignalingEvent::AllocateSuccess { room } = event else {
            return false;
        };
        if session.config.session_type != SessionType::Create || session.room.is_some() {
            debug!(target: "Session/Room", "[{}] Ignoring allocation of {room}", session.id);
            return false;
        }
        info!(target: "Session/Room", "[{}] Room {room} allocated", session.id);
        if let Err(e) = session.join_room(room.clone()).await {
            session.report_error(&e);
        }
        true
    }
}
