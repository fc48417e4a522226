use async_trait::async_trait;

use super::traits::SignalingHandler;
use crate::error::SignalingError;
use crate::session::Session;
use crate::signaling::{EventKind, SignalingEvent};

/// A lost signaling connection is reported; the session stays up so the
/// application can reconnect or end it.
pub struct ConnectionHandler;

#[async_trait]
impl SignalingHandler for ConnectionHandler {
    fn kind(&self) -> EventKind {
        EventKind::Connection
    }

    async fn handle(&self, session: &mut Session, event: &SignalingEvent) -> bool {
        let SignalingEvent::Disconnected { reason } = event else {
            return false;
        };
        if let Some(reason) = reason {
            log::warn!(target: "Session/Connection", "[{}] Signaling lost: {reason}", session.id);
        }
        session.report_error(&SignalingError::Disconnected.into());
        true
    }
}
