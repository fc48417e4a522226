use async_trait::async_trait;

use super::traits::SignalingHandler;
use crate::session::Session;
use crate::signaling::{EventKind, SignalingEvent};

/// Answers disco#info requests with the configured feature list.
pub struct DiscoveryHandler;

#[async_trait]
impl SignalingHandler for DiscoveryHandler {
    fn kind(&self) -> EventKind {
        EventKind::Discovery
    }

    async fn handle(&self, session: &mut Session, event: &SignalingEvent) -> bool {
        let SignalingEvent::CapabilityRequest { from, id } = event else {
            return false;
        };
        if let Err(e) = session
            .signaling
            .send_capabilities(from, Some(id.as_str()), &session.client_config.features)
            .await
        {
            session.report_error(&e.into());
        }
        true
    }
}
