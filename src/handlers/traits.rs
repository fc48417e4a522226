use async_trait::async_trait;

use crate::session::Session;
use crate::signaling::{EventKind, SignalingEvent};

/// Handles one kind of inbound signaling event for a session.
///
/// Each handler owns a single [`EventKind`]. Handlers run on the session
/// task, so they may mutate the session freely.
#[async_trait]
pub trait SignalingHandler: Send + Sync {
    fn kind(&self) -> EventKind;

    /// Returns `true` if the event was acted on, `false` if it was ignored.
    async fn handle(&self, session: &mut Session, event: &SignalingEvent) -> bool;
}
