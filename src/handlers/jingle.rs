use async_trait::async_trait;
use log::{debug, info};
use rtccore::jingle::JingleAction;
use rtccore::state::EndReason;

use super::traits::SignalingHandler;
use crate::session::{RenegotiationTask, Session};
use crate::signaling::{EventKind, SignalingEvent};

/// Jingle requests addressed to the session.
pub struct JingleHandler;

#[async_trait]
impl SignalingHandler for JingleHandler {
    fn kind(&self) -> EventKind {
        EventKind::Jingle
    }

    async fn handle(&self, session: &mut Session, event: &SignalingEvent) -> bool {
        let SignalingEvent::Jingle(msg) = event else {
            return false;
        };

        if msg.action == JingleAction::SessionInitiate {
            session.on_session_initiate(msg).await;
            return true;
        }
        if session.sid.as_deref() != Some(msg.sid.as_str()) {
            debug!(
                target: "Session/Jingle",
                "[{}] Ignoring {} for foreign sid {}",
                session.id,
                msg.action,
                msg.sid
            );
            return false;
        }

        match msg.action {
            JingleAction::SessionAccept => session.on_session_accept(msg).await,
            JingleAction::SourceAdd | JingleAction::SourceRemove => {
                if !session.call_state.is_negotiated() {
                    debug!(
                        target: "Session/Jingle",
                        "[{}] Ignoring {} in {:?}",
                        session.id,
                        msg.action,
                        session.call_state
                    );
                    return false;
                }
                let task = if msg.action == JingleAction::SourceAdd {
                    let owned = session.owners.record_from_jingle(&msg.jingle);
                    debug!(target: "Session/Jingle", "[{}] source-add names {owned} owner(s)", session.id);
                    RenegotiationTask::AddRemoteSources(msg.jingle.clone())
                } else {
                    RenegotiationTask::RemoveRemoteSources(msg.jingle.clone())
                };
                session.enqueue_renegotiation(task).await;
            }
            JingleAction::TransportInfo => session.on_remote_candidates(msg).await,
            JingleAction::SessionTerminate => {
                info!(
                    target: "Session/Jingle",
                    "[{}] Peer terminated the session ({:?})",
                    session.id,
                    msg.terminate_reason()
                );
                session.end(EndReason::RemoteTerminate).await;
            }
            JingleAction::SessionInfo | JingleAction::TransportReplace | JingleAction::SessionInitiate => {
                debug!(target: "Session/Jingle", "[{}] Unhandled {}", session.id, msg.action);
                return false;
            }
        }
        true
    }
}
