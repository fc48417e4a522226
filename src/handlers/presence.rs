use async_trait::async_trait;
use log::{debug, info, warn};
use rtccore::state::{CallState, CallTransition, PresenceTransition, PstnState, PstnTransition, StateMachine};
use rtccore::types::{CallType, Participant, ParticipantUpdate};
use rtccore::xml::Jid;

use super::traits::SignalingHandler;
use crate::error::SessionError;
use crate::session::Session;
use crate::signaling::{EventKind, SignalingEvent};
use crate::types::events::Event;

/// Room membership: our own join, the focus, and remote participants.
pub struct PresenceHandler;

#[async_trait]
impl SignalingHandler for PresenceHandler {
    fn kind(&self) -> EventKind {
        EventKind::Presence
    }

    async fn handle(&self, session: &mut Session, event: &SignalingEvent) -> bool {
        match event {
            SignalingEvent::Presence { from, is_self, update } => {
                if !session.in_room(from) {
                    debug!(target: "Session/Presence", "Ignoring presence from {from} outside the room");
                    return false;
                }
                if *is_self || session.occupant.as_ref() == Some(from) {
                    on_self_joined(session, from).await;
                } else if session.is_focus(from) {
                    on_focus_present(session, from).await;
                } else {
                    on_participant_present(session, from, update).await;
                }
                true
            }
            SignalingEvent::PresenceLeave { from, is_self } => {
                if !session.in_room(from) || *is_self || session.occupant.as_ref() == Some(from) {
                    return false;
                }
                on_participant_left(session, from);
                true
            }
            SignalingEvent::PresenceError { from, condition } => {
                warn!(target: "Session/Presence", "Presence error from {from}: {condition}");
                session.report_error(&SessionError::Presence(condition.clone()));
                true
            }
            _ => false,
        }
    }
}

async fn on_self_joined(session: &mut Session, from: &Jid) {
    if session.presence.apply_transition(PresenceTransition::Join).is_err() {
        // Presence refresh of our own occupant.
        return;
    }
    info!(target: "Session/Presence", "[{}] Joined room as {from}", session.id);
    session.emit(Event::RoomJoined { occupant: from.clone() });

    if let Some(room) = session.room.clone()
        && let Err(e) = session.signaling.send_presence_alive(&room).await
    {
        session.report_error(&e.into());
    }
    if session.call_state == CallState::Connecting && session.is_initiator_role() {
        session.generate_offer().await;
    }
}

async fn on_focus_present(session: &mut Session, from: &Jid) {
    let first = session.focus.as_ref() != Some(from);
    session.focus = Some(from.clone());
    if !first {
        return;
    }
    info!(target: "Session/Presence", "[{}] Focus {from} is present", session.id);
    send_capabilities(session, from).await;

    if session.config.bridged
        && session.call_type.has_media()
        && session.call_state == CallState::Connecting
        && let Err(e) = session.transition(CallTransition::BecomeResponder)
    {
        session.report_error(&e);
    }
    if session.call_type == CallType::Pstn {
        session.dial_configured_number().await;
    }
}

async fn on_participant_present(session: &mut Session, from: &Jid, update: &ParticipantUpdate) {
    if let Some(participant) = session.participants.get_mut(from) {
        if participant.apply(update) {
            let updated = participant.clone();
            debug!(target: "Session/Presence", "[{}] {} updated", session.id, updated.jid);
            session.emit(Event::ParticipantUpdated(updated));
        }
        return;
    }

    let mut participant = Participant::new(from.clone());
    participant.apply(update);
    info!(
        target: "Session/Presence",
        "[{}] {} joined as '{}'",
        session.id,
        from,
        participant.display_name()
    );
    session.participants.insert(from.clone(), participant.clone());
    session.join_order.push(from.clone());
    session.emit(Event::ParticipantJoined(participant));
    send_capabilities(session, from).await;

    if session.call_type == CallType::Pstn
        && session.pstn == PstnState::Dialing
        && let Err(e) = session.set_pstn_state(PstnTransition::Answered)
    {
        session.report_error(&e);
    }

    match session.call_state {
        CallState::Connecting if session.is_initiator_role() => session.generate_offer().await,
        CallState::Connecting if session.call_type.has_media() => {
            if let Err(e) = session.transition(CallTransition::BecomeResponder) {
                session.report_error(&e);
            }
        }
        CallState::Outgoing => session.deliver_pending_offer().await,
        _ => {}
    }
}

fn on_participant_left(session: &mut Session, from: &Jid) {
    if session.focus.as_ref() == Some(from) {
        info!(target: "Session/Presence", "[{}] Focus left", session.id);
        session.focus = None;
        return;
    }
    if session.participants.remove(from).is_none() {
        return;
    }
    session.join_order.retain(|jid| jid != from);
    info!(target: "Session/Presence", "[{}] {from} left", session.id);
    session.emit(Event::ParticipantLeft { jid: from.clone() });
    if session.participants.is_empty() {
        session.emit(Event::AllParticipantsLeft {
            session_id: session.id.clone(),
        });
    }
}

async fn send_capabilities(session: &Session, to: &Jid) {
    if let Err(e) = session
        .signaling
        .send_capabilities(to, None, &session.client_config.features)
        .await
    {
        session.report_error(&e.into());
    }
}
