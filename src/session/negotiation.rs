//! The initial offer/answer exchange.
//!
//! Either side of it can fail; a failure here ends the session with
//! [`EndReason::NegotiationFailed`].

use log::{debug, info};
use rtccore::jingle::builders;
use rtccore::jingle::Creator;
use rtccore::sdp::SessionDescription;
use rtccore::stanza::JingleMessage;
use rtccore::state::{CallState, CallTransition, EndReason};
use rtccore::types::SdpType;

use super::{Session, random_token};
use crate::error::SessionError;

impl Session {
    /// Create and apply the local offer, then deliver it if a participant is
    /// already known.
    pub(crate) async fn generate_offer(&mut self) {
        if self.call_state != CallState::Connecting || self.local_sdp.is_some() {
            return;
        }
        match self.create_local_offer().await {
            Ok(()) => self.deliver_pending_offer().await,
            Err(e) => self.fail_negotiation(e).await,
        }
    }

    async fn create_local_offer(&mut self) -> Result<(), SessionError> {
        let offer = self
            .transport
            .create_offer(self.config.constraints())
            .await
            .map_err(|e| SessionError::negotiation("create offer", e))?;
        let (engine, local) = self.shape_local(offer)?;
        self.transport
            .set_local_description(engine)
            .await
            .map_err(|e| SessionError::negotiation("set local offer", e))?;
        self.local_sdp = Some(local);
        self.role = Some(Creator::Initiator);
        self.transition(CallTransition::BecomeInitiator)
    }

    /// Send `session-initiate` to the participant that joined first. Waits
    /// for one if the room is still empty.
    pub(crate) async fn deliver_pending_offer(&mut self) {
        if self.call_state != CallState::Outgoing || self.peer.is_some() {
            return;
        }
        let Some(to) = self.join_order.first().cloned() else {
            debug!(target: "Session/Negotiation", "[{}] Offer ready, waiting for a participant", self.id);
            return;
        };
        let (Some(local), Some(me)) = (&self.local_sdp, &self.occupant) else {
            return;
        };

        let sid = random_token(12).to_lowercase();
        let jingle = builders::session_initiate(&sid, me, local, &self.local_owners(local));
        match self.signaling.send_session_initiate(&to, jingle).await {
            Ok(()) => {
                info!(target: "Session/Negotiation", "[{}] Sent session-initiate {sid} to {to}", self.id);
                self.sid = Some(sid);
                self.peer = Some(to);
                self.flush_candidates().await;
            }
            Err(e) => self.report_error(&e.into()),
        }
    }

    pub(crate) async fn on_session_initiate(&mut self, msg: &JingleMessage) {
        if !self.call_state.can_accept_initiate() {
            debug!(
                target: "Session/Negotiation",
                "[{}] Ignoring session-initiate in {:?}",
                self.id,
                self.call_state
            );
            return;
        }
        if let Err(e) = self.answer_initiate(msg).await {
            self.fail_negotiation(e).await;
        }
    }

    async fn answer_initiate(&mut self, msg: &JingleMessage) -> Result<(), SessionError> {
        let remote = SessionDescription::from_jingle(&msg.jingle)?;
        let mut owners = self.owners.clone();
        owners.record_from_jingle(&msg.jingle);

        let offer = self.strategy.to_engine(&remote, SdpType::Offer)?;
        self.transport
            .set_remote_description(offer)
            .await
            .map_err(|e| SessionError::negotiation("set remote offer", e))?;
        let answer = self
            .transport
            .create_answer(self.config.constraints())
            .await
            .map_err(|e| SessionError::negotiation("create answer", e))?;
        let (engine, local) = self.shape_local(answer)?;
        self.transport
            .set_local_description(engine)
            .await
            .map_err(|e| SessionError::negotiation("set local answer", e))?;

        self.owners = owners;
        self.sid = Some(msg.sid.clone());
        self.peer = Some(msg.from.clone());
        self.role = Some(Creator::Responder);
        self.remote_sdp = Some(remote);

        let responder = self.occupant.clone().unwrap_or_default();
        let jingle = builders::session_accept(
            &msg.sid,
            msg.initiator.as_ref(),
            &responder,
            &local,
            &self.local_owners(&local),
        );
        self.local_sdp = Some(local);
        self.signaling.send_session_accept(&msg.from, jingle).await?;
        info!(target: "Session/Negotiation", "[{}] Accepted session {} from {}", self.id, msg.sid, msg.from);

        self.transition(CallTransition::LocalAccepted)?;
        self.after_exchange().await
    }

    pub(crate) async fn on_session_accept(&mut self, msg: &JingleMessage) {
        if !self.call_state.can_accept_answer() || self.sid.as_deref() != Some(msg.sid.as_str()) {
            debug!(
                target: "Session/Negotiation",
                "[{}] Ignoring session-accept {} in {:?}",
                self.id,
                msg.sid,
                self.call_state
            );
            return;
        }
        if let Err(e) = self.apply_answer(msg).await {
            self.fail_negotiation(e).await;
        }
    }

    async fn apply_answer(&mut self, msg: &JingleMessage) -> Result<(), SessionError> {
        let remote = SessionDescription::from_jingle(&msg.jingle)?;
        let answer = self.strategy.to_engine(&remote, SdpType::Answer)?;
        self.transport
            .set_remote_description(answer)
            .await
            .map_err(|e| SessionError::negotiation("set remote answer", e))?;
        self.owners.record_from_jingle(&msg.jingle);
        self.remote_sdp = Some(remote);
        info!(target: "Session/Negotiation", "[{}] Session {} accepted by {}", self.id, msg.sid, msg.from);

        self.transition(CallTransition::RemoteAccepted)?;
        self.after_exchange().await
    }

    /// Both descriptions are set: release held candidates in both directions.
    async fn after_exchange(&mut self) -> Result<(), SessionError> {
        self.apply_remote_candidates().await;
        self.flush_candidates().await;
        if self.ice_state.is_connected() {
            self.transition(CallTransition::MediaConnected)?;
        }
        Ok(())
    }

    async fn fail_negotiation(&mut self, err: SessionError) {
        self.report_error(&err);
        self.end(EndReason::NegotiationFailed).await;
    }
}
