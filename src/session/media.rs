use log::{debug, info, warn};
use rtccore::bridge::BridgeMessage;
use rtccore::state::{CallState, CallTransition};

use super::Session;
use crate::error::SessionError;
use crate::transport::{IceConnectionState, MediaEvent, RemoteStream};
use crate::types::events::Event;

impl Session {
    pub(crate) async fn handle_media_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::IceCandidate(Some(candidate)) => {
                self.candidates.push(candidate);
                self.flush_candidates().await;
            }
            MediaEvent::IceCandidate(None) => {
                debug!(target: "Session/Candidates", "[{}] Candidate gathering complete", self.id);
            }
            MediaEvent::IceConnectionState(state) => self.on_ice_state(state).await,
            MediaEvent::SignalingState(state) => {
                debug!(target: "Session/Media", "[{}] Signaling state {state}", self.id);
                self.signaling_state = state;
                self.process_queue().await;
            }
            MediaEvent::RemoteStreamAdded(stream) => self.on_remote_stream(stream),
            MediaEvent::RemoteStreamRemoved(stream_id) => {
                for participant in self.participants.values_mut() {
                    if participant.stream_id.as_deref() == Some(stream_id.as_str()) {
                        participant.stream_id = None;
                    }
                }
                self.emit(Event::RemoteStreamRemoved { stream_id });
            }
            MediaEvent::DataChannelOpened => {
                info!(target: "Session/Bridge", "[{}] Bridge channel open", self.id);
                self.data_channel_open = true;
                self.emit(Event::DataChannelOpened);
            }
            MediaEvent::DataChannelMessage(text) => match BridgeMessage::parse(&text) {
                Ok(message) => {
                    debug!(target: "Session/Bridge", "[{}] <- {}", self.id, message.class());
                    self.emit(Event::Bridge(message));
                }
                Err(e) => warn!(target: "Session/Bridge", "[{}] Dropping bridge message: {e}", self.id),
            },
            MediaEvent::DataChannelClosed => {
                self.data_channel_open = false;
                self.emit(Event::DataChannelClosed);
            }
        }
    }

    async fn on_ice_state(&mut self, state: IceConnectionState) {
        info!(target: "Session/Media", "[{}] ICE {:?}", self.id, state);
        self.ice_state = state;
        self.emit(Event::IceConnectionStateChanged(state));

        if state.is_connected()
            && self.call_state == CallState::InProgress
            && let Err(e) = self.transition(CallTransition::MediaConnected)
        {
            self.report_error(&e);
        }
        if state == IceConnectionState::Failed {
            self.report_error(&SessionError::Negotiation("ICE connection failed".to_string()));
        }
        self.process_queue().await;
    }

    /// Attribute a remote stream to the participant owning its SSRC.
    fn on_remote_stream(&mut self, stream: RemoteStream) {
        let owner = stream.ssrc.and_then(|ssrc| self.owners.owner_of(ssrc)).cloned();
        match owner.as_ref().and_then(|jid| self.participants.get_mut(jid)) {
            Some(participant) => {
                participant.stream_id = Some(stream.id.clone());
                debug!(target: "Session/Media", "[{}] Stream {} belongs to {}", self.id, stream.id, participant.jid);
            }
            None => debug!(target: "Session/Media", "[{}] Stream {} has no known owner", self.id, stream.id),
        }
        self.emit(Event::RemoteStreamAdded {
            stream_id: stream.id,
            participant: owner,
        });
    }
}
