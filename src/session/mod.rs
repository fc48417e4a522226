//! One call, owned by a single actor task.
//!
//! Every field of [`Session`] is read and written only from the actor loop in
//! [`actor`], so negotiation steps are plain sequential `async` code with no
//! locking. Handlers in [`crate::handlers`] and the media event path in
//! [`media`] act on the session through the `pub(crate)` methods here.

mod actor;
mod candidates;
mod media;
mod negotiation;
mod renegotiation;
mod strategy;

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{info, warn};
use rand::distr::{Alphanumeric, SampleString};
use rtccore::SourceOwners;
use rtccore::jingle::builders::{self, TerminateReason};
use rtccore::jingle::Creator;
use rtccore::sdp::SessionDescription;
use rtccore::state::{
    CallState, CallTransition, EndReason, PresenceState, PresenceTransition, PstnState, PstnTransition, StateMachine,
};
use rtccore::types::{CallType, Description, IceCandidate, Participant, ParticipantUpdate, SessionType};
use rtccore::xml::Jid;

pub use actor::{SessionHandle, SessionSnapshot};
pub(crate) use actor::spawn;
pub(crate) use candidates::CandidateBuffer;
pub(crate) use renegotiation::{RenegotiationQueue, RenegotiationTask};
pub(crate) use strategy::NegotiationStrategy;

use crate::config::{ClientConfig, SessionConfig};
use crate::error::SessionError;
use crate::signaling::SignalingChannel;
use crate::transport::{IceConnectionState, LocalStream, MediaKind, MediaTransport, SignalingState};
use crate::types::events::{CoreEventBus, Event};

/// External capabilities a session drives.
pub(crate) struct Collaborators {
    pub(crate) transport: Arc<dyn MediaTransport>,
    pub(crate) signaling: Arc<dyn SignalingChannel>,
    pub(crate) strategy: NegotiationStrategy,
    pub(crate) events: CoreEventBus,
}

pub struct Session {
    pub(crate) id: String,
    pub(crate) config: SessionConfig,
    pub(crate) client_config: Arc<ClientConfig>,
    pub(crate) call_type: CallType,

    pub(crate) call_state: CallState,
    pub(crate) presence: PresenceState,
    pub(crate) pstn: PstnState,

    /// Bare room jid.
    pub(crate) room: Option<Jid>,
    /// Our full occupant jid in the room.
    pub(crate) occupant: Option<Jid>,
    /// Remote occupants, focus excluded.
    pub(crate) participants: BTreeMap<Jid, Participant>,
    /// Keys of `participants`, oldest join first.
    pub(crate) join_order: Vec<Jid>,
    pub(crate) focus: Option<Jid>,

    pub(crate) local_sdp: Option<SessionDescription>,
    pub(crate) remote_sdp: Option<SessionDescription>,
    pub(crate) sid: Option<String>,
    /// Where Jingle requests go once negotiation has begun.
    pub(crate) peer: Option<Jid>,
    /// `Initiator` when this side sent the offer.
    pub(crate) role: Option<Creator>,
    pub(crate) owners: SourceOwners,

    pub(crate) candidates: CandidateBuffer,
    pub(crate) remote_candidates: Vec<IceCandidate>,
    pub(crate) queue: RenegotiationQueue,

    pub(crate) ice_state: IceConnectionState,
    pub(crate) signaling_state: SignalingState,
    pub(crate) local_stream: Option<LocalStream>,
    pub(crate) audio_muted: bool,
    pub(crate) video_muted: bool,
    pub(crate) data_channel_open: bool,

    pub(crate) transport: Arc<dyn MediaTransport>,
    pub(crate) signaling: Arc<dyn SignalingChannel>,
    pub(crate) strategy: NegotiationStrategy,
    pub(crate) events: CoreEventBus,
}

impl Session {
    pub(crate) fn new(
        config: SessionConfig,
        call_type: CallType,
        client_config: Arc<ClientConfig>,
        collaborators: Collaborators,
    ) -> Self {
        let local_stream = config.local_stream.clone();
        Self {
            id: random_token(16),
            config,
            client_config,
            call_type,
            call_state: CallState::default(),
            presence: PresenceState::default(),
            pstn: PstnState::default(),
            room: None,
            occupant: None,
            participants: BTreeMap::new(),
            join_order: Vec::new(),
            focus: None,
            local_sdp: None,
            remote_sdp: None,
            sid: None,
            peer: None,
            role: None,
            owners: SourceOwners::default(),
            candidates: CandidateBuffer::default(),
            remote_candidates: Vec::new(),
            queue: RenegotiationQueue::default(),
            ice_state: IceConnectionState::default(),
            signaling_state: SignalingState::default(),
            local_stream,
            audio_muted: false,
            video_muted: false,
            data_channel_open: false,
            transport: collaborators.transport,
            signaling: collaborators.signaling,
            strategy: collaborators.strategy,
            events: collaborators.events,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn emit(&self, event: Event) {
        self.events.dispatch(&event);
    }

    /// Log a recoverable failure and surface it to the application.
    pub(crate) fn report_error(&self, err: &SessionError) {
        warn!(target: "Session", "[{}] {err}", self.id);
        self.emit(Event::SessionError {
            session_id: self.id.clone(),
            message: err.to_string(),
        });
    }

    pub(crate) fn transition(&mut self, transition: CallTransition) -> Result<(), SessionError> {
        let from = self.call_state;
        self.call_state.apply_transition(transition)?;
        info!(target: "Session/State", "[{}] {:?} -> {:?}", self.id, from, self.call_state);
        self.emit(Event::CallStateChanged {
            session_id: self.id.clone(),
            state: self.call_state,
        });
        Ok(())
    }

    pub(crate) fn set_pstn_state(&mut self, transition: PstnTransition) -> Result<(), SessionError> {
        self.pstn.apply_transition(transition)?;
        info!(target: "Session/Pstn", "[{}] PSTN {:?}", self.id, self.pstn);
        self.emit(Event::PstnStateChanged(self.pstn));
        Ok(())
    }

    /// Whether this side generates the initial offer.
    pub(crate) fn is_initiator_role(&self) -> bool {
        self.config.session_type != SessionType::Join && !self.config.bridged && self.call_type.has_media()
    }

    pub(crate) fn is_offerer(&self) -> bool {
        self.role == Some(Creator::Initiator)
    }

    pub(crate) fn is_focus(&self, jid: &Jid) -> bool {
        jid.resource() == Some(self.client_config.focus_nick.as_str())
    }

    pub(crate) fn in_room(&self, jid: &Jid) -> bool {
        self.room.as_ref().is_some_and(|room| room.is_same_bare_as(jid))
    }

    /// Parse an engine description, apply the codec policy and return both
    /// the shaped engine description and its Plan-B view.
    pub(crate) fn shape_local(
        &self,
        description: Description,
    ) -> Result<(Description, SessionDescription), SessionError> {
        let mut engine = SessionDescription::parse(&description.sdp)?;
        let policy = self.config.codec_policy(&self.client_config);
        if !policy.is_noop() {
            policy.apply(&mut engine);
        }
        let local = self.strategy.from_engine(&engine)?;
        Ok((
            Description {
                kind: description.kind,
                sdp: engine.to_string(),
            },
            local,
        ))
    }

    /// Ownership entries claiming every source of `local` for our occupant.
    pub(crate) fn local_owners(&self, local: &SessionDescription) -> SourceOwners {
        let mut owners = SourceOwners::default();
        if let Some(me) = &self.occupant {
            for (_, ssrc) in local.all_ssrcs() {
                owners.insert(ssrc, me.clone());
            }
        }
        owners
    }

    fn presence_update(&self) -> ParticipantUpdate {
        ParticipantUpdate {
            nick: self.occupant.as_ref().and_then(|o| o.resource()).map(str::to_string),
            audio_muted: Some(self.audio_muted),
            video_muted: Some(self.video_muted),
            ..Default::default()
        }
    }

    /// Move to `Connecting` and ask for a room: allocation for created
    /// sessions, a presence join for joined ones.
    pub(crate) async fn start(&mut self) -> Result<(), SessionError> {
        self.emit(Event::SessionStarted {
            session_id: self.id.clone(),
        });
        self.transition(CallTransition::Start)?;
        if let Some(stream) = &self.local_stream {
            self.transport.add_stream(stream).await?;
        }
        match self.config.session_type {
            SessionType::Create => {
                info!(target: "Session", "[{}] Requesting room allocation", self.id);
                self.signaling.send_allocate(&self.config).await?;
            }
            SessionType::Join => {
                let room_id = self.config.room_id.clone().unwrap_or_default();
                let room = Jid::new(&room_id, &self.client_config.muc_domain);
                self.join_room(room).await?;
            }
        }
        Ok(())
    }

    pub(crate) async fn join_room(&mut self, room: Jid) -> Result<(), SessionError> {
        let room = room.to_bare();
        let nick = self.config.nick.clone().unwrap_or_else(|| random_token(8).to_lowercase());
        let occupant = room.clone().with_resource(nick);
        info!(target: "Session", "[{}] Joining {room} as {occupant}", self.id);
        self.room = Some(room);
        self.occupant = Some(occupant.clone());
        self.signaling.send_presence(&occupant, &self.presence_update()).await?;
        Ok(())
    }

    /// Tear the session down. Does nothing once ended.
    pub(crate) async fn end(&mut self, reason: EndReason) {
        if self.call_state.is_ended() {
            return;
        }
        info!(target: "Session/State", "[{}] Ending: {:?}", self.id, reason);

        if reason != EndReason::RemoteTerminate
            && let (Some(peer), Some(sid)) = (&self.peer, &self.sid)
        {
            let cause = match reason {
                EndReason::NegotiationFailed => TerminateReason::FailedApplication,
                _ => TerminateReason::Success,
            };
            let jingle = builders::session_terminate(sid, cause, None);
            if let Err(e) = self.signaling.send_session_terminate(peer, jingle).await {
                warn!(target: "Session", "[{}] session-terminate not sent: {e}", self.id);
            }
        }

        if self.presence == PresenceState::Joined {
            if let Some(occupant) = &self.occupant
                && let Err(e) = self.signaling.send_unavailable_presence(occupant).await
            {
                warn!(target: "Session", "[{}] Leaving the room failed: {e}", self.id);
            }
            if let Some(room) = &self.room
                && let Err(e) = self.signaling.stop_presence_alive(room).await
            {
                warn!(target: "Session", "[{}] Stopping presence refresh failed: {e}", self.id);
            }
            if let Err(e) = self.presence.apply_transition(PresenceTransition::Leave) {
                warn!(target: "Session", "[{}] {e}", self.id);
            }
        }

        if matches!(self.pstn, PstnState::Dialing | PstnState::Connected | PstnState::OnHold)
            && let Some(focus) = self.focus.clone()
        {
            if let Err(e) = self.signaling.send_hangup(&focus).await {
                warn!(target: "Session/Pstn", "[{}] Hangup not sent: {e}", self.id);
            }
            if let Err(e) = self.set_pstn_state(PstnTransition::Hangup) {
                warn!(target: "Session/Pstn", "[{}] {e}", self.id);
            }
        }

        if let Err(e) = self.transport.close().await {
            warn!(target: "Session", "[{}] Closing the transport failed: {e}", self.id);
        }
        if let Err(e) = self.transition(CallTransition::Terminate(reason)) {
            warn!(target: "Session/State", "[{}] {e}", self.id);
        }
        self.clear();
        self.emit(Event::SessionEnded {
            session_id: self.id.clone(),
            reason,
        });
    }

    fn clear(&mut self) {
        self.room = None;
        self.occupant = None;
        self.participants.clear();
        self.join_order.clear();
        self.focus = None;
        self.local_sdp = None;
        self.remote_sdp = None;
        self.sid = None;
        self.peer = None;
        self.role = None;
        self.owners = SourceOwners::default();
        self.candidates.clear();
        self.remote_candidates.clear();
        self.queue.clear();
        self.local_stream = None;
        self.data_channel_open = false;
    }

    /// Mute or unmute a track. Our own occupant jid toggles the local stream
    /// and republishes presence; any other jid toggles that participant's
    /// remote stream locally.
    pub(crate) async fn mute_participant(&mut self, jid: &Jid, kind: MediaKind, muted: bool) -> Result<(), SessionError> {
        if self.occupant.as_ref() == Some(jid) {
            if let Some(stream) = &self.local_stream {
                self.transport.set_track_enabled(&stream.id, kind, !muted).await?;
            }
            match kind {
                MediaKind::Audio => self.audio_muted = muted,
                MediaKind::Video => self.video_muted = muted,
            }
            self.signaling.send_presence(jid, &self.presence_update()).await?;
            return Ok(());
        }

        let participant = self
            .participants
            .get_mut(jid)
            .ok_or_else(|| SessionError::UnknownParticipant(jid.to_string()))?;
        if let Some(stream_id) = &participant.stream_id {
            self.transport.set_track_enabled(stream_id, kind, !muted).await?;
        }
        match kind {
            MediaKind::Audio => participant.audio_muted = muted,
            MediaKind::Video => participant.video_muted = muted,
        }
        let updated = participant.clone();
        self.emit(Event::ParticipantUpdated(updated));
        Ok(())
    }

    /// Replace the local stream. Once negotiated this is a queued
    /// renegotiation, before that the transport is simply updated.
    pub(crate) async fn switch_stream(&mut self, stream: Option<LocalStream>) -> Result<(), SessionError> {
        if self.call_state.is_negotiated() {
            self.enqueue_renegotiation(RenegotiationTask::SwitchLocalStream(stream)).await;
            return Ok(());
        }
        if let Some(old) = &self.local_stream {
            self.transport.remove_stream(old).await?;
        }
        if let Some(new) = &stream {
            self.transport.add_stream(new).await?;
        }
        self.local_stream = stream;
        Ok(())
    }

    pub(crate) async fn send_chat_message(&mut self, id: &str, text: &str) -> Result<(), SessionError> {
        let room = self
            .room
            .as_ref()
            .ok_or_else(|| SessionError::Presence("not in a room".to_string()))?;
        self.signaling.send_group_chat_message(room, id, text).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("call_type", &self.call_type)
            .field("call_state", &self.call_state)
            .field("room", &self.room)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

pub(crate) fn random_token(len: usize) -> String {
    Alphanumeric.sample_string(&mut rand::rng(), len)
}
