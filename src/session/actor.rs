//! The session task and the handle the application talks to it through.

use log::{debug, info, warn};
use rtccore::sdp::SessionDescription;
use rtccore::state::{CallState, EndReason, PresenceState, PstnState};
use rtccore::types::{CallType, Participant};
use rtccore::xml::{Jid, Node};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::Session;
use crate::error::SessionError;
use crate::handlers::router::EventRouter;
use crate::pstn::PstnCommand;
use crate::signaling::SignalingEvent;
use crate::transport::{IceConnectionState, LocalStream, MediaEvent, MediaKind, SignalingState};

#[derive(Debug)]
pub(crate) enum SessionCommand {
    Signaling(SignalingEvent),
    /// A raw inbound stanza, parsed in the context of the session.
    Stanza(Node),
    SwitchStream(Option<LocalStream>),
    MuteParticipant {
        jid: Jid,
        kind: MediaKind,
        muted: bool,
    },
    SelectParticipant(Option<String>),
    PinParticipant(Option<String>),
    SetLastN(i32),
    SendChatMessage {
        id: String,
        text: String,
    },
    Pstn(PstnCommand),
    End,
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// Point-in-time view of a session, for inspection and tests.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub id: String,
    pub call_type: CallType,
    pub call_state: CallState,
    pub presence: PresenceState,
    pub pstn: PstnState,
    pub room: Option<Jid>,
    pub occupant: Option<Jid>,
    pub sid: Option<String>,
    pub peer: Option<Jid>,
    pub local_sdp: Option<String>,
    pub remote_sdp: Option<String>,
    pub participants: Vec<Participant>,
    pub buffered_candidates: usize,
    pub pending_renegotiations: usize,
    pub ice_state: IceConnectionState,
    pub signaling_state: SignalingState,
    pub data_channel_open: bool,
}

impl SessionSnapshot {
    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.remote_sdp.as_deref().and_then(|s| SessionDescription::parse(s).ok())
    }

    pub fn local_description(&self) -> Option<SessionDescription> {
        self.local_sdp.as_deref().and_then(|s| SessionDescription::parse(s).ok())
    }

    pub fn participant(&self, jid: &Jid) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.jid == jid)
    }
}

/// Cheap, cloneable sender to a running session.
///
/// Operations are fire-and-forget: they fail only when the session has
/// ended. Failures while executing them arrive as
/// [`Event::SessionError`](crate::types::events::Event::SessionError).
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: String,
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.tx.send(command).map_err(|_| SessionError::Closed)
    }

    /// Feed an inbound signaling event to the session.
    pub fn handle_signaling(&self, event: SignalingEvent) -> Result<(), SessionError> {
        self.send(SessionCommand::Signaling(event))
    }

    /// Feed a raw inbound stanza to the session.
    pub fn handle_stanza(&self, node: Node) -> Result<(), SessionError> {
        self.send(SessionCommand::Stanza(node))
    }

    pub fn switch_stream(&self, stream: Option<LocalStream>) -> Result<(), SessionError> {
        self.send(SessionCommand::SwitchStream(stream))
    }

    pub fn mute_participant_audio(&self, jid: Jid, muted: bool) -> Result<(), SessionError> {
        self.send(SessionCommand::MuteParticipant {
            jid,
            kind: MediaKind::Audio,
            muted,
        })
    }

    pub fn mute_participant_video(&self, jid: Jid, muted: bool) -> Result<(), SessionError> {
        self.send(SessionCommand::MuteParticipant {
            jid,
            kind: MediaKind::Video,
            muted,
        })
    }

    /// Ask the bridge to prioritise one endpoint, or none.
    pub fn select_participant(&self, endpoint: Option<String>) -> Result<(), SessionError> {
        self.send(SessionCommand::SelectParticipant(endpoint))
    }

    pub fn pin_participant(&self, endpoint: Option<String>) -> Result<(), SessionError> {
        self.send(SessionCommand::PinParticipant(endpoint))
    }

    /// Limit forwarded video streams. `-1` is unlimited.
    pub fn set_last_n(&self, last_n: i32) -> Result<(), SessionError> {
        self.send(SessionCommand::SetLastN(last_n))
    }

    pub fn send_chat_message(&self, id: impl Into<String>, text: impl Into<String>) -> Result<(), SessionError> {
        self.send(SessionCommand::SendChatMessage {
            id: id.into(),
            text: text.into(),
        })
    }

    pub fn dial(&self, number: impl Into<String>) -> Result<(), SessionError> {
        self.send(SessionCommand::Pstn(PstnCommand::Dial { number: number.into() }))
    }

    pub fn hold(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Pstn(PstnCommand::Hold))
    }

    pub fn unhold(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Pstn(PstnCommand::Unhold))
    }

    pub fn hangup(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Pstn(PstnCommand::Hangup))
    }

    pub fn end(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::End)
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot(tx))?;
        rx.await.map_err(|_| SessionError::Closed)
    }
}

/// Start the actor for an already started session.
pub(crate) fn spawn(
    session: Session,
    media_rx: mpsc::UnboundedReceiver<MediaEvent>,
) -> (SessionHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = SessionHandle {
        id: session.id.clone(),
        tx,
    };
    let task = tokio::spawn(run(session, rx, media_rx));
    (handle, task)
}

async fn run(
    mut session: Session,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    mut media: mpsc::UnboundedReceiver<MediaEvent>,
) {
    let router = EventRouter::with_default_handlers();
    let mut media_open = true;
    info!(target: "Session", "[{}] Session task started", session.id);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => session.handle_command(&router, command).await,
                None => {
                    debug!(target: "Session", "[{}] All handles dropped", session.id);
                    session.end(EndReason::LocalHangup).await;
                }
            },
            event = media.recv(), if media_open => match event {
                Some(event) => session.handle_media_event(event).await,
                None => {
                    warn!(target: "Session/Media", "[{}] Media event stream closed", session.id);
                    media_open = false;
                }
            },
        }
        if session.call_state.is_ended() {
            break;
        }
    }

    info!(target: "Session", "[{}] Session task stopped", session.id);
}

impl Session {
    async fn handle_command(&mut self, router: &EventRouter, command: SessionCommand) {
        let result = match command {
            SessionCommand::Signaling(event) => {
                self.handle_signaling(router, event).await;
                Ok(())
            }
            SessionCommand::Stanza(node) => {
                match SignalingEvent::parse(&node, self.occupant.as_ref()) {
                    Ok(Some(event)) => self.handle_signaling(router, event).await,
                    Ok(None) => debug!(target: "Session/Router", "[{}] Ignoring <{}> stanza", self.id, node.tag),
                    Err(e) => warn!(target: "Session/Router", "[{}] Unparsable <{}> stanza: {e}", self.id, node.tag),
                }
                Ok(())
            }
            SessionCommand::SwitchStream(stream) => self.switch_stream(stream).await,
            SessionCommand::MuteParticipant { jid, kind, muted } => self.mute_participant(&jid, kind, muted).await,
            SessionCommand::SelectParticipant(endpoint) => self.select_participant(endpoint).await,
            SessionCommand::PinParticipant(endpoint) => self.pin_participant(endpoint).await,
            SessionCommand::SetLastN(last_n) => self.set_last_n(last_n).await,
            SessionCommand::SendChatMessage { id, text } => self.send_chat_message(&id, &text).await,
            SessionCommand::Pstn(command) => self.handle_pstn(command).await,
            SessionCommand::End => {
                self.end(EndReason::LocalHangup).await;
                Ok(())
            }
            SessionCommand::Snapshot(reply) => {
                if reply.send(self.snapshot()).is_err() {
                    debug!(target: "Session", "[{}] Snapshot requester went away", self.id);
                }
                Ok(())
            }
        };
        if let Err(e) = result {
            self.report_error(&e);
        }
    }

    async fn handle_signaling(&mut self, router: &EventRouter, event: SignalingEvent) {
        let kind = event.kind();
        if !router.dispatch(self, &event).await {
            debug!(target: "Session/Router", "[{}] Unhandled {kind} event", self.id);
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            call_type: self.call_type,
            call_state: self.call_state,
            presence: self.presence,
            pstn: self.pstn,
            room: self.room.clone(),
            occupant: self.occupant.clone(),
            sid: self.sid.clone(),
            peer: self.peer.clone(),
            local_sdp: self.local_sdp.as_ref().map(ToString::to_string),
            remote_sdp: self.remote_sdp.as_ref().map(ToString::to_string),
            participants: self.participants.values().cloned().collect(),
            buffered_candidates: self.candidates.len(),
            pending_renegotiations: self.queue.len(),
            ice_state: self.ice_state,
            signaling_state: self.signaling_state,
            data_channel_open: self.data_channel_open,
        }
    }
}
