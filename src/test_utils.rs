//! Recording and scripted collaborators for unit and integration tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rtccore::SourceOwners;
use rtccore::jingle::{Candidate, Creator, JingleAction, JingleBuilder, NS_RTP, NS_SSMA, NS_SSRC_INFO};
use rtccore::sdp::SessionDescription;
use rtccore::stanza::JingleMessage;
use rtccore::types::{CallType, Description, IceCandidate, ParticipantUpdate, SdpType};
use rtccore::xml::{Jid, Node, NodeBuilder};
use tokio::sync::mpsc;

use crate::client::Client;
use crate::config::{ClientConfig, SessionConfig};
use crate::error::{SignalingError, TransportError};
use crate::interop::InteropAdapter;
use crate::session::{Collaborators, NegotiationStrategy, Session, SessionHandle, SessionSnapshot};
use crate::signaling::{SignalingChannel, SignalingEvent};
use crate::transport::{
    LocalStream, MediaEvent, MediaKind, MediaTransport, MediaTransportFactory, NegotiationModel, OfferConstraints,
    SignalingState,
};
use crate::types::events::{CoreEventBus, Event, EventHandler};

pub const ROOM: &str = "standup@conference.localhost";
pub const LOCAL_NICK: &str = "alice";

/// Local engine offer: audio 1001, video 2001/2002 in a FID group.
pub const PLAN_B_OFFER: &str = "v=0\r\n\
o=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE audio video\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111 0\r\n\
c=IN IP4 0.0.0.0\r\n\
a=ice-ufrag:localufrag\r\n\
a=ice-pwd:localpassword\r\n\
a=fingerprint:sha-256 AB:CD:EF:01\r\n\
a=setup:actpass\r\n\
a=mid:audio\r\n\
a=sendrecv\r\n\
a=rtcp-mux\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=fmtp:111 minptime=10;useinbandfec=1\r\n\
a=rtpmap:0 PCMU/8000\r\n\
a=ssrc:1001 cname:alice\r\n\
a=ssrc:1001 msid:cam audio0\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 100 96\r\n\
c=IN IP4 0.0.0.0\r\n\
a=ice-ufrag:localufrag\r\n\
a=ice-pwd:localpassword\r\n\
a=fingerprint:sha-256 AB:CD:EF:01\r\n\
a=setup:actpass\r\n\
a=mid:video\r\n\
a=sendrecv\r\n\
a=rtcp-mux\r\n\
a=rtpmap:100 VP8/90000\r\n\
a=rtcp-fb:100 nack\r\n\
a=rtpmap:96 rtx/90000\r\n\
a=fmtp:96 apt=100\r\n\
a=ssrc-group:FID 2001 2002\r\n\
a=ssrc:2001 cname:alice\r\n\
a=ssrc:2001 msid:cam video0\r\n\
a=ssrc:2002 cname:alice\r\n\
a=ssrc:2002 msid:cam video0\r\n";

/// Local engine answer: audio 1011, video 2011.
pub const PLAN_B_ANSWER: &str = "v=0\r\n\
o=- 5511731400430051336 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE audio video\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
c=IN IP4 0.0.0.0\r\n\
a=ice-ufrag:answerufrag\r\n\
a=ice-pwd:answerpassword\r\n\
a=fingerprint:sha-256 12:34:56:78\r\n\
a=setup:active\r\n\
a=mid:audio\r\n\
a=sendrecv\r\n\
a=rtcp-mux\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=ssrc:1011 cname:alice\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 100\r\n\
c=IN IP4 0.0.0.0\r\n\
a=ice-ufrag:answerufrag\r\n\
a=ice-pwd:answerpassword\r\n\
a=fingerprint:sha-256 12:34:56:78\r\n\
a=setup:active\r\n\
a=mid:video\r\n\
a=sendrecv\r\n\
a=rtcp-mux\r\n\
a=rtpmap:100 VP8/90000\r\n\
a=ssrc:2011 cname:alice\r\n";

/// The remote side's description: audio 3001, video 4001.
pub const REMOTE_SDP: &str = "v=0\r\n\
o=- 1923518516 2 IN IP4 0.0.0.0\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE audio video\r\n\
m=audio 1 UDP/TLS/RTP/SAVPF 111\r\n\
c=IN IP4 0.0.0.0\r\n\
a=ice-ufrag:remoteufrag\r\n\
a=ice-pwd:remotepassword\r\n\
a=fingerprint:sha-256 FE:DC:BA:98\r\n\
a=setup:actpass\r\n\
a=mid:audio\r\n\
a=sendrecv\r\n\
a=rtcp-mux\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=ssrc:3001 cname:bob\r\n\
m=video 1 UDP/TLS/RTP/SAVPF 100\r\n\
c=IN IP4 0.0.0.0\r\n\
a=ice-ufrag:remoteufrag\r\n\
a=ice-pwd:remotepassword\r\n\
a=fingerprint:sha-256 FE:DC:BA:98\r\n\
a=setup:actpass\r\n\
a=mid:video\r\n\
a=sendrecv\r\n\
a=rtcp-mux\r\n\
a=rtpmap:100 VP8/90000\r\n\
a=ssrc:4001 cname:bob\r\n";

pub fn room() -> Jid {
    jid(ROOM)
}

pub fn occupant(nick: &str) -> Jid {
    room().with_resource(nick)
}

pub fn jid(s: &str) -> Jid {
    s.parse().unwrap_or_default()
}

/// One request seen by a recording collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub request: &'static str,
    pub target: Option<String>,
    pub payload: Option<Node>,
    pub sdp: Option<String>,
}

impl Call {
    fn new(request: &'static str) -> Self {
        Self {
            request,
            target: None,
            payload: None,
            sdp: None,
        }
    }

    fn to(mut self, target: impl ToString) -> Self {
        self.target = Some(target.to_string());
        self
    }

    fn with_payload(mut self, payload: Node) -> Self {
        self.payload = Some(payload);
        self
    }

    fn with_sdp(mut self, sdp: impl Into<String>) -> Self {
        self.sdp = Some(sdp.into());
        self
    }
}

/// Shared, ordered record of requests to the signaling channel and the
/// media transport.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn lock(&self) -> MutexGuard<'_, Vec<Call>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn push(&self, call: Call) {
        self.lock().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().clone()
    }

    pub fn requests(&self) -> Vec<&'static str> {
        self.lock().iter().map(|c| c.request).collect()
    }

    pub fn of(&self, request: &str) -> Vec<Call> {
        self.lock().iter().filter(|c| c.request == request).cloned().collect()
    }

    pub fn count(&self, request: &str) -> usize {
        self.lock().iter().filter(|c| c.request == request).count()
    }

    /// Position of the first `request` in the log.
    pub fn position(&self, request: &str) -> Option<usize> {
        self.lock().iter().position(|c| c.request == request)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[derive(Debug, Default)]
struct Failures(Mutex<HashSet<&'static str>>);

impl Failures {
    fn set(&self, request: &'static str, failing: bool) {
        let mut set = match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if failing {
            set.insert(request);
        } else {
            set.remove(request);
        }
    }

    fn contains(&self, request: &str) -> bool {
        match self.0.lock() {
            Ok(set) => set.contains(request),
            Err(poisoned) => poisoned.into_inner().contains(request),
        }
    }

    /// Like `contains`, but clears the entry.
    fn take(&self, request: &str) -> bool {
        match self.0.lock() {
            Ok(mut set) => set.remove(request),
            Err(poisoned) => poisoned.into_inner().remove(request),
        }
    }
}

/// [`SignalingChannel`] that records every request. Requests marked with
/// [`RecordingSignaling::fail_on`] return an error and are not recorded.
#[derive(Debug, Default)]
pub struct RecordingSignaling {
    log: CallLog,
    failures: Failures,
}

impl RecordingSignaling {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            failures: Failures::default(),
        }
    }

    pub fn fail_on(&self, request: &'static str) {
        self.failures.set(request, true);
    }

    pub fn recover(&self, request: &'static str) {
        self.failures.set(request, false);
    }

    fn record(&self, call: Call) -> Result<(), SignalingError> {
        if self.failures.contains(call.request) {
            return Err(SignalingError::Send {
                request: call.request,
                reason: "scripted failure".to_string(),
            });
        }
        self.log.push(call);
        Ok(())
    }
}

#[async_trait]
impl SignalingChannel for RecordingSignaling {
    async fn send_presence(&self, occupant: &Jid, update: &ParticipantUpdate) -> Result<(), SignalingError> {
        let mut presence = NodeBuilder::new("presence");
        if let Some(nick) = &update.nick {
            presence = presence.child(NodeBuilder::new("nick").string_content(nick.clone()).build());
        }
        for (tag, muted) in [("audiomuted", update.audio_muted), ("videomuted", update.video_muted)] {
            if let Some(muted) = muted {
                presence = presence.child(NodeBuilder::new(tag).string_content(muted.to_string()).build());
            }
        }
        self.record(Call::new("presence").to(occupant).with_payload(presence.build()))
    }

    async fn send_unavailable_presence(&self, occupant: &Jid) -> Result<(), SignalingError> {
        self.record(Call::new("unavailable_presence").to(occupant))
    }

    async fn send_presence_alive(&self, room: &Jid) -> Result<(), SignalingError> {
        self.record(Call::new("presence_alive").to(room))
    }

    async fn stop_presence_alive(&self, room: &Jid) -> Result<(), SignalingError> {
        self.record(Call::new("stop_presence_alive").to(room))
    }

    async fn send_allocate(&self, config: &SessionConfig) -> Result<(), SignalingError> {
        let call = Call::new("allocate");
        match &config.room_id {
            Some(room_id) => self.record(call.to(room_id)),
            None => self.record(call),
        }
    }

    async fn send_capabilities(
        &self,
        to: &Jid,
        request_id: Option<&str>,
        features: &[String],
    ) -> Result<(), SignalingError> {
        let query = NodeBuilder::new("query")
            .opt_attr("id", request_id)
            .children(
                features
                    .iter()
                    .map(|f| NodeBuilder::new("feature").attr("var", f.clone()).build()),
            )
            .build();
        self.record(Call::new("capabilities").to(to).with_payload(query))
    }

    async fn send_session_initiate(&self, to: &Jid, jingle: Node) -> Result<(), SignalingError> {
        self.record(Call::new("session-initiate").to(to).with_payload(jingle))
    }

    async fn send_session_accept(&self, to: &Jid, jingle: Node) -> Result<(), SignalingError> {
        self.record(Call::new("session-accept").to(to).with_payload(jingle))
    }

    async fn send_transport_info(&self, to: &Jid, jingle: Node) -> Result<(), SignalingError> {
        self.record(Call::new("transport-info").to(to).with_payload(jingle))
    }

    async fn send_source_add(&self, to: &Jid, jingle: Node) -> Result<(), SignalingError> {
        self.record(Call::new("source-add").to(to).with_payload(jingle))
    }

    async fn send_source_remove(&self, to: &Jid, jingle: Node) -> Result<(), SignalingError> {
        self.record(Call::new("source-remove").to(to).with_payload(jingle))
    }

    async fn send_session_terminate(&self, to: &Jid, jingle: Node) -> Result<(), SignalingError> {
        self.record(Call::new("session-terminate").to(to).with_payload(jingle))
    }

    async fn send_rayo(&self, focus: &Jid, to: &str, from: Option<&str>) -> Result<(), SignalingError> {
        let dial = NodeBuilder::new("dial").attr("to", to).opt_attr("from", from).build();
        self.record(Call::new("rayo").to(focus).with_payload(dial))
    }

    async fn send_hold(&self, focus: &Jid) -> Result<(), SignalingError> {
        self.record(Call::new("hold").to(focus))
    }

    async fn send_unhold(&self, focus: &Jid) -> Result<(), SignalingError> {
        self.record(Call::new("unhold").to(focus))
    }

    async fn send_hangup(&self, focus: &Jid) -> Result<(), SignalingError> {
        self.record(Call::new("hangup").to(focus))
    }

    async fn send_group_chat_message(&self, room: &Jid, id: &str, body: &str) -> Result<(), SignalingError> {
        let message = NodeBuilder::new("message")
            .attr("id", id)
            .child(NodeBuilder::new("body").string_content(body).build())
            .build();
        self.record(Call::new("groupchat").to(room).with_payload(message))
    }
}

/// [`MediaTransport`] returning canned descriptions and reporting
/// signaling state changes the way an engine would.
#[derive(Debug)]
pub struct ScriptedTransport {
    log: CallLog,
    model: NegotiationModel,
    offer: Mutex<String>,
    answer: Mutex<String>,
    failures: Failures,
    fail_next: Failures,
    events: Mutex<Option<mpsc::UnboundedSender<MediaEvent>>>,
}

impl ScriptedTransport {
    pub fn new(log: CallLog, model: NegotiationModel) -> Self {
        Self {
            log,
            model,
            offer: Mutex::new(PLAN_B_OFFER.to_string()),
            answer: Mutex::new(PLAN_B_ANSWER.to_string()),
            failures: Failures::default(),
            fail_next: Failures::default(),
            events: Mutex::new(None),
        }
    }

    pub fn set_offer(&self, sdp: impl Into<String>) {
        replace(&self.offer, sdp.into());
    }

    pub fn set_answer(&self, sdp: impl Into<String>) {
        replace(&self.answer, sdp.into());
    }

    pub fn fail_on(&self, request: &'static str) {
        self.failures.set(request, true);
    }

    pub fn recover(&self, request: &'static str) {
        self.failures.set(request, false);
    }

    /// Fail only the next call of `request`.
    pub fn fail_once(&self, request: &'static str) {
        self.fail_next.set(request, true);
    }

    /// Deliver a media event to the session owning this transport.
    pub fn emit(&self, event: MediaEvent) -> bool {
        let sender = match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        sender.is_some_and(|tx| tx.send(event).is_ok())
    }

    fn connect(&self) -> mpsc::UnboundedReceiver<MediaEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        replace(&self.events, Some(tx));
        rx
    }

    fn record(&self, call: Call) -> Result<(), TransportError> {
        if self.failures.contains(call.request) || self.fail_next.take(call.request) {
            return Err(TransportError::operation(call.request, "scripted failure"));
        }
        self.log.push(call);
        Ok(())
    }

    fn description(&self, kind: SdpType) -> Description {
        let source = match kind {
            SdpType::Offer => &self.offer,
            SdpType::Answer => &self.answer,
        };
        let sdp = match source.lock() {
            Ok(sdp) => sdp.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        Description { kind, sdp }
    }
}

fn replace<T>(slot: &Mutex<T>, value: T) {
    match slot.lock() {
        Ok(mut guard) => *guard = value,
        Err(poisoned) => *poisoned.into_inner() = value,
    }
}

#[async_trait]
impl MediaTransport for ScriptedTransport {
    fn negotiation_model(&self) -> NegotiationModel {
        self.model
    }

    async fn create_offer(&self, _constraints: OfferConstraints) -> Result<Description, TransportError> {
        self.record(Call::new("create_offer"))?;
        Ok(self.description(SdpType::Offer))
    }

    async fn create_answer(&self, _constraints: OfferConstraints) -> Result<Description, TransportError> {
        self.record(Call::new("create_answer"))?;
        Ok(self.description(SdpType::Answer))
    }

    async fn set_local_description(&self, description: Description) -> Result<(), TransportError> {
        self.record(Call::new("set_local_description").with_sdp(description.sdp))?;
        self.emit(MediaEvent::SignalingState(match description.kind {
            SdpType::Offer => SignalingState::HaveLocalOffer,
            SdpType::Answer => SignalingState::Stable,
        }));
        Ok(())
    }

    async fn set_remote_description(&self, description: Description) -> Result<(), TransportError> {
        self.record(Call::new("set_remote_description").with_sdp(description.sdp))?;
        self.emit(MediaEvent::SignalingState(match description.kind {
            SdpType::Offer => SignalingState::HaveRemoteOffer,
            SdpType::Answer => SignalingState::Stable,
        }));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        self.record(Call::new("add_ice_candidate").with_sdp(candidate.candidate))
    }

    async fn add_stream(&self, stream: &LocalStream) -> Result<(), TransportError> {
        self.record(Call::new("add_stream").to(&stream.id))
    }

    async fn remove_stream(&self, stream: &LocalStream) -> Result<(), TransportError> {
        self.record(Call::new("remove_stream").to(&stream.id))
    }

    async fn set_track_enabled(&self, stream_id: &str, kind: MediaKind, enabled: bool) -> Result<(), TransportError> {
        self.record(Call::new("set_track_enabled").to(format!("{stream_id}/{}/{enabled}", kind.as_str())))
    }

    async fn send_data(&self, text: String) -> Result<(), TransportError> {
        self.record(Call::new("send_data").with_sdp(text))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.record(Call::new("close"))
    }
}

/// Hands out the same [`ScriptedTransport`] with a fresh event stream each time.
#[derive(Debug)]
pub struct ScriptedFactory {
    transport: Arc<ScriptedTransport>,
}

impl ScriptedFactory {
    pub fn new(transport: Arc<ScriptedTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl MediaTransportFactory for ScriptedFactory {
    async fn create_transport(
        &self,
        _config: &SessionConfig,
    ) -> Result<(Arc<dyn MediaTransport>, mpsc::UnboundedReceiver<MediaEvent>), TransportError> {
        let rx = self.transport.connect();
        Ok((self.transport.clone(), rx))
    }
}

/// Marks descriptions rewritten to Unified-Plan with an extra session line
/// and strips it on the way back.
#[derive(Debug, Default)]
pub struct MarkingInterop {
    to_unified: AtomicUsize,
    to_plan_b: AtomicUsize,
}

impl MarkingInterop {
    pub const MARKER: &'static str = "a=x-layout:unified";

    /// `(to_unified_plan, to_plan_b)` call counts.
    pub fn calls(&self) -> (usize, usize) {
        (
            self.to_unified.load(Ordering::SeqCst),
            self.to_plan_b.load(Ordering::SeqCst),
        )
    }
}

impl InteropAdapter for MarkingInterop {
    fn to_unified_plan(&self, sdp: &SessionDescription) -> Result<SessionDescription, TransportError> {
        self.to_unified.fetch_add(1, Ordering::SeqCst);
        let mut out = sdp.clone();
        out.session.push(Self::MARKER.to_string());
        Ok(out)
    }

    fn to_plan_b(&self, sdp: &SessionDescription) -> Result<SessionDescription, TransportError> {
        self.to_plan_b.fetch_add(1, Ordering::SeqCst);
        let mut out = sdp.clone();
        out.session.retain(|line| line != Self::MARKER);
        Ok(out)
    }
}

/// Collects every dispatched [`Event`].
#[derive(Debug, Default)]
pub struct EventCollector(Mutex<Vec<Event>>);

impl EventCollector {
    pub fn events(&self) -> Vec<Event> {
        match self.0.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }

    /// Poll until an event matching `pred` was collected. Panics after two
    /// seconds.
    pub async fn wait_for(&self, pred: impl Fn(&Event) -> bool) -> Event {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            if let Some(event) = self.events().into_iter().find(|e| pred(e)) {
                return event;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("event not collected, got: {:?}", self.events());
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl EventHandler for EventCollector {
    fn handle_event(&self, event: &Event) {
        match self.0.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

/// A set of collaborators sharing one [`CallLog`].
pub struct TestRig {
    pub log: CallLog,
    pub signaling: Arc<RecordingSignaling>,
    pub transport: Arc<ScriptedTransport>,
    pub interop: Arc<MarkingInterop>,
    pub events: Arc<EventCollector>,
}

impl Default for TestRig {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRig {
    pub fn new() -> Self {
        Self::with_model(NegotiationModel::PlanB)
    }

    pub fn with_model(model: NegotiationModel) -> Self {
        let log = CallLog::default();
        Self {
            signaling: Arc::new(RecordingSignaling::new(log.clone())),
            transport: Arc::new(ScriptedTransport::new(log.clone(), model)),
            interop: Arc::new(MarkingInterop::default()),
            events: Arc::new(EventCollector::default()),
            log,
        }
    }

    /// A client over the scripted transport with the event collector attached.
    pub fn client(&self) -> Client {
        let factory = Arc::new(ScriptedFactory::new(self.transport.clone()));
        let client = Client::new(ClientConfig::default(), factory).with_interop(self.interop.clone());
        client.events().add_handler(self.events.clone());
        client
    }

    pub fn connection(&self) -> Option<Arc<dyn SignalingChannel>> {
        Some(self.signaling.clone())
    }

    /// A session that has not been started, for driving handlers directly.
    pub(crate) fn session(&self, call_type: CallType) -> Session {
        let events = CoreEventBus::new();
        events.add_handler(self.events.clone());
        let strategy = match self.transport.negotiation_model() {
            NegotiationModel::PlanB => NegotiationStrategy::PlanB,
            NegotiationModel::UnifiedPlan => NegotiationStrategy::UnifiedPlan(self.interop.clone()),
        };
        Session::new(
            SessionConfig {
                nick: Some(LOCAL_NICK.to_string()),
                ..SessionConfig::new(call_type)
            },
            call_type,
            Arc::new(ClientConfig::default()),
            Collaborators {
                transport: self.transport.clone(),
                signaling: self.signaling.clone(),
                strategy,
                events,
            },
        )
    }
}

/// Config for a video call in [`ROOM`] as [`LOCAL_NICK`].
pub fn video_config() -> SessionConfig {
    SessionConfig {
        room_id: Some("standup".to_string()),
        nick: Some(LOCAL_NICK.to_string()),
        local_stream: Some(LocalStream::new("cam", true, true)),
        ..SessionConfig::new(CallType::Video)
    }
}

pub fn self_presence() -> SignalingEvent {
    SignalingEvent::Presence {
        from: occupant(LOCAL_NICK),
        is_self: true,
        update: ParticipantUpdate::default(),
    }
}

pub fn presence(nick: &str) -> SignalingEvent {
    SignalingEvent::Presence {
        from: occupant(nick),
        is_self: false,
        update: ParticipantUpdate {
            nick: Some(nick.to_string()),
            ..Default::default()
        },
    }
}

pub fn leave(nick: &str) -> SignalingEvent {
    SignalingEvent::PresenceLeave {
        from: occupant(nick),
        is_self: false,
    }
}

fn message(from: &Jid, action: JingleAction, sid: &str, initiator: Option<Jid>, jingle: Node) -> SignalingEvent {
    SignalingEvent::Jingle(JingleMessage {
        id: format!("{}-{sid}", action.as_str()),
        from: from.clone(),
        to: Some(occupant(LOCAL_NICK)),
        action,
        sid: sid.to_string(),
        initiator,
        jingle,
    })
}

/// [`REMOTE_SDP`] as a `session-initiate` or `session-accept` from `from`,
/// with its sources owned by `from`.
pub fn remote_description(from: &Jid, action: JingleAction, sid: &str) -> SignalingEvent {
    let sdp = match SessionDescription::parse(REMOTE_SDP) {
        Ok(sdp) => sdp,
        Err(_) => SessionDescription::default(),
    };
    let mut owners = SourceOwners::default();
    for (_, ssrc) in sdp.all_ssrcs() {
        owners.insert(ssrc, from.clone());
    }
    let (creator, initiator) = match action {
        JingleAction::SessionInitiate => (Creator::Initiator, Some(from.clone())),
        _ => (Creator::Responder, None),
    };
    let mut builder = JingleBuilder::new(action, sid).contents(sdp.to_jingle(creator, &owners));
    if let Some(initiator) = &initiator {
        builder = builder.initiator(initiator);
    }
    message(from, action, sid, initiator, builder.build())
}

/// A `source-add` or `source-remove` naming one source in section `name`.
pub fn source_update(from: &Jid, action: JingleAction, sid: &str, name: &str, ssrc: u32) -> SignalingEvent {
    let source = NodeBuilder::new("source")
        .attr("xmlns", NS_SSMA)
        .attr("ssrc", ssrc.to_string())
        .child(
            NodeBuilder::new("parameter")
                .attr("name", "cname")
                .attr("value", from.resource().unwrap_or("remote"))
                .build(),
        )
        .child(
            NodeBuilder::new("ssrc-info")
                .attr("xmlns", NS_SSRC_INFO)
                .attr("owner", from.to_string())
                .build(),
        )
        .build();
    let content = NodeBuilder::new("content")
        .attr("name", name)
        .child(
            NodeBuilder::new("description")
                .attr("xmlns", NS_RTP)
                .attr("media", name)
                .child(source)
                .build(),
        )
        .build();
    let jingle = JingleBuilder::new(action, sid).contents([content]).build();
    message(from, action, sid, None, jingle)
}

pub fn terminate(from: &Jid, sid: &str) -> SignalingEvent {
    let jingle = rtccore::jingle::builders::session_terminate(
        sid,
        rtccore::jingle::builders::TerminateReason::Success,
        None,
    );
    message(from, JingleAction::SessionTerminate, sid, None, jingle)
}

/// A `transport-info` from `from` carrying one candidate in section `mid`.
pub fn transport_info(from: &Jid, sid: &str, n: u16, mid: &str) -> SignalingEvent {
    let ice = candidate(n, mid);
    let remote = match SessionDescription::parse(REMOTE_SDP) {
        Ok(sdp) => sdp,
        Err(_) => SessionDescription::default(),
    };
    let pairs: Vec<(String, Candidate)> = Candidate::from_sdp_line(&ice.candidate)
        .map(|c| (mid.to_string(), c))
        .into_iter()
        .collect();
    let jingle = rtccore::jingle::builders::transport_info(sid, Creator::Responder, &remote, &pairs);
    message(from, JingleAction::TransportInfo, sid, None, jingle)
}

/// Candidates carried by a `transport-info` payload.
pub fn candidate_count(jingle: &Node) -> usize {
    jingle
        .get_children_by_tag("content")
        .filter_map(|content| content.get_optional_child("transport"))
        .map(|transport| transport.get_children_by_tag("candidate").count())
        .sum()
}

pub fn candidate(n: u16, mid: &str) -> IceCandidate {
    IceCandidate {
        candidate: format!("candidate:{n} 1 udp 2122260223 10.0.0.{n} {} typ host generation 0", 50000 + n),
        sdp_mid: Some(mid.to_string()),
        sdp_m_line_index: None,
    }
}

/// Poll snapshots until `pred` holds. Panics after two seconds.
pub async fn wait_until(handle: &SessionHandle, pred: impl Fn(&SessionSnapshot) -> bool) -> SessionSnapshot {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if let Ok(snapshot) = handle.snapshot().await
            && pred(&snapshot)
        {
            return snapshot;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not reached, last snapshot: {:?}", handle.snapshot().await);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Wait for the session task to stop. Panics after two seconds.
pub async fn wait_closed(handle: &SessionHandle) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !handle.is_closed() {
        if tokio::time::Instant::now() >= deadline {
            panic!("session {} still running", handle.id());
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Poll the log until it holds `count` `request`s. Panics after two seconds.
pub async fn wait_for_requests(log: &CallLog, request: &str, count: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while log.count(request) < count {
        if tokio::time::Instant::now() >= deadline {
            panic!("expected {count} {request} request(s), log: {:?}", log.requests());
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
