// Integration tests: source updates and stream switches after the initial
// exchange, and description rewriting for Unified-Plan engines.

use std::sync::Arc;

use mucrtc::Client;
use mucrtc::SessionHandle;
use mucrtc::config::{ClientConfig, SessionConfig};
use mucrtc::error::{ClientError, SessionError};
use mucrtc::rtccore::jingle::JingleAction;
use mucrtc::rtccore::state::CallState;
use mucrtc::rtccore::xml::Node;
use mucrtc::signaling::SignalingEvent;
use mucrtc::test_utils::*;
use mucrtc::transport::{
    IceConnectionState, LocalStream, MediaEvent, MediaKind, NegotiationModel, RemoteStream, SignalingState,
};
use mucrtc::types::SessionType;
use mucrtc::types::events::Event;

async fn offering_call(rig: &TestRig) -> (Client, SessionHandle, String) {
    let client = rig.client();
    let handle = client.create_session(video_config(), rig.connection()).await.unwrap();
    handle
        .handle_signaling(SignalingEvent::AllocateSuccess { room: room() })
        .unwrap();
    handle.handle_signaling(self_presence()).unwrap();
    handle.handle_signaling(presence("bob")).unwrap();
    let sid = wait_until(&handle, |s| s.sid.is_some()).await.sid.unwrap();
    handle
        .handle_signaling(remote_description(&occupant("bob"), JingleAction::SessionAccept, &sid))
        .unwrap();
    wait_until(&handle, |s| s.call_state == CallState::InProgress).await;
    (client, handle, sid)
}

async fn connected_call(rig: &TestRig) -> (Client, SessionHandle, String) {
    let (client, handle, sid) = offering_call(rig).await;
    assert!(rig.transport.emit(MediaEvent::IceConnectionState(IceConnectionState::Connected)));
    wait_until(&handle, |s| s.call_state == CallState::Connected).await;
    (client, handle, sid)
}

async fn answering_call(rig: &TestRig) -> (Client, SessionHandle) {
    let client = rig.client();
    let config = SessionConfig {
        session_type: SessionType::Join,
        ..video_config()
    };
    let handle = client.join_session(config, rig.connection()).await.unwrap();
    handle.handle_signaling(self_presence()).unwrap();
    handle.handle_signaling(presence("bob")).unwrap();
    wait_until(&handle, |s| s.call_state == CallState::Incoming).await;
    handle
        .handle_signaling(remote_description(&occupant("bob"), JingleAction::SessionInitiate, "sid-1"))
        .unwrap();
    wait_until(&handle, |s| s.call_state == CallState::InProgress).await;
    (client, handle)
}

fn source_add(sid: &str, name: &str, ssrc: u32) -> SignalingEvent {
    source_update(&occupant("bob"), JingleAction::SourceAdd, sid, name, ssrc)
}

fn source_remove(sid: &str, name: &str, ssrc: u32) -> SignalingEvent {
    source_update(&occupant("bob"), JingleAction::SourceRemove, sid, name, ssrc)
}

// SSRCs named by the <source> elements of a source-add/remove payload.
fn ssrcs_in(jingle: &Node) -> Vec<u32> {
    jingle
        .get_children_by_tag("content")
        .filter_map(|c| c.get_optional_child("description"))
        .flat_map(|d| d.get_children_by_tag("source"))
        .filter_map(|s| s.attr("ssrc").and_then(|v| v.parse().ok()))
        .collect()
}

#[tokio::test]
async fn test_source_updates_run_one_at_a_time() {
    let rig = TestRig::new();
    let (_client, handle, sid) = connected_call(&rig).await;
    let before = rig.log.calls().len();

    handle.handle_signaling(source_add(&sid, "audio", 3002)).unwrap();
    handle.handle_signaling(source_add(&sid, "video", 4002)).unwrap();
    handle.handle_signaling(source_remove(&sid, "audio", 3001)).unwrap();

    let snapshot = wait_until(&handle, |s| {
        s.pending_renegotiations == 0
            && s.remote_description()
                .is_some_and(|r| r.contains_ssrc(3002) && r.contains_ssrc(4002) && !r.contains_ssrc(3001))
    })
    .await;
    assert_eq!(snapshot.call_state, CallState::Connected);

    // Each cycle completes before the next begins.
    let cycle: Vec<&str> = rig.log.requests()[before..]
        .iter()
        .copied()
        .filter(|r| matches!(*r, "create_offer" | "set_local_description" | "set_remote_description"))
        .collect();
    assert_eq!(cycle.len(), 9);
    for step in cycle.chunks(3) {
        assert_eq!(step, ["create_offer", "set_local_description", "set_remote_description"]);
    }
    assert_eq!(rig.events.count(|e| matches!(e, Event::SessionError { .. })), 0);
}

#[tokio::test]
async fn test_source_add_waits_for_ice() {
    let rig = TestRig::new();
    let (_client, handle, sid) = offering_call(&rig).await;

    handle.handle_signaling(source_add(&sid, "audio", 3002)).unwrap();
    let snapshot = wait_until(&handle, |s| s.pending_renegotiations == 1).await;
    assert!(!snapshot.remote_description().unwrap().contains_ssrc(3002));
    assert_eq!(rig.log.count("set_remote_description"), 1);

    assert!(rig.transport.emit(MediaEvent::IceConnectionState(IceConnectionState::Connected)));
    wait_until(&handle, |s| {
        s.pending_renegotiations == 0 && s.remote_description().is_some_and(|r| r.contains_ssrc(3002))
    })
    .await;
    assert_eq!(rig.log.count("set_remote_description"), 2);
}

#[tokio::test]
async fn test_source_add_before_negotiation_is_dropped() {
    let rig = TestRig::new();
    let client = rig.client();
    let handle = client.create_session(video_config(), rig.connection()).await.unwrap();
    handle
        .handle_signaling(SignalingEvent::AllocateSuccess { room: room() })
        .unwrap();
    handle.handle_signaling(self_presence()).unwrap();
    handle.handle_signaling(presence("bob")).unwrap();
    let sid = wait_until(&handle, |s| s.sid.is_some()).await.sid.unwrap();

    handle.handle_signaling(source_add(&sid, "audio", 3002)).unwrap();
    let snapshot = handle.snapshot().await.unwrap();

    assert_eq!(snapshot.call_state, CallState::Outgoing);
    assert_eq!(snapshot.pending_renegotiations, 0);
}

#[tokio::test]
async fn test_unknown_section_is_skipped() {
    let rig = TestRig::new();
    let (_client, handle, sid) = connected_call(&rig).await;

    handle.handle_signaling(source_add(&sid, "data", 5001)).unwrap();
    wait_for_requests(&rig.log, "set_remote_description", 2).await;
    let snapshot = wait_until(&handle, |s| s.pending_renegotiations == 0).await;

    let remote = snapshot.remote_description().unwrap();
    assert!(!remote.contains_ssrc(5001));
    assert!(remote.contains_ssrc(3001));
    assert_eq!(snapshot.call_state, CallState::Connected);
    assert_eq!(rig.events.count(|e| matches!(e, Event::SessionError { .. })), 0);
}

#[tokio::test]
async fn test_added_source_is_attributed_to_its_owner() {
    let rig = TestRig::new();
    let (_client, handle, sid) = connected_call(&rig).await;

    handle.handle_signaling(source_add(&sid, "audio", 3002)).unwrap();
    wait_until(&handle, |s| s.remote_description().is_some_and(|r| r.contains_ssrc(3002))).await;

    assert!(rig.transport.emit(MediaEvent::RemoteStreamAdded(RemoteStream {
        id: "bob-mic".to_string(),
        ssrc: Some(3002),
        kind: Some(MediaKind::Audio),
    })));
    let event = rig
        .events
        .wait_for(|e| matches!(e, Event::RemoteStreamAdded { .. }))
        .await;
    let Event::RemoteStreamAdded { stream_id, participant } = event else {
        unreachable!()
    };
    assert_eq!(stream_id, "bob-mic");
    assert_eq!(participant, Some(occupant("bob")));

    let snapshot = handle.snapshot().await.unwrap();
    let bob = snapshot.participant(&occupant("bob")).unwrap();
    assert_eq!(bob.stream_id.as_deref(), Some("bob-mic"));
}

#[tokio::test]
async fn test_stream_switch_announces_source_changes() {
    let rig = TestRig::new();
    let (_client, handle, _sid) = connected_call(&rig).await;

    rig.transport
        .set_offer(PLAN_B_OFFER.replace("a=ssrc:1001", "a=ssrc:1002"));
    handle
        .switch_stream(Some(LocalStream::new("screen", false, true)))
        .unwrap();
    wait_for_requests(&rig.log, "source-add", 1).await;

    let removed = rig.log.of("remove_stream");
    assert_eq!(removed[0].target.as_deref(), Some("cam"));
    let added = rig.log.of("add_stream");
    assert_eq!(added.last().unwrap().target.as_deref(), Some("screen"));

    assert!(rig.log.position("source-remove").unwrap() < rig.log.position("source-add").unwrap());
    let remove = &rig.log.of("source-remove")[0];
    assert_eq!(ssrcs_in(remove.payload.as_ref().unwrap()), vec![1001]);
    let add = &rig.log.of("source-add")[0];
    assert_eq!(add.target, Some(occupant("bob").to_string()));
    assert_eq!(ssrcs_in(add.payload.as_ref().unwrap()), vec![1002]);

    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.local_description().unwrap().contains_ssrc(1002));
}

#[tokio::test]
async fn test_stream_switch_before_negotiation_updates_transport() {
    let rig = TestRig::new();
    let client = rig.client();
    let config = SessionConfig {
        session_type: SessionType::Join,
        ..video_config()
    };
    let handle = client.join_session(config, rig.connection()).await.unwrap();

    handle.switch_stream(None).unwrap();
    handle.snapshot().await.unwrap();

    assert_eq!(rig.log.count("remove_stream"), 1);
    assert_eq!(rig.log.count("create_offer"), 0);
    assert_eq!(rig.log.count("source-remove"), 0);
}

#[tokio::test]
async fn test_answerer_renegotiates_with_remote_offer() {
    let rig = TestRig::new();
    let (_client, handle) = answering_call(&rig).await;
    assert!(rig.transport.emit(MediaEvent::IceConnectionState(IceConnectionState::Connected)));
    wait_until(&handle, |s| s.call_state == CallState::Connected).await;
    let before = rig.log.calls().len();

    handle.handle_signaling(source_add("sid-1", "video", 4002)).unwrap();
    wait_until(&handle, |s| s.remote_description().is_some_and(|r| r.contains_ssrc(4002))).await;

    let cycle: Vec<&str> = rig.log.requests()[before..]
        .iter()
        .copied()
        .filter(|r| matches!(*r, "set_remote_description" | "create_answer" | "set_local_description"))
        .collect();
    assert_eq!(cycle, ["set_remote_description", "create_answer", "set_local_description"]);
    assert_eq!(rig.log.count("create_offer"), 0);
}

#[tokio::test]
async fn test_unified_plan_descriptions_are_rewritten() {
    let rig = TestRig::with_model(NegotiationModel::UnifiedPlan);
    let (_client, handle) = answering_call(&rig).await;

    let remote = &rig.log.of("set_remote_description")[0];
    assert!(remote.sdp.as_deref().unwrap().contains(MarkingInterop::MARKER));
    let (to_unified, to_plan_b) = rig.interop.calls();
    assert!(to_unified >= 1);
    assert!(to_plan_b >= 1);

    let snapshot = handle.snapshot().await.unwrap();
    assert!(!snapshot.local_sdp.unwrap().contains(MarkingInterop::MARKER));
    assert!(!snapshot.remote_sdp.unwrap().contains(MarkingInterop::MARKER));
}

#[tokio::test]
async fn test_plan_b_descriptions_pass_through() {
    let rig = TestRig::new();
    let (_client, _handle) = answering_call(&rig).await;

    let remote = &rig.log.of("set_remote_description")[0];
    assert!(!remote.sdp.as_deref().unwrap().contains(MarkingInterop::MARKER));
    assert_eq!(rig.interop.calls(), (0, 0));
}

#[tokio::test]
async fn test_unified_plan_needs_an_interop_adapter() {
    let rig = TestRig::with_model(NegotiationModel::UnifiedPlan);
    let factory = Arc::new(ScriptedFactory::new(rig.transport.clone()));
    let client = Client::new(ClientConfig::default(), factory);

    let err = client.create_session(video_config(), rig.connection()).await.unwrap_err();

    assert!(matches!(err, ClientError::Session(SessionError::Unsupported(_))));
    assert_eq!(rig.log.requests(), vec!["close"]);
    assert!(client.session().await.is_none());
}

#[tokio::test]
async fn test_failed_answer_leaves_queue_usable() {
    let rig = TestRig::new();
    let (_client, handle, sid) = connected_call(&rig).await;

    rig.transport.fail_once("set_remote_description");
    handle.handle_signaling(source_add(&sid, "audio", 3002)).unwrap();
    rig.events.wait_for(|e| matches!(e, Event::SessionError { .. })).await;

    handle.handle_signaling(source_add(&sid, "video", 4002)).unwrap();
    let snapshot = wait_until(&handle, |s| {
        s.pending_renegotiations == 0 && s.remote_description().is_some_and(|r| r.contains_ssrc(4002))
    })
    .await;

    // The failed source-add is abandoned, not retried.
    assert!(!snapshot.remote_description().unwrap().contains_ssrc(3002));
    assert_eq!(snapshot.signaling_state, SignalingState::Stable);

    // The engine was completed with the last applied answer before moving on.
    let remotes = rig.log.of("set_remote_description");
    assert_eq!(remotes.len(), 3);
    assert!(!remotes[1].sdp.as_deref().unwrap().contains("a=ssrc:3002"));
    assert!(remotes[2].sdp.as_deref().unwrap().contains("a=ssrc:4002"));
}

#[tokio::test]
async fn test_failed_remote_offer_leaves_queue_usable() {
    let rig = TestRig::new();
    let (_client, handle) = answering_call(&rig).await;
    assert!(rig.transport.emit(MediaEvent::IceConnectionState(IceConnectionState::Connected)));
    wait_until(&handle, |s| s.call_state == CallState::Connected).await;

    rig.transport.fail_once("create_answer");
    handle.handle_signaling(source_add("sid-1", "audio", 3002)).unwrap();
    rig.events.wait_for(|e| matches!(e, Event::SessionError { .. })).await;

    handle.handle_signaling(source_add("sid-1", "video", 4002)).unwrap();
    let snapshot = wait_until(&handle, |s| {
        s.pending_renegotiations == 0 && s.remote_description().is_some_and(|r| r.contains_ssrc(4002))
    })
    .await;
    assert!(!snapshot.remote_description().unwrap().contains_ssrc(3002));
    assert_eq!(snapshot.signaling_state, SignalingState::Stable);
}

#[tokio::test]
async fn test_failed_switch_keeps_track_of_engine_stream() {
    let rig = TestRig::new();
    let (_client, handle, _sid) = connected_call(&rig).await;

    rig.transport.fail_once("create_offer");
    handle
        .switch_stream(Some(LocalStream::new("screen", false, true)))
        .unwrap();
    rig.events.wait_for(|e| matches!(e, Event::SessionError { .. })).await;

    handle
        .switch_stream(Some(LocalStream::new("slides", false, true)))
        .unwrap();
    wait_until(&handle, |s| s.pending_renegotiations == 0).await;
    wait_for_requests(&rig.log, "add_stream", 3).await;

    let removed: Vec<Option<String>> = rig.log.of("remove_stream").into_iter().map(|c| c.target).collect();
    assert_eq!(removed, vec![Some("cam".to_string()), Some("screen".to_string())]);
    let added = rig.log.of("add_stream");
    assert_eq!(added.last().unwrap().target.as_deref(), Some("slides"));
}
