// Integration tests: a full call driven through the public Client API over
// recording signaling and a scripted media transport.

use std::time::Duration;

use mucrtc::Client;
use mucrtc::SessionHandle;
use mucrtc::config::SessionConfig;
use mucrtc::error::{ClientError, ConfigError};
use mucrtc::rtccore::jingle::JingleAction;
use mucrtc::rtccore::state::{CallState, EndReason, PresenceState};
use mucrtc::signaling::SignalingEvent;
use mucrtc::test_utils::*;
use mucrtc::transport::{IceConnectionState, MediaEvent};
use mucrtc::types::events::Event;
use mucrtc::types::{CallType, SessionType};

// Helper: create a video call, join the room and wait for bob to receive
// our offer. Returns the Jingle sid.
async fn outgoing_call(rig: &TestRig) -> (Client, SessionHandle, String) {
    let client = rig.client();
    let handle = client
        .create_session(video_config(), rig.connection())
        .await
        .expect("session should start");
    wait_for_requests(&rig.log, "allocate", 1).await;

    handle
        .handle_signaling(SignalingEvent::AllocateSuccess { room: room() })
        .unwrap();
    handle.handle_signaling(self_presence()).unwrap();
    wait_until(&handle, |s| s.call_state == CallState::Outgoing).await;

    handle.handle_signaling(presence("bob")).unwrap();
    let snapshot = wait_until(&handle, |s| s.sid.is_some()).await;
    let sid = snapshot.sid.unwrap();
    (client, handle, sid)
}

// Helper: the session task may still be unwinding after its handle closes.
async fn wait_for_no_session(client: &Client) {
    for _ in 0..400 {
        if client.session().await.is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("session still active");
}

// Helper: bob accepts our offer and ICE connects.
async fn connect(rig: &TestRig, handle: &SessionHandle, sid: &str) {
    handle
        .handle_signaling(remote_description(&occupant("bob"), JingleAction::SessionAccept, sid))
        .unwrap();
    wait_until(handle, |s| s.call_state == CallState::InProgress).await;
    assert!(rig.transport.emit(MediaEvent::IceConnectionState(IceConnectionState::Connected)));
    wait_until(handle, |s| s.call_state == CallState::Connected).await;
}

// Helper: join an existing room and answer bob's session-initiate.
async fn incoming_call(rig: &TestRig) -> (Client, SessionHandle) {
    let client = rig.client();
    let config = SessionConfig {
        session_type: SessionType::Join,
        ..video_config()
    };
    let handle = client.join_session(config, rig.connection()).await.unwrap();
    wait_for_requests(&rig.log, "presence", 1).await;

    handle.handle_signaling(self_presence()).unwrap();
    handle.handle_signaling(presence("bob")).unwrap();
    wait_until(&handle, |s| s.call_state == CallState::Incoming).await;

    handle
        .handle_signaling(remote_description(&occupant("bob"), JingleAction::SessionInitiate, "sid-1"))
        .unwrap();
    wait_until(&handle, |s| s.call_state == CallState::InProgress).await;
    (client, handle)
}

#[tokio::test]
async fn test_video_without_local_stream_is_rejected() {
    let rig = TestRig::new();
    let client = rig.client();

    let err = client
        .create_session(SessionConfig::new(CallType::Video), rig.connection())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Config(ConfigError::MissingLocalStream("video"))));
    assert_eq!(rig.events.count(|e| matches!(e, Event::ConfigurationError { .. })), 1);
    assert!(rig.log.calls().is_empty(), "nothing may be sent: {:?}", rig.log.requests());
    assert!(client.session().await.is_none());
}

#[tokio::test]
async fn test_join_checks_connection_before_room() {
    let rig = TestRig::new();
    let client = rig.client();

    let err = client.join_session(SessionConfig::default(), None).await.unwrap_err();
    assert!(matches!(err, ClientError::Config(ConfigError::MissingConnection)));

    let err = client
        .join_session(SessionConfig::new(CallType::Audio), rig.connection())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Config(ConfigError::MissingRoomId)));
    assert_eq!(rig.events.count(|e| matches!(e, Event::ConfigurationError { .. })), 2);
}

#[tokio::test]
async fn test_only_one_session_at_a_time() {
    let rig = TestRig::new();
    let (client, _handle, _sid) = outgoing_call(&rig).await;

    let err = client.create_session(video_config(), rig.connection()).await.unwrap_err();
    assert!(matches!(err, ClientError::SessionActive));
}

#[tokio::test]
async fn test_offer_goes_to_first_participant() {
    let rig = TestRig::new();
    let (_client, handle, sid) = outgoing_call(&rig).await;

    let initiates = rig.log.of("session-initiate");
    assert_eq!(initiates.len(), 1);
    assert_eq!(initiates[0].target, Some(occupant("bob").to_string()));
    let jingle = initiates[0].payload.as_ref().unwrap();
    assert_eq!(jingle.attr("sid"), Some(sid.as_str()));
    assert_eq!(jingle.attr("initiator"), Some(occupant(LOCAL_NICK).to_string().as_str()));
    assert!(rig.log.position("create_offer").unwrap() < rig.log.position("session-initiate").unwrap());

    // A second participant does not get another offer.
    handle.handle_signaling(presence("carol")).unwrap();
    wait_until(&handle, |s| s.participants.len() == 2).await;
    assert_eq!(rig.log.count("session-initiate"), 1);

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.presence, PresenceState::Joined);
    assert_eq!(snapshot.peer, Some(occupant("bob")));
    assert!(snapshot.local_description().unwrap().contains_ssrc(1001));
}

#[tokio::test]
async fn test_failed_offer_is_retried_to_earliest_participant() {
    let rig = TestRig::new();
    let client = rig.client();
    let handle = client.create_session(video_config(), rig.connection()).await.unwrap();
    handle
        .handle_signaling(SignalingEvent::AllocateSuccess { room: room() })
        .unwrap();
    handle.handle_signaling(self_presence()).unwrap();
    wait_until(&handle, |s| s.call_state == CallState::Outgoing).await;

    rig.signaling.fail_on("session-initiate");
    handle.handle_signaling(presence("zed")).unwrap();
    rig.events.wait_for(|e| matches!(e, Event::SessionError { .. })).await;
    rig.signaling.recover("session-initiate");

    // "amy" sorts first but joined later.
    handle.handle_signaling(presence("amy")).unwrap();
    let snapshot = wait_until(&handle, |s| s.sid.is_some()).await;

    assert_eq!(snapshot.peer, Some(occupant("zed")));
    let initiates = rig.log.of("session-initiate");
    assert_eq!(initiates.len(), 1);
    assert_eq!(initiates[0].target, Some(occupant("zed").to_string()));
}

#[tokio::test]
async fn test_answer_then_ice_connects_the_call() {
    let rig = TestRig::new();
    let (_client, handle, sid) = outgoing_call(&rig).await;
    connect(&rig, &handle, &sid).await;

    let states: Vec<CallState> = rig
        .events
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::CallStateChanged { state, .. } => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            CallState::Connecting,
            CallState::Outgoing,
            CallState::InProgress,
            CallState::Connected
        ]
    );

    let snapshot = handle.snapshot().await.unwrap();
    let remote = snapshot.remote_description().unwrap();
    assert!(remote.contains_ssrc(3001));
    assert!(remote.contains_ssrc(4001));
}

#[tokio::test]
async fn test_session_accept_outside_outgoing_is_ignored() {
    let rig = TestRig::new();
    let (_client, handle, sid) = outgoing_call(&rig).await;
    connect(&rig, &handle, &sid).await;
    assert_eq!(rig.log.count("set_remote_description"), 1);

    handle
        .handle_signaling(remote_description(&occupant("bob"), JingleAction::SessionAccept, &sid))
        .unwrap();
    let snapshot = handle.snapshot().await.unwrap();

    assert_eq!(snapshot.call_state, CallState::Connected);
    assert_eq!(rig.log.count("set_remote_description"), 1);
}

#[tokio::test]
async fn test_session_initiate_while_offering_is_ignored() {
    let rig = TestRig::new();
    let (_client, handle, _sid) = outgoing_call(&rig).await;

    handle
        .handle_signaling(remote_description(&occupant("bob"), JingleAction::SessionInitiate, "other"))
        .unwrap();
    let snapshot = handle.snapshot().await.unwrap();

    assert_eq!(snapshot.call_state, CallState::Outgoing);
    assert_eq!(rig.log.count("create_answer"), 0);
}

#[tokio::test]
async fn test_incoming_initiate_is_answered() {
    let rig = TestRig::new();
    let (_client, handle) = incoming_call(&rig).await;

    assert_eq!(rig.log.count("allocate"), 0);
    assert_eq!(rig.log.count("create_offer"), 0);
    assert!(rig.log.position("set_remote_description").unwrap() < rig.log.position("create_answer").unwrap());

    let accepts = rig.log.of("session-accept");
    assert_eq!(accepts.len(), 1);
    assert_eq!(accepts[0].target, Some(occupant("bob").to_string()));
    let jingle = accepts[0].payload.as_ref().unwrap();
    assert_eq!(jingle.attr("sid"), Some("sid-1"));
    assert_eq!(jingle.attr("responder"), Some(occupant(LOCAL_NICK).to_string().as_str()));

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.sid.as_deref(), Some("sid-1"));
    assert!(snapshot.local_description().unwrap().contains_ssrc(1011));
}

#[tokio::test]
async fn test_local_candidates_wait_for_a_peer() {
    let rig = TestRig::new();
    let client = rig.client();
    let handle = client.create_session(video_config(), rig.connection()).await.unwrap();
    handle
        .handle_signaling(SignalingEvent::AllocateSuccess { room: room() })
        .unwrap();
    handle.handle_signaling(self_presence()).unwrap();
    wait_until(&handle, |s| s.call_state == CallState::Outgoing).await;

    assert!(rig.transport.emit(MediaEvent::IceCandidate(Some(candidate(1, "audio")))));
    assert!(rig.transport.emit(MediaEvent::IceCandidate(Some(candidate(2, "video")))));
    wait_until(&handle, |s| s.buffered_candidates == 2).await;
    assert_eq!(rig.log.count("transport-info"), 0);

    handle.handle_signaling(presence("bob")).unwrap();
    wait_for_requests(&rig.log, "transport-info", 1).await;

    let info = &rig.log.of("transport-info")[0];
    assert_eq!(info.target, Some(occupant("bob").to_string()));
    assert_eq!(candidate_count(info.payload.as_ref().unwrap()), 2);
    assert!(rig.log.position("session-initiate").unwrap() < rig.log.position("transport-info").unwrap());
    wait_until(&handle, |s| s.buffered_candidates == 0).await;
}

#[tokio::test]
async fn test_failed_candidate_send_keeps_order() {
    let rig = TestRig::new();
    let (_client, handle, _sid) = outgoing_call(&rig).await;

    rig.signaling.fail_on("transport-info");
    assert!(rig.transport.emit(MediaEvent::IceCandidate(Some(candidate(1, "audio")))));
    rig.events
        .wait_for(|e| matches!(e, Event::SessionError { .. }))
        .await;
    assert_eq!(handle.snapshot().await.unwrap().buffered_candidates, 1);

    rig.signaling.recover("transport-info");
    assert!(rig.transport.emit(MediaEvent::IceCandidate(Some(candidate(2, "audio")))));
    wait_for_requests(&rig.log, "transport-info", 1).await;

    let info = &rig.log.of("transport-info")[0];
    let ips: Vec<String> = info
        .payload
        .as_ref()
        .unwrap()
        .get_children_by_tag("content")
        .filter_map(|c| c.get_optional_child("transport"))
        .flat_map(|t| t.get_children_by_tag("candidate"))
        .filter_map(|c| c.attr("ip").map(str::to_string))
        .collect();
    assert_eq!(ips, vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()]);
}

#[tokio::test]
async fn test_remote_candidates_wait_for_remote_description() {
    let rig = TestRig::new();
    let (_client, handle, sid) = outgoing_call(&rig).await;

    handle
        .handle_signaling(transport_info(&occupant("bob"), &sid, 7, "audio"))
        .unwrap();
    handle.snapshot().await.unwrap();
    assert_eq!(rig.log.count("add_ice_candidate"), 0);

    handle
        .handle_signaling(remote_description(&occupant("bob"), JingleAction::SessionAccept, &sid))
        .unwrap();
    wait_for_requests(&rig.log, "add_ice_candidate", 1).await;
    assert!(
        rig.log.position("set_remote_description").unwrap() < rig.log.position("add_ice_candidate").unwrap()
    );
    let applied = &rig.log.of("add_ice_candidate")[0];
    assert!(applied.sdp.as_deref().unwrap().contains("10.0.0.7"));
}

#[tokio::test]
async fn test_end_session_leaves_the_room() {
    let rig = TestRig::new();
    let (client, handle, sid) = outgoing_call(&rig).await;
    connect(&rig, &handle, &sid).await;

    client.end_session().await.unwrap();

    let terminates = rig.log.of("session-terminate");
    assert_eq!(terminates.len(), 1);
    assert_eq!(terminates[0].target, Some(occupant("bob").to_string()));
    let reason = terminates[0]
        .payload
        .as_ref()
        .and_then(|j| j.get_optional_child("reason"))
        .expect("terminate carries a reason");
    assert!(reason.get_optional_child("success").is_some());

    assert_eq!(rig.log.count("unavailable_presence"), 1);
    assert_eq!(rig.log.count("stop_presence_alive"), 1);
    assert_eq!(rig.log.count("close"), 1);
    assert_eq!(
        rig.events.count(|e| matches!(
            e,
            Event::SessionEnded {
                reason: EndReason::LocalHangup,
                ..
            }
        )),
        1
    );
    assert!(handle.is_closed());
    assert!(client.session().await.is_none());
    assert!(matches!(client.end_session().await, Err(ClientError::NoSession)));
}

#[tokio::test]
async fn test_remote_terminate_ends_without_replying() {
    let rig = TestRig::new();
    let (client, handle, sid) = outgoing_call(&rig).await;
    connect(&rig, &handle, &sid).await;

    handle.handle_signaling(terminate(&occupant("bob"), &sid)).unwrap();
    wait_closed(&handle).await;

    assert_eq!(rig.log.count("session-terminate"), 0);
    assert_eq!(rig.log.count("close"), 1);
    assert_eq!(
        rig.events.count(|e| matches!(
            e,
            Event::SessionEnded {
                reason: EndReason::RemoteTerminate,
                ..
            }
        )),
        1
    );
    wait_for_no_session(&client).await;

    // The client accepts a new session once the old one is gone.
    rig.log.clear();
    client.create_session(video_config(), rig.connection()).await.unwrap();
    assert_eq!(rig.log.count("allocate"), 1);
}

#[tokio::test]
async fn test_terminate_for_foreign_sid_is_ignored() {
    let rig = TestRig::new();
    let (_client, handle, sid) = outgoing_call(&rig).await;
    connect(&rig, &handle, &sid).await;

    handle.handle_signaling(terminate(&occupant("bob"), "not-ours")).unwrap();
    let snapshot = handle.snapshot().await.unwrap();

    assert_eq!(snapshot.call_state, CallState::Connected);
    assert_eq!(rig.log.count("close"), 0);
}

#[tokio::test]
async fn test_rejected_answer_fails_negotiation() {
    let rig = TestRig::new();
    let (_client, handle, sid) = outgoing_call(&rig).await;

    rig.transport.fail_on("set_remote_description");
    handle
        .handle_signaling(remote_description(&occupant("bob"), JingleAction::SessionAccept, &sid))
        .unwrap();
    wait_closed(&handle).await;

    let terminate = &rig.log.of("session-terminate")[0];
    let reason = terminate
        .payload
        .as_ref()
        .and_then(|j| j.get_optional_child("reason"))
        .unwrap();
    assert!(reason.get_optional_child("failed-application").is_some());
    assert_eq!(
        rig.events.count(|e| matches!(
            e,
            Event::SessionEnded {
                reason: EndReason::NegotiationFailed,
                ..
            }
        )),
        1
    );
}

#[tokio::test]
async fn test_participant_leave_events() {
    let rig = TestRig::new();
    let (_client, handle, _sid) = outgoing_call(&rig).await;

    handle.handle_signaling(leave("bob")).unwrap();
    rig.events
        .wait_for(|e| matches!(e, Event::AllParticipantsLeft { .. }))
        .await;

    assert_eq!(
        rig.events
            .count(|e| matches!(e, Event::ParticipantLeft { jid } if *jid == occupant("bob"))),
        1
    );
    // The session stays up until the application ends it.
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.call_state, CallState::Outgoing);
    assert!(snapshot.participants.is_empty());
}
