// Integration test: an SDP offer rendered to a Jingle session-initiate, sent
// through the XML codec and rebuilt on the receiving side.

use rtccore::SourceDiff;
use rtccore::jingle::{Creator, JingleAction, JingleBuilder, SourceOwners};
use rtccore::sdp::SessionDescription;
use rtccore::xml::{Jid, marshal, unmarshal};

const OFFER: &str = "v=0\r\n\
o=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE audio video\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
c=IN IP4 0.0.0.0\r\n\
a=ice-ufrag:wireufrag\r\n\
a=ice-pwd:wirepassword\r\n\
a=fingerprint:sha-256 AB:CD:EF:01\r\n\
a=setup:actpass\r\n\
a=mid:audio\r\n\
a=sendrecv\r\n\
a=rtcp-mux\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=ssrc:1001 cname:alice\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 100 96\r\n\
c=IN IP4 0.0.0.0\r\n\
a=ice-ufrag:wireufrag\r\n\
a=ice-pwd:wirepassword\r\n\
a=fingerprint:sha-256 AB:CD:EF:01\r\n\
a=setup:actpass\r\n\
a=mid:video\r\n\
a=sendrecv\r\n\
a=rtcp-mux\r\n\
a=rtpmap:100 VP8/90000\r\n\
a=rtpmap:96 rtx/90000\r\n\
a=fmtp:96 apt=100\r\n\
a=ssrc-group:FID 2001 2002\r\n\
a=ssrc:2001 cname:alice\r\n\
a=ssrc:2002 cname:alice\r\n";

fn alice() -> Jid {
    "standup@conference.localhost/alice".parse().unwrap()
}

#[test]
fn test_offer_survives_the_wire() {
    let offer = SessionDescription::parse(OFFER).unwrap();
    let mut owners = SourceOwners::default();
    for (_, ssrc) in offer.all_ssrcs() {
        owners.insert(ssrc, alice());
    }

    let jingle = JingleBuilder::new(JingleAction::SessionInitiate, "wire-1")
        .initiator(&alice())
        .contents(offer.to_jingle(Creator::Initiator, &owners))
        .build();
    let xml = marshal(&jingle).unwrap();
    let received = unmarshal(&xml).unwrap();
    assert_eq!(received.attr("action"), Some("session-initiate"));

    let rebuilt = SessionDescription::from_jingle(&received).unwrap();
    let names: Vec<&str> = rebuilt.media.iter().map(|m| m.name()).collect();
    assert_eq!(names, vec!["audio", "video"]);

    let mut before: Vec<u32> = offer.all_ssrcs().into_iter().map(|(_, s)| s).collect();
    let mut after: Vec<u32> = rebuilt.all_ssrcs().into_iter().map(|(_, s)| s).collect();
    before.sort_unstable();
    after.sort_unstable();
    assert_eq!(before, after);

    let video = &rebuilt.media[1];
    let groups = video.ssrc_groups();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].semantics, "FID");
    assert_eq!(groups[0].ssrcs, vec![2001, 2002]);
    assert_eq!(video.ice_ufrag(&rebuilt.session), Some("wireufrag"));

    let mut recorded = SourceOwners::default();
    recorded.record_from_jingle(&received);
    assert_eq!(recorded.owner_of(2002), Some(&alice()));
}

#[test]
fn test_diff_of_rebuilt_descriptions() {
    let offer = SessionDescription::parse(OFFER).unwrap();
    let jingle = JingleBuilder::new(JingleAction::SessionInitiate, "wire-2")
        .contents(offer.to_jingle(Creator::Initiator, &SourceOwners::default()))
        .build();
    let rebuilt = SessionDescription::from_jingle(&jingle).unwrap();
    assert!(SourceDiff::between(&offer, &rebuilt).is_empty());

    let moved = SessionDescription::parse(&OFFER.replace("a=ssrc:1001", "a=ssrc:1003")).unwrap();
    let diff = SourceDiff::between(&rebuilt, &moved);
    assert_eq!(diff.added_ssrcs(), vec![1003]);
    assert_eq!(diff.removed_ssrcs(), vec![1001]);
}
