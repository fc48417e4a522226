//! Session description model.
//!
//! A [`SessionDescription`] keeps every line it was parsed from. Media sections
//! start at each `m=` line and keep their lines in order, so unknown attributes
//! survive a parse → mutate → serialize cycle untouched. Typed accessors parse
//! lines on demand.

pub mod codec;
pub mod lines;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SdpError;
use lines::{MediaLine, Rtpmap, RtcpFb, SsrcGroup, SsrcLine, find_line, find_line_in, find_lines};

/// Media direction attribute of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Self::SendRecv,
        Self::SendOnly,
        Self::RecvOnly,
        Self::Inactive,
    ];

    pub const fn attribute(&self) -> &'static str {
        match self {
            Self::SendRecv => "sendrecv",
            Self::SendOnly => "sendonly",
            Self::RecvOnly => "recvonly",
            Self::Inactive => "inactive",
        }
    }

    pub fn from_attribute(line: &str) -> Option<Self> {
        let attr = line.strip_prefix("a=").unwrap_or(line);
        Self::ALL.into_iter().find(|d| d.attribute() == attr)
    }

    /// Jingle `senders` value, seen from the initiator.
    pub const fn senders(&self) -> &'static str {
        match self {
            Self::SendRecv => "both",
            Self::SendOnly => "initiator",
            Self::RecvOnly => "responder",
            Self::Inactive => "none",
        }
    }

    pub fn from_senders(senders: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.senders() == senders)
    }
}

/// An SSRC and its attribute lines (`cname`, `msid`, ...) in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub ssrc: u32,
    pub params: Vec<(String, Option<String>)>,
}

impl Source {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn to_lines(&self) -> Vec<String> {
        self.params
            .iter()
            .map(|(name, value)| {
                SsrcLine {
                    ssrc: self.ssrc,
                    name: name.clone(),
                    value: value.clone(),
                }
                .to_line()
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSection {
    /// Raw lines, the `m=` line first.
    pub lines: Vec<String>,
}

impl MediaSection {
    pub fn m_line(&self) -> Option<MediaLine> {
        self.lines.first().and_then(|l| MediaLine::parse(l))
    }

    pub fn media_type(&self) -> &str {
        self.lines
            .first()
            .and_then(|l| l.strip_prefix("m="))
            .and_then(|l| l.split(' ').next())
            .unwrap_or_default()
    }

    pub fn is_rtp(&self) -> bool {
        matches!(self.media_type(), "audio" | "video")
    }

    pub fn mid(&self) -> Option<&str> {
        find_line(&self.lines, "a=mid:").map(|l| &l["a=mid:".len()..])
    }

    /// The mid, or the media type when the section carries no `a=mid`.
    pub fn name(&self) -> &str {
        self.mid().unwrap_or_else(|| self.media_type())
    }

    pub fn find_line(&self, prefix: &str) -> Option<&str> {
        find_line(&self.lines, prefix)
    }

    pub fn find_lines<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        find_lines(&self.lines, prefix)
    }

    pub fn direction(&self) -> Direction {
        self.lines
            .iter()
            .find_map(|l| Direction::from_attribute(l))
            .unwrap_or_default()
    }

    /// Replace the direction attribute, appending one if the section has none.
    pub fn set_direction(&mut self, direction: Direction) {
        let line = format!("a={}", direction.attribute());
        match self
            .lines
            .iter()
            .position(|l| Direction::from_attribute(l).is_some())
        {
            Some(pos) => self.lines[pos] = line,
            None => self.lines.push(line),
        }
    }

    pub fn rtpmaps(&self) -> Vec<Rtpmap> {
        self.find_lines("a=rtpmap:").filter_map(Rtpmap::parse).collect()
    }

    pub fn rtpmap(&self, pt: &str) -> Option<Rtpmap> {
        let prefix = format!("a=rtpmap:{pt} ");
        self.find_line(&prefix).and_then(Rtpmap::parse)
    }

    pub fn fmtp(&self, pt: &str) -> Option<&str> {
        let prefix = format!("a=fmtp:{pt} ");
        self.find_line(&prefix)
    }

    pub fn rtcp_fbs(&self, pt: &str) -> Vec<RtcpFb> {
        let prefix = format!("a=rtcp-fb:{pt} ");
        self.lines
            .iter()
            .filter(|l| l.starts_with(&prefix))
            .filter_map(|l| RtcpFb::parse(l))
            .collect()
    }

    pub fn ice_ufrag<'a>(&'a self, session: &'a [String]) -> Option<&'a str> {
        find_line_in(&self.lines, session, "a=ice-ufrag:").map(|l| &l["a=ice-ufrag:".len()..])
    }

    pub fn ice_pwd<'a>(&'a self, session: &'a [String]) -> Option<&'a str> {
        find_line_in(&self.lines, session, "a=ice-pwd:").map(|l| &l["a=ice-pwd:".len()..])
    }

    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        self.find_lines("a=candidate:")
    }

    /// Sources keyed by SSRC in order of first appearance.
    pub fn sources(&self) -> Vec<Source> {
        let mut sources: Vec<Source> = Vec::new();
        for line in self.find_lines("a=ssrc:").filter_map(SsrcLine::parse) {
            let param = (line.name, line.value);
            match sources.iter_mut().find(|s| s.ssrc == line.ssrc) {
                Some(source) => source.params.push(param),
                None => sources.push(Source {
                    ssrc: line.ssrc,
                    params: vec![param],
                }),
            }
        }
        sources
    }

    pub fn ssrcs(&self) -> Vec<u32> {
        self.sources().into_iter().map(|s| s.ssrc).collect()
    }

    pub fn ssrc_groups(&self) -> Vec<SsrcGroup> {
        self.find_lines("a=ssrc-group:")
            .filter_map(SsrcGroup::parse)
            .collect()
    }

    pub fn contains_ssrc(&self, ssrc: u32) -> bool {
        self.find_lines("a=ssrc:")
            .filter_map(SsrcLine::parse)
            .any(|l| l.ssrc == ssrc)
    }

    /// Drop every `a=ssrc:<ssrc>` line. Returns whether anything was removed.
    pub fn remove_ssrc(&mut self, ssrc: u32) -> bool {
        let before = self.lines.len();
        self.lines
            .retain(|l| SsrcLine::parse(l).is_none_or(|parsed| parsed.ssrc != ssrc));
        before != self.lines.len()
    }

    /// Drop `a=ssrc-group` lines equal to `group`, or that reference any SSRC
    /// the section no longer carries.
    pub fn prune_groups(&mut self, group: Option<&SsrcGroup>) {
        let present = self.ssrcs();
        self.lines.retain(|l| match SsrcGroup::parse(l) {
            Some(g) => Some(&g) != group && g.ssrcs.iter().all(|s| present.contains(s)),
            None => true,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionDescription {
    /// Lines before the first `m=` line.
    pub session: Vec<String>,
    pub media: Vec<MediaSection>,
}

impl SessionDescription {
    pub fn parse(text: &str) -> Result<Self, SdpError> {
        let mut session = Vec::new();
        let mut media: Vec<MediaSection> = Vec::new();

        for raw in text.split('\n') {
            let line = raw.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            if line.starts_with("m=") {
                if line.split_whitespace().count() < 4 {
                    return Err(SdpError::InvalidMediaLine(line.to_string()));
                }
                media.push(MediaSection {
                    lines: vec![line.to_string()],
                });
            } else if let Some(section) = media.last_mut() {
                section.lines.push(line.to_string());
            } else {
                session.push(line.to_string());
            }
        }

        if !session.iter().any(|l| l.starts_with("v=")) {
            return Err(SdpError::MissingSessionLine);
        }

        Ok(Self { session, media })
    }

    pub fn section_by_mid(&self, mid: &str) -> Option<(usize, &MediaSection)> {
        self.media.iter().enumerate().find(|(_, m)| m.mid() == Some(mid))
    }

    /// Find a section by the name a jingle `<content>` uses for it: its mid,
    /// or the media type for sections without one.
    pub fn section_index_by_name(&self, name: &str) -> Option<usize> {
        self.media
            .iter()
            .position(|m| m.mid() == Some(name))
            .or_else(|| {
                self.media
                    .iter()
                    .position(|m| m.mid().is_none() && m.media_type() == name)
            })
    }

    pub fn contains_ssrc(&self, ssrc: u32) -> bool {
        self.media.iter().any(|m| m.contains_ssrc(ssrc))
    }

    /// Every SSRC in the description with the index of its section.
    pub fn all_ssrcs(&self) -> Vec<(usize, u32)> {
        self.media
            .iter()
            .enumerate()
            .flat_map(|(idx, m)| m.ssrcs().into_iter().map(move |s| (idx, s)))
            .collect()
    }

    /// Locate the section carrying `ssrc`.
    pub fn section_of_ssrc(&self, ssrc: u32) -> Option<usize> {
        self.media.iter().position(|m| m.contains_ssrc(ssrc))
    }

    /// Session `a=group:` lines as (semantics, mids).
    pub fn groups(&self) -> Vec<(String, Vec<String>)> {
        find_lines(&self.session, "a=group:")
            .filter_map(|l| {
                let mut parts = l["a=group:".len()..].split(' ');
                let semantics = parts.next()?.to_string();
                Some((semantics, parts.map(str::to_string).collect()))
            })
            .collect()
    }
}

impl fmt::Display for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self
            .session
            .iter()
            .chain(self.media.iter().flat_map(|m| m.lines.iter()))
        {
            write!(f, "{line}\r\n")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for SessionDescription {
    type Err = SdpError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A Plan-B style offer with one audio and one video source.
    pub(crate) const PLAN_B_OFFER: &str = "v=0\r\n\
o=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE audio video\r\n\
a=msid-semantic: WMS stream1\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111 103 0\r\n\
c=IN IP4 0.0.0.0\r\n\
a=rtcp:9 IN IP4 0.0.0.0\r\n\
a=ice-ufrag:someufrag\r\n\
a=ice-pwd:somepassword\r\n\
a=fingerprint:sha-256 AB:CD:EF:01\r\n\
a=setup:actpass\r\n\
a=candidate:1 1 udp 2122260223 10.0.0.1 51000 typ host generation 0\r\n\
a=mid:audio\r\n\
a=extmap:1 urn:ietf:params:rtp-hdrext:ssrc-audio-level\r\n\
a=sendrecv\r\n\
a=rtcp-mux\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=fmtp:111 minptime=10;useinbandfec=1\r\n\
a=rtcp-fb:111 transport-cc\r\n\
a=rtpmap:103 ISAC/16000\r\n\
a=rtpmap:0 PCMU/8000\r\n\
a=ssrc:1001 cname:user1\r\n\
a=ssrc:1001 msid:stream1 audiotrack1\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 100 96 107 99\r\n\
c=IN IP4 0.0.0.0\r\n\
a=rtcp:9 IN IP4 0.0.0.0\r\n\
a=ice-ufrag:someufrag\r\n\
a=ice-pwd:somepassword\r\n\
a=fingerprint:sha-256 AB:CD:EF:01\r\n\
a=setup:actpass\r\n\
a=mid:video\r\n\
a=sendrecv\r\n\
a=rtcp-mux\r\n\
a=rtpmap:100 VP8/90000\r\n\
a=rtcp-fb:100 nack\r\n\
a=rtcp-fb:100 nack pli\r\n\
a=rtcp-fb:100 goog-remb\r\n\
a=rtpmap:96 rtx/90000\r\n\
a=fmtp:96 apt=100\r\n\
a=rtpmap:107 H264/90000\r\n\
a=fmtp:107 level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f\r\n\
a=rtpmap:99 rtx/90000\r\n\
a=fmtp:99 apt=107\r\n\
a=ssrc-group:FID 2001 2002\r\n\
a=ssrc:2001 cname:user1\r\n\
a=ssrc:2001 msid:stream1 videotrack1\r\n\
a=ssrc:2002 cname:user1\r\n\
a=ssrc:2002 msid:stream1 videotrack1\r\n";

    #[test]
    fn test_parse_sections() {
        let sdp = SessionDescription::parse(PLAN_B_OFFER).unwrap();
        assert_eq!(sdp.session.len(), 6);
        assert_eq!(sdp.media.len(), 2);
        assert_eq!(sdp.media[0].media_type(), "audio");
        assert_eq!(sdp.media[1].mid(), Some("video"));
        assert_eq!(sdp.media[1].ssrcs(), vec![2001, 2002]);
        assert_eq!(sdp.media[1].ssrc_groups().len(), 1);
        assert_eq!(sdp.media[0].rtcp_fbs("111").len(), 1);
        assert_eq!(sdp.media[1].rtcp_fbs("100").len(), 3);
        assert_eq!(
            sdp.groups(),
            vec![("BUNDLE".to_string(), vec!["audio".to_string(), "video".to_string()])]
        );
    }

    #[test]
    fn test_serialize_uses_crlf_and_preserves_text() {
        let sdp = SessionDescription::parse(PLAN_B_OFFER).unwrap();
        assert_eq!(sdp.to_string(), PLAN_B_OFFER);

        let lf_only = PLAN_B_OFFER.replace("\r\n", "\n");
        let reparsed = SessionDescription::parse(&lf_only).unwrap();
        assert_eq!(reparsed, sdp);
    }

    #[test]
    fn test_unknown_lines_are_preserved() {
        let text = "v=0\r\na=x-custom:thing\r\nm=audio 9 RTP/AVP 0\r\na=x-vendor:42\r\n";
        let sdp = SessionDescription::parse(text).unwrap();
        assert_eq!(sdp.media[0].lines[1], "a=x-vendor:42");
        assert_eq!(sdp.to_string(), text);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            SessionDescription::parse("o=- 1 2 IN IP4 0.0.0.0\r\n"),
            Err(SdpError::MissingSessionLine)
        );
        assert!(matches!(
            SessionDescription::parse("v=0\r\nm=audio 9 RTP/AVP\r\n"),
            Err(SdpError::InvalidMediaLine(_))
        ));
    }

    #[test]
    fn test_direction_updates() {
        let mut sdp = SessionDescription::parse(PLAN_B_OFFER).unwrap();
        assert_eq!(sdp.media[0].direction(), Direction::SendRecv);
        sdp.media[0].set_direction(Direction::RecvOnly);
        assert_eq!(sdp.media[0].direction(), Direction::RecvOnly);
        assert_eq!(sdp.media[0].find_lines("a=recvonly").count(), 1);
        assert_eq!(sdp.media[0].find_lines("a=sendrecv").count(), 0);
    }

    #[test]
    fn test_remove_ssrc_prunes_groups() {
        let mut sdp = SessionDescription::parse(PLAN_B_OFFER).unwrap();
        assert!(sdp.media[1].remove_ssrc(2002));
        sdp.media[1].prune_groups(None);
        assert_eq!(sdp.media[1].ssrcs(), vec![2001]);
        assert!(sdp.media[1].ssrc_groups().is_empty());
        assert!(!sdp.media[1].remove_ssrc(9999));
    }

    #[test]
    fn test_section_lookup_by_name() {
        let sdp = SessionDescription::parse(PLAN_B_OFFER).unwrap();
        assert_eq!(sdp.section_index_by_name("video"), Some(1));
        assert_eq!(sdp.section_index_by_name("data"), None);
        assert_eq!(sdp.section_of_ssrc(1001), Some(0));
    }
}
