//! Codec preference shaping applied to local descriptions.

use log::debug;
use serde::{Deserialize, Serialize};

use super::lines::{MediaLine, parse_fmtp};
use super::{MediaSection, SessionDescription};

/// Codec preferences for local offers and answers.
///
/// Names compare case-insensitively against the `a=rtpmap` encoding name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecPolicy {
    pub preferred_audio: Option<String>,
    pub preferred_video: Option<String>,
    pub disabled: Vec<String>,
}

impl CodecPolicy {
    pub fn is_noop(&self) -> bool {
        self.preferred_audio.is_none() && self.preferred_video.is_none() && self.disabled.is_empty()
    }

    pub fn apply(&self, sdp: &mut SessionDescription) {
        if self.is_noop() {
            return;
        }
        for section in sdp.media.iter_mut() {
            let preferred = match section.media_type() {
                "audio" => self.preferred_audio.clone(),
                "video" => self.preferred_video.clone(),
                _ => continue,
            };
            for codec in &self.disabled {
                strip_codec(section, codec);
            }
            if let Some(codec) = preferred {
                prefer_codec(section, &codec);
            }
        }
    }
}

fn payload_types_for(section: &MediaSection, codec: &str) -> Vec<String> {
    section
        .rtpmaps()
        .into_iter()
        .filter(|r| r.name.eq_ignore_ascii_case(codec))
        .map(|r| r.id)
        .collect()
}

/// Retransmission payload types whose `apt` points at one of `pts`.
fn rtx_for(section: &MediaSection, pts: &[String]) -> Vec<String> {
    section
        .find_lines("a=fmtp:")
        .filter_map(parse_fmtp)
        .filter(|(_, params)| {
            params.iter().any(|p| {
                p.name.as_deref() == Some("apt") && pts.iter().any(|pt| *pt == p.value)
            })
        })
        .map(|(pt, _)| pt)
        .collect()
}

/// Move the codec's payload types to the front of the m-line.
fn prefer_codec(section: &mut MediaSection, codec: &str) {
    let Some(mut mline) = section.m_line() else {
        return;
    };
    let pts = payload_types_for(section, codec);
    if pts.is_empty() {
        return;
    }
    let (mut front, rest): (Vec<String>, Vec<String>) =
        mline.formats.into_iter().partition(|f| pts.contains(f));
    front.extend(rest);
    mline.formats = front;
    section.lines[0] = mline.to_string();
}

/// Remove the codec and its retransmission payload types from the section.
fn strip_codec(section: &mut MediaSection, codec: &str) {
    let Some(mut mline) = section.m_line() else {
        return;
    };
    let mut pts = payload_types_for(section, codec);
    if pts.is_empty() {
        return;
    }
    pts.extend(rtx_for(section, &pts));

    let remaining: Vec<String> = mline
        .formats
        .iter()
        .filter(|f| !pts.contains(f))
        .cloned()
        .collect();
    if remaining.is_empty() {
        debug!(
            "Not stripping {codec} from {} section: it is the only codec",
            section.media_type()
        );
        return;
    }
    mline.formats = remaining;
    section.lines[0] = mline.to_string();

    let prefixes: Vec<String> = pts
        .iter()
        .flat_map(|pt| {
            [
                format!("a=rtpmap:{pt} "),
                format!("a=fmtp:{pt} "),
                format!("a=rtcp-fb:{pt} "),
            ]
        })
        .collect();
    section
        .lines
        .retain(|l| !prefixes.iter().any(|p| l.starts_with(p.as_str())));
}

/// Formats of a section's m-line, used by tests and diagnostics.
pub fn formats(section: &MediaSection) -> Vec<String> {
    section
        .lines
        .first()
        .and_then(|l| MediaLine::parse(l))
        .map(|m| m.formats)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdp::tests::PLAN_B_OFFER;

    #[test]
    fn test_prefer_video_codec() {
        let mut sdp = SessionDescription::parse(PLAN_B_OFFER).unwrap();
        let policy = CodecPolicy {
            preferred_video: Some("h264".to_string()),
            ..Default::default()
        };
        policy.apply(&mut sdp);
        assert_eq!(formats(&sdp.media[1]), vec!["107", "100", "96", "99"]);
        assert_eq!(formats(&sdp.media[0]), vec!["111", "103", "0"]);
    }

    #[test]
    fn test_strip_codec_and_rtx() {
        let mut sdp = SessionDescription::parse(PLAN_B_OFFER).unwrap();
        let policy = CodecPolicy {
            disabled: vec!["VP8".to_string()],
            ..Default::default()
        };
        policy.apply(&mut sdp);
        assert_eq!(formats(&sdp.media[1]), vec!["107", "99"]);
        assert!(sdp.media[1].rtpmap("100").is_none());
        assert!(sdp.media[1].rtpmap("96").is_none());
        assert!(sdp.media[1].rtcp_fbs("100").is_empty());
        assert!(sdp.media[1].fmtp("96").is_none());
    }

    #[test]
    fn test_never_strips_last_codec() {
        let text = "v=0\r\nm=audio 9 RTP/SAVPF 111\r\na=rtpmap:111 opus/48000/2\r\n";
        let mut sdp = SessionDescription::parse(text).unwrap();
        let policy = CodecPolicy {
            disabled: vec!["opus".to_string()],
            ..Default::default()
        };
        policy.apply(&mut sdp);
        assert_eq!(sdp.to_string(), text);
    }
}
