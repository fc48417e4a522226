//! Jingle (XEP-0166/0167/0176) payloads and their mapping to SDP.

pub mod builders;
pub mod candidate;
mod from_jingle;
pub mod sources;
mod to_jingle;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use builders::JingleBuilder;
pub use candidate::Candidate;
pub use sources::SourceOwners;
pub(crate) use to_jingle::{group_to_jingle, source_to_jingle};

pub const NS_JINGLE: &str = "urn:xmpp:jingle:1";
pub const NS_RTP: &str = "urn:xmpp:jingle:apps:rtp:1";
pub const NS_ICE_UDP: &str = "urn:xmpp:jingle:transports:ice-udp:1";
pub const NS_DTLS: &str = "urn:xmpp:jingle:apps:dtls:0";
pub const NS_SSMA: &str = "urn:xmpp:jingle:apps:rtp:ssma:0";
pub const NS_GROUPING: &str = "urn:xmpp:jingle:apps:grouping:0";
pub const NS_HDREXT: &str = "urn:xmpp:jingle:apps:rtp:rtp-hdrext:0";
pub const NS_RTCP_FB: &str = "urn:xmpp:jingle:apps:rtp:rtcp-fb:0";
pub const NS_SCTP: &str = "urn:xmpp:jingle:transports:dtls-sctp:1";
pub const NS_SSRC_INFO: &str = "http://jitsi.org/jitmeet";

/// Which side created a content, carried in the `creator` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Creator {
    Initiator,
    Responder,
}

impl Creator {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Initiator => "initiator",
            Self::Responder => "responder",
        }
    }
}

impl fmt::Display for Creator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Jingle `action` attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JingleAction {
    SessionInitiate,
    SessionAccept,
    SessionTerminate,
    SessionInfo,
    SourceAdd,
    SourceRemove,
    TransportInfo,
    TransportReplace,
}

impl JingleAction {
    pub const ALL: [JingleAction; 8] = [
        Self::SessionInitiate,
        Self::SessionAccept,
        Self::SessionTerminate,
        Self::SessionInfo,
        Self::SourceAdd,
        Self::SourceRemove,
        Self::TransportInfo,
        Self::TransportReplace,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SessionInitiate => "session-initiate",
            Self::SessionAccept => "session-accept",
            Self::SessionTerminate => "session-terminate",
            Self::SessionInfo => "session-info",
            Self::SourceAdd => "source-add",
            Self::SourceRemove => "source-remove",
            Self::TransportInfo => "transport-info",
            Self::TransportReplace => "transport-replace",
        }
    }

    /// Parse the `action` attribute. The older `addsource`/`removesource`
    /// spellings are accepted too.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "addsource" => Some(Self::SourceAdd),
            "removesource" => Some(Self::SourceRemove),
            other => Self::ALL.into_iter().find(|a| a.as_str() == other),
        }
    }

    /// Whether the action carries a `<content>` payload that changes media.
    pub const fn is_renegotiation(&self) -> bool {
        matches!(self, Self::SourceAdd | Self::SourceRemove)
    }
}

impl fmt::Display for JingleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_roundtrip() {
        for action in JingleAction::ALL {
            assert_eq!(JingleAction::from_name(action.as_str()), Some(action));
        }
        assert_eq!(
            JingleAction::from_name("addsource"),
            Some(JingleAction::SourceAdd)
        );
        assert_eq!(JingleAction::from_name("content-add"), None);
    }

    #[test]
    fn test_renegotiation_actions() {
        assert!(JingleAction::SourceAdd.is_renegotiation());
        assert!(JingleAction::SourceRemove.is_renegotiation());
        assert!(!JingleAction::SessionAccept.is_renegotiation());
    }
}
