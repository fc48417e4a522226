use std::path::Path;

use rtccore::sdp::codec::CodecPolicy;
use rtccore::types::{CallType, SessionType};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::transport::{LocalStream, OfferConstraints};

/// Features advertised in capability replies when none are configured.
pub const DEFAULT_FEATURES: &[&str] = &[
    "urn:xmpp:jingle:1",
    "urn:xmpp:jingle:apps:rtp:1",
    "urn:xmpp:jingle:apps:rtp:audio",
    "urn:xmpp:jingle:apps:rtp:video",
    "urn:xmpp:jingle:transports:ice-udp:1",
    "urn:xmpp:jingle:apps:dtls:0",
    "urn:xmpp:jingle:transports:dtls-sctp:1",
    "urn:xmpp:jingle:apps:grouping:0",
    "urn:xmpp:jingle:apps:rtp:rtcp-fb:0",
    "urn:xmpp:jingle:apps:rtp:rtp-hdrext:0",
    "urn:ietf:rfc:5761",
    "urn:ietf:rfc:5888",
    "http://jitsi.org/json-encoded-sources",
];

/// Client-wide defaults shared by every session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Domain of the MUC service rooms live on.
    pub muc_domain: String,
    /// Occupant nick of the focus component.
    pub focus_nick: String,
    /// Codec shaping applied to every local description.
    pub codecs: CodecPolicy,
    pub features: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            muc_domain: "conference.localhost".to_string(),
            focus_nick: "focus".to_string(),
            codecs: CodecPolicy::default(),
            features: DEFAULT_FEATURES.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_json(&text)
    }
}

/// Parameters of one call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub call_type: Option<CallType>,
    pub session_type: SessionType,
    /// Room to join. Filled from the allocation reply for created sessions.
    pub room_id: Option<String>,
    pub nick: Option<String>,
    pub local_stream: Option<LocalStream>,
    /// Receive media without sending any.
    pub recvonly: bool,
    /// The focus bridges the call and always sends the offer.
    pub bridged: bool,
    pub pstn_number: Option<String>,
    pub pstn_caller_id: Option<String>,
    /// Per-call override of [`ClientConfig::codecs`].
    pub codecs: Option<CodecPolicy>,
}

impl SessionConfig {
    pub fn new(call_type: CallType) -> Self {
        Self {
            call_type: Some(call_type),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Checks for `create_session`: connection, call type, media, PSTN number.
    pub fn validate_create(&self, has_connection: bool) -> Result<CallType, ConfigError> {
        if !has_connection {
            return Err(ConfigError::MissingConnection);
        }
        let call_type = self.call_type.ok_or(ConfigError::MissingCallType)?;
        self.validate_media(call_type)?;
        if call_type == CallType::Pstn && self.pstn_number.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingPstnNumber);
        }
        Ok(call_type)
    }

    /// Checks for `join_session`: connection, room id, call type, media.
    pub fn validate_join(&self, has_connection: bool) -> Result<CallType, ConfigError> {
        if !has_connection {
            return Err(ConfigError::MissingConnection);
        }
        if self.room_id.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingRoomId);
        }
        let call_type = self.call_type.ok_or(ConfigError::MissingCallType)?;
        self.validate_media(call_type)?;
        Ok(call_type)
    }

    fn validate_media(&self, call_type: CallType) -> Result<(), ConfigError> {
        if call_type.has_media() && self.local_stream.is_none() && !self.recvonly {
            return Err(ConfigError::MissingLocalStream(call_type.as_str()));
        }
        Ok(())
    }

    pub fn codec_policy<'a>(&'a self, client: &'a ClientConfig) -> &'a CodecPolicy {
        self.codecs.as_ref().unwrap_or(&client.codecs)
    }

    pub fn constraints(&self) -> OfferConstraints {
        let video = self.call_type == Some(CallType::Video);
        OfferConstraints {
            receive_audio: self.call_type.is_some_and(|t| t.has_media()),
            receive_video: video,
        }
    }
}
