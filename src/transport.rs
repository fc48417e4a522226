//! The media engine boundary.
//!
//! A [`MediaTransport`] is one peer connection. The session drives it through
//! offer/answer calls and hears back through the [`MediaEvent`] stream handed
//! out by the [`MediaTransportFactory`] alongside it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rtccore::types::{Description, IceCandidate};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::SessionConfig;
use crate::error::TransportError;

/// How the engine lays out multiple sources in a description.
///
/// Jingle carries Plan-B. A `UnifiedPlan` engine needs every description
/// rewritten through an [`InteropAdapter`](crate::interop::InteropAdapter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NegotiationModel {
    #[default]
    PlanB,
    UnifiedPlan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

/// Handle to a locally captured stream. Capture itself happens elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalStream {
    pub id: String,
    #[serde(default)]
    pub audio: bool,
    #[serde(default)]
    pub video: bool,
}

impl LocalStream {
    pub fn new(id: impl Into<String>, audio: bool, video: bool) -> Self {
        Self {
            id: id.into(),
            audio,
            video,
        }
    }
}

/// A stream the engine received from the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteStream {
    pub id: String,
    pub ssrc: Option<u32>,
    pub kind: Option<MediaKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum IceConnectionState {
    #[default]
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl IceConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SignalingState {
    #[default]
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveLocalPranswer,
    HaveRemotePranswer,
    Closed,
}

impl fmt::Display for SignalingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stable => "stable",
            Self::HaveLocalOffer => "have-local-offer",
            Self::HaveRemoteOffer => "have-remote-offer",
            Self::HaveLocalPranswer => "have-local-pranswer",
            Self::HaveRemotePranswer => "have-remote-pranswer",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// What the engine should offer to receive when creating a description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OfferConstraints {
    pub receive_audio: bool,
    pub receive_video: bool,
}

/// Events emitted by a media transport.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// A local candidate was gathered. `None` marks the end of gathering.
    IceCandidate(Option<IceCandidate>),
    IceConnectionState(IceConnectionState),
    SignalingState(SignalingState),
    RemoteStreamAdded(RemoteStream),
    RemoteStreamRemoved(String),
    DataChannelOpened,
    DataChannelMessage(String),
    DataChannelClosed,
}

/// One peer connection to the media engine.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    fn negotiation_model(&self) -> NegotiationModel;

    async fn create_offer(&self, constraints: OfferConstraints) -> Result<Description, TransportError>;

    async fn create_answer(&self, constraints: OfferConstraints) -> Result<Description, TransportError>;

    async fn set_local_description(&self, description: Description) -> Result<(), TransportError>;

    async fn set_remote_description(&self, description: Description) -> Result<(), TransportError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError>;

    async fn add_stream(&self, stream: &LocalStream) -> Result<(), TransportError>;

    async fn remove_stream(&self, stream: &LocalStream) -> Result<(), TransportError>;

    /// Enable or disable the tracks of `kind` on a local or remote stream.
    async fn set_track_enabled(&self, stream_id: &str, kind: MediaKind, enabled: bool) -> Result<(), TransportError>;

    /// Send a text message over the bridge data channel.
    async fn send_data(&self, text: String) -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}

/// Creates a transport per session, along with its event stream.
#[async_trait]
pub trait MediaTransportFactory: Send + Sync {
    async fn create_transport(
        &self,
        config: &SessionConfig,
    ) -> Result<(Arc<dyn MediaTransport>, mpsc::UnboundedReceiver<MediaEvent>), TransportError>;
}
