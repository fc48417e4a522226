use rtccore::error::{BridgeError, JingleError, SdpError};
use rtccore::state::InvalidTransition;
use thiserror::Error;

/// A public entry point was called with an unusable configuration.
///
/// Checks stop at the first failing condition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no signaling connection was provided")]
    MissingConnection,

    #[error("room id is required to join a session")]
    MissingRoomId,

    #[error("call type is required")]
    MissingCallType,

    #[error("{0} call needs a local stream or the recvonly flag")]
    MissingLocalStream(&'static str),

    #[error("pstn call needs a number to dial")]
    MissingPstnNumber,

    #[error("invalid configuration: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("media transport is closed")]
    Closed,

    #[error("{operation} failed: {reason}")]
    Operation {
        operation: &'static str,
        reason: String,
    },

    #[error("data channel is not open")]
    DataChannelClosed,

    #[error("no such stream: {0}")]
    UnknownStream(String),

    #[error("description rewrite failed: {0}")]
    Interop(String),
}

impl TransportError {
    pub fn operation(operation: &'static str, reason: impl ToString) -> Self {
        Self::Operation {
            operation,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("signaling channel is disconnected")]
    Disconnected,

    #[error("failed to send {request}: {reason}")]
    Send {
        request: &'static str,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("signaling error: {0}")]
    Signaling(#[from] SignalingError),

    #[error("invalid state transition: {0}")]
    InvalidTransition(#[from] InvalidTransition),

    #[error("sdp error: {0}")]
    Sdp(#[from] SdpError),

    #[error("jingle error: {0}")]
    Jingle(#[from] JingleError),

    #[error("bridge message error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("room presence failed: {0}")]
    Presence(String),

    #[error("unknown participant {0}")]
    UnknownParticipant(String),

    #[error("{0} is not available for this call")]
    Unsupported(&'static str),

    #[error("session has ended")]
    Closed,
}

impl SessionError {
    pub fn negotiation(step: &str, err: impl std::fmt::Display) -> Self {
        Self::Negotiation(format!("{step}: {err}"))
    }
}

/// Errors returned by [`Client`](crate::Client) entry points.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("a session is already active")]
    SessionActive,

    #[error("no active session")]
    NoSession,

    #[error("failed to create media transport: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Session(#[from] SessionError),
}
