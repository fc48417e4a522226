//! The room signaling boundary.
//!
//! Outbound requests go through [`SignalingChannel`]. Inbound traffic reaches
//! the session as [`SignalingEvent`]s, either constructed directly by the
//! XMPP layer or parsed from stanzas with [`SignalingEvent::from_stanza`].

use async_trait::async_trait;
use rtccore::jingle::builders::TerminateReason;
use rtccore::stanza::{JingleMessage, PresenceKind, PresenceStanza, Stanza};
use rtccore::types::ParticipantUpdate;
use rtccore::xml::{Jid, Node};

use crate::config::SessionConfig;
use crate::error::SignalingError;

/// Outbound requests to the room and the focus.
///
/// Jingle payloads are passed as `<jingle>` elements; wrapping them into
/// `<iq>` stanzas and tracking replies is up to the implementation.
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    /// Join the room, or refresh presence, as `occupant`.
    async fn send_presence(&self, occupant: &Jid, update: &ParticipantUpdate) -> Result<(), SignalingError>;

    async fn send_unavailable_presence(&self, occupant: &Jid) -> Result<(), SignalingError>;

    /// Start the periodic presence refresh for `room`.
    async fn send_presence_alive(&self, room: &Jid) -> Result<(), SignalingError>;

    async fn stop_presence_alive(&self, room: &Jid) -> Result<(), SignalingError>;

    /// Ask the allocation service for a room. Answered by
    /// [`SignalingEvent::AllocateSuccess`].
    async fn send_allocate(&self, config: &SessionConfig) -> Result<(), SignalingError>;

    /// Advertise supported features to `to`, as a reply when `request_id` is set.
    async fn send_capabilities(
        &self,
        to: &Jid,
        request_id: Option<&str>,
        features: &[String],
    ) -> Result<(), SignalingError>;

    async fn send_session_initiate(&self, to: &Jid, jingle: Node) -> Result<(), SignalingError>;

    async fn send_session_accept(&self, to: &Jid, jingle: Node) -> Result<(), SignalingError>;

    async fn send_transport_info(&self, to: &Jid, jingle: Node) -> Result<(), SignalingError>;

    async fn send_source_add(&self, to: &Jid, jingle: Node) -> Result<(), SignalingError>;

    async fn send_source_remove(&self, to: &Jid, jingle: Node) -> Result<(), SignalingError>;

    async fn send_session_terminate(&self, to: &Jid, jingle: Node) -> Result<(), SignalingError>;

    /// Rayo `dial` through the focus.
    async fn send_rayo(&self, focus: &Jid, to: &str, from: Option<&str>) -> Result<(), SignalingError>;

    async fn send_hold(&self, focus: &Jid) -> Result<(), SignalingError>;

    async fn send_unhold(&self, focus: &Jid) -> Result<(), SignalingError>;

    async fn send_hangup(&self, focus: &Jid) -> Result<(), SignalingError>;

    async fn send_group_chat_message(&self, room: &Jid, id: &str, body: &str) -> Result<(), SignalingError>;
}

/// Inbound signaling traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalingEvent {
    /// An occupant is present: a join or an update of a known occupant.
    Presence {
        from: Jid,
        is_self: bool,
        update: ParticipantUpdate,
    },
    PresenceLeave {
        from: Jid,
        is_self: bool,
    },
    PresenceError {
        from: Jid,
        condition: String,
    },
    Jingle(JingleMessage),
    CapabilityRequest {
        from: Jid,
        id: String,
    },
    /// The allocation service created `room`.
    AllocateSuccess {
        room: Jid,
    },
    GroupChatMessage {
        from: Jid,
        id: Option<String>,
        body: String,
    },
    /// The server echoed back a group chat message we sent.
    ChatAck {
        id: String,
    },
    Disconnected {
        reason: Option<String>,
    },
}

/// Routing key of a [`SignalingEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Presence,
    Jingle,
    Discovery,
    Room,
    Chat,
    Connection,
}

impl EventKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Presence => "presence",
            Self::Jingle => "jingle",
            Self::Discovery => "discovery",
            Self::Room => "room",
            Self::Chat => "chat",
            Self::Connection => "connection",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SignalingEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Presence { .. } | Self::PresenceLeave { .. } | Self::PresenceError { .. } => EventKind::Presence,
            Self::Jingle(_) => EventKind::Jingle,
            Self::CapabilityRequest { .. } => EventKind::Discovery,
            Self::AllocateSuccess { .. } => EventKind::Room,
            Self::GroupChatMessage { .. } | Self::ChatAck { .. } => EventKind::Chat,
            Self::Disconnected { .. } => EventKind::Connection,
        }
    }

    /// Convert a parsed stanza. `own_occupant` lets a group chat echo of a
    /// message we sent become a [`SignalingEvent::ChatAck`].
    pub fn from_stanza(stanza: Stanza, own_occupant: Option<&Jid>) -> Self {
        match stanza {
            Stanza::Jingle(msg) => Self::Jingle(msg),
            Stanza::Presence(presence) => Self::from_presence(presence),
            Stanza::GroupChat(chat) => match (&chat.id, own_occupant) {
                (Some(id), Some(me)) if chat.from == *me => Self::ChatAck { id: id.clone() },
                _ => Self::GroupChatMessage {
                    from: chat.from,
                    id: chat.id,
                    body: chat.body,
                },
            },
            Stanza::CapabilityRequest(req) => Self::CapabilityRequest {
                from: req.from,
                id: req.id,
            },
        }
    }

    fn from_presence(presence: PresenceStanza) -> Self {
        match presence.kind {
            PresenceKind::Available => Self::Presence {
                from: presence.from,
                is_self: presence.is_self,
                update: presence.update,
            },
            PresenceKind::Unavailable => Self::PresenceLeave {
                from: presence.from,
                is_self: presence.is_self,
            },
            PresenceKind::Error { condition } => Self::PresenceError {
                from: presence.from,
                condition,
            },
        }
    }

    /// Parse a raw stanza. `Ok(None)` for stanzas that carry no session traffic.
    pub fn parse(node: &Node, own_occupant: Option<&Jid>) -> Result<Option<Self>, rtccore::error::StanzaError> {
        Ok(Stanza::parse(node)?.map(|s| Self::from_stanza(s, own_occupant)))
    }

    /// Terminate reason of a `session-terminate`, if this is one.
    pub fn terminate_reason(&self) -> Option<TerminateReason> {
        match self {
            Self::Jingle(msg) => msg.terminate_reason(),
            _ => None,
        }
    }
}
