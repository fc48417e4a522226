//! Parsing of inbound XMPP stanzas into typed signaling payloads.
//!
//! Handles `<iq>` carrying `<jingle>` or a disco#info query, MUC `<presence>`
//! and `<message type="groupchat">`. Anything else parses to `None`.

use rtccore_xml::{Jid, Node};

use crate::error::StanzaError;
use crate::jingle::builders::TerminateReason;
use crate::jingle::{JingleAction, NS_JINGLE};
use crate::types::ParticipantUpdate;

pub const NS_MUC_USER: &str = "http://jabber.org/protocol/muc#user";
pub const NS_NICK: &str = "http://jabber.org/protocol/nick";
pub const NS_DISCO_INFO: &str = "http://jabber.org/protocol/disco#info";
pub const NS_AUDIO_MUTED: &str = "http://jitsi.org/jitmeet/audio";
pub const NS_VIDEO_MUTED: &str = "http://jitsi.org/jitmeet/video";

/// MUC status code marking presence that refers to the receiving occupant.
pub const STATUS_SELF_PRESENCE: &str = "110";

/// An `<iq type="set">` carrying a `<jingle>` request.
#[derive(Debug, Clone, PartialEq)]
pub struct JingleMessage {
    pub id: String,
    pub from: Jid,
    pub to: Option<Jid>,
    pub action: JingleAction,
    pub sid: String,
    pub initiator: Option<Jid>,
    pub jingle: Node,
}

impl JingleMessage {
    pub fn parse(iq: &Node) -> Result<Self, StanzaError> {
        if iq.tag != "iq" {
            return Err(StanzaError::UnexpectedTag(iq.tag.clone()));
        }
        let jingle = iq
            .get_child_ns("jingle", NS_JINGLE)
            .or_else(|| iq.get_optional_child("jingle"))
            .ok_or(StanzaError::UnexpectedTag("iq".to_string()))?;

        let mut attrs = iq.attrs();
        let id = attrs.optional_string("id").unwrap_or_default().to_string();
        let from = attrs.jid("from");
        let to = attrs.optional_jid("to");
        attrs.finish()?;

        let mut jattrs = jingle.attrs();
        let action_name = jattrs
            .optional_string("action")
            .ok_or(StanzaError::MissingAttribute("action"))?;
        let action = JingleAction::from_name(action_name)
            .ok_or_else(|| crate::error::JingleError::UnknownAction(action_name.to_string()))?;
        let sid = jattrs
            .optional_string("sid")
            .ok_or(StanzaError::MissingAttribute("sid"))?
            .to_string();
        let initiator = jattrs.optional_jid("initiator");
        jattrs.finish()?;

        Ok(Self {
            id,
            from,
            to,
            action,
            sid,
            initiator,
            jingle: jingle.clone(),
        })
    }

    /// The `<reason>` condition of a `session-terminate`.
    pub fn terminate_reason(&self) -> Option<TerminateReason> {
        self.jingle
            .get_optional_child("reason")?
            .children()?
            .iter()
            .find_map(|c| TerminateReason::from_name(&c.tag))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceKind {
    Available,
    Unavailable,
    Error { condition: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresenceStanza {
    pub from: Jid,
    pub kind: PresenceKind,
    /// Status code 110: this presence is about the local occupant.
    pub is_self: bool,
    pub update: ParticipantUpdate,
}

impl PresenceStanza {
    pub fn parse(node: &Node) -> Result<Self, StanzaError> {
        if node.tag != "presence" {
            return Err(StanzaError::UnexpectedTag(node.tag.clone()));
        }
        let mut attrs = node.attrs();
        let from = attrs.jid("from");
        let kind = match attrs.optional_string("type") {
            Some("unavailable") => PresenceKind::Unavailable,
            Some("error") => PresenceKind::Error {
                condition: node
                    .get_optional_child("error")
                    .and_then(|e| e.children())
                    .and_then(|c| c.first())
                    .map(|c| c.tag.clone())
                    .unwrap_or_else(|| "undefined-condition".to_string()),
            },
            _ => PresenceKind::Available,
        };
        attrs.finish()?;

        let muc = node.get_child_ns("x", NS_MUC_USER);
        let is_self = muc.is_some_and(|x| {
            x.get_children_by_tag("status")
                .any(|s| s.attr("code") == Some(STATUS_SELF_PRESENCE))
        });
        let item = muc.and_then(|x| x.get_optional_child("item"));

        let flag = |tag: &str, ns: &str| {
            node.get_child_ns(tag, ns)
                .or_else(|| node.get_optional_child(tag))
                .and_then(|n| n.text())
                .map(|t| t.trim() == "true")
        };

        let update = ParticipantUpdate {
            nick: node
                .get_optional_child("nick")
                .and_then(|n| n.text())
                .map(str::to_string),
            status: node
                .get_optional_child("status")
                .and_then(|n| n.text())
                .map(str::to_string),
            real_jid: item
                .and_then(|i| i.attr("jid"))
                .and_then(|j| j.parse().ok()),
            role: item.and_then(|i| i.attr("role")).map(str::to_string),
            audio_muted: flag("audiomuted", NS_AUDIO_MUTED),
            video_muted: flag("videomuted", NS_VIDEO_MUTED),
        };

        Ok(Self {
            from,
            kind,
            is_self,
            update,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub from: Jid,
    pub id: Option<String>,
    pub body: String,
}

impl ChatMessage {
    pub fn parse(node: &Node) -> Result<Self, StanzaError> {
        if node.tag != "message" {
            return Err(StanzaError::UnexpectedTag(node.tag.clone()));
        }
        let mut attrs = node.attrs();
        let from = attrs.jid("from");
        let id = attrs.optional_string("id").map(str::to_string);
        attrs.finish()?;
        let body = node
            .get_optional_child("body")
            .and_then(|b| b.text())
            .unwrap_or_default()
            .to_string();
        Ok(Self { from, id, body })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityRequest {
    pub from: Jid,
    pub id: String,
    pub node: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stanza {
    Jingle(JingleMessage),
    Presence(PresenceStanza),
    GroupChat(ChatMessage),
    CapabilityRequest(CapabilityRequest),
}

impl Stanza {
    /// Classify and parse a stanza. Returns `Ok(None)` for stanzas this layer
    /// does not handle.
    pub fn parse(node: &Node) -> Result<Option<Self>, StanzaError> {
        match node.tag.as_str() {
            "presence" => Ok(Some(Self::Presence(PresenceStanza::parse(node)?))),
            "message" if node.attr("type") == Some("groupchat") => {
                if node.get_optional_child("body").is_none() {
                    return Ok(None);
                }
                Ok(Some(Self::GroupChat(ChatMessage::parse(node)?)))
            }
            "iq" if node.get_optional_child("jingle").is_some() => {
                Ok(Some(Self::Jingle(JingleMessage::parse(node)?)))
            }
            "iq" if node.attr("type") == Some("get") => {
                let Some(query) = node.get_child_ns("query", NS_DISCO_INFO) else {
                    return Ok(None);
                };
                let mut attrs = node.attrs();
                let from = attrs.jid("from");
                let id = attrs.string("id");
                attrs.finish()?;
                Ok(Some(Self::CapabilityRequest(CapabilityRequest {
                    from,
                    id,
                    node: query.attr("node").map(str::to_string),
                })))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtccore_xml::unmarshal;

    #[test]
    fn test_parse_session_initiate() {
        let iq = unmarshal(
            r#"<iq type="set" id="j1" from="room@conference.example.com/focus" to="alice@example.com/web">
                <jingle xmlns="urn:xmpp:jingle:1" action="session-initiate" sid="s1" initiator="focus@auth.example.com/focus"/>
            </iq>"#,
        )
        .unwrap();
        let Some(Stanza::Jingle(msg)) = Stanza::parse(&iq).unwrap() else {
            panic!("expected jingle stanza");
        };
        assert_eq!(msg.action, JingleAction::SessionInitiate);
        assert_eq!(msg.sid, "s1");
        assert_eq!(msg.from.resource(), Some("focus"));
        assert_eq!(msg.initiator.unwrap().server, "auth.example.com");
    }

    #[test]
    fn test_unknown_action_is_an_error() {
        let iq = unmarshal(
            r#"<iq type="set" from="a@b/c"><jingle xmlns="urn:xmpp:jingle:1" action="content-modify" sid="s1"/></iq>"#,
        )
        .unwrap();
        assert!(Stanza::parse(&iq).is_err());
    }

    #[test]
    fn test_terminate_reason() {
        let iq = unmarshal(
            r#"<iq type="set" from="a@b/c"><jingle xmlns="urn:xmpp:jingle:1" action="session-terminate" sid="s1"><reason><gone/></reason></jingle></iq>"#,
        )
        .unwrap();
        let msg = JingleMessage::parse(&iq).unwrap();
        assert_eq!(msg.terminate_reason(), Some(TerminateReason::Gone));
    }

    #[test]
    fn test_parse_self_presence() {
        let node = unmarshal(
            r#"<presence from="room@conference.example.com/alice">
                <x xmlns="http://jabber.org/protocol/muc#user">
                    <item affiliation="owner" role="moderator" jid="alice@example.com/web"/>
                    <status code="110"/>
                </x>
                <nick xmlns="http://jabber.org/protocol/nick">Alice</nick>
                <audiomuted xmlns="http://jitsi.org/jitmeet/audio">true</audiomuted>
                <videomuted xmlns="http://jitsi.org/jitmeet/video">false</videomuted>
            </presence>"#,
        )
        .unwrap();
        let presence = PresenceStanza::parse(&node).unwrap();
        assert!(presence.is_self);
        assert_eq!(presence.kind, PresenceKind::Available);
        assert_eq!(presence.update.nick.as_deref(), Some("Alice"));
        assert_eq!(presence.update.role.as_deref(), Some("moderator"));
        assert_eq!(presence.update.audio_muted, Some(true));
        assert_eq!(presence.update.video_muted, Some(false));
        assert_eq!(presence.update.real_jid.unwrap().user, "alice");
    }

    #[test]
    fn test_parse_presence_error_and_leave() {
        let error = unmarshal(
            r#"<presence type="error" from="room@conference.example.com/alice"><error type="cancel"><conflict xmlns="urn:ietf:params:xml:ns:xmpp-stanzas"/></error></presence>"#,
        )
        .unwrap();
        assert_eq!(
            PresenceStanza::parse(&error).unwrap().kind,
            PresenceKind::Error {
                condition: "conflict".to_string()
            }
        );

        let leave = unmarshal(r#"<presence type="unavailable" from="room@conference.example.com/bob"/>"#).unwrap();
        let parsed = PresenceStanza::parse(&leave).unwrap();
        assert_eq!(parsed.kind, PresenceKind::Unavailable);
        assert!(!parsed.is_self);
    }

    #[test]
    fn test_parse_groupchat_and_disco() {
        let msg = unmarshal(
            r#"<message type="groupchat" id="m1" from="room@conference.example.com/bob"><body>hi there</body></message>"#,
        )
        .unwrap();
        let Some(Stanza::GroupChat(chat)) = Stanza::parse(&msg).unwrap() else {
            panic!("expected group chat");
        };
        assert_eq!(chat.body, "hi there");
        assert_eq!(chat.id.as_deref(), Some("m1"));

        let disco = unmarshal(
            r#"<iq type="get" id="d1" from="room@conference.example.com/focus"><query xmlns="http://jabber.org/protocol/disco#info"/></iq>"#,
        )
        .unwrap();
        assert!(matches!(
            Stanza::parse(&disco).unwrap(),
            Some(Stanza::CapabilityRequest(ref req)) if req.id == "d1"
        ));

        let chat_state = unmarshal(r#"<message type="chat" from="a@b/c"><body>x</body></message>"#).unwrap();
        assert_eq!(Stanza::parse(&chat_state).unwrap(), None);
    }
}
