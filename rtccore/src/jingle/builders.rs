//! Builders for outbound `<jingle>` elements.

use rtccore_xml::{Jid, Node, NodeBuilder};

use super::candidate::Candidate;
use super::sources::SourceOwners;
use super::{Creator, JingleAction, NS_ICE_UDP, NS_JINGLE};
use crate::sdp::SessionDescription;

/// Jingle `<reason>` conditions used when terminating a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateReason {
    Success,
    Busy,
    Decline,
    FailedApplication,
    FailedTransport,
    Gone,
}

impl TerminateReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Busy => "busy",
            Self::Decline => "decline",
            Self::FailedApplication => "failed-application",
            Self::FailedTransport => "failed-transport",
            Self::Gone => "gone",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::Success,
            Self::Busy,
            Self::Decline,
            Self::FailedApplication,
            Self::FailedTransport,
            Self::Gone,
        ]
        .into_iter()
        .find(|r| r.as_str() == name)
    }
}

/// Builder for a `<jingle>` element.
pub struct JingleBuilder {
    action: JingleAction,
    sid: String,
    initiator: Option<Jid>,
    responder: Option<Jid>,
    contents: Vec<Node>,
    reason: Option<(TerminateReason, Option<String>)>,
}

impl JingleBuilder {
    pub fn new(action: JingleAction, sid: impl Into<String>) -> Self {
        Self {
            action,
            sid: sid.into(),
            initiator: None,
            responder: None,
            contents: Vec::new(),
            reason: None,
        }
    }

    pub fn initiator(mut self, jid: &Jid) -> Self {
        self.initiator = Some(jid.clone());
        self
    }

    pub fn responder(mut self, jid: &Jid) -> Self {
        self.responder = Some(jid.clone());
        self
    }

    pub fn contents(mut self, contents: impl IntoIterator<Item = Node>) -> Self {
        self.contents.extend(contents);
        self
    }

    pub fn reason(mut self, reason: TerminateReason, text: Option<String>) -> Self {
        self.reason = Some((reason, text));
        self
    }

    pub fn build(self) -> Node {
        let mut jingle = NodeBuilder::new("jingle")
            .attr("xmlns", NS_JINGLE)
            .attr("action", self.action.as_str())
            .attr("sid", self.sid)
            .opt_attr("initiator", self.initiator.map(String::from))
            .opt_attr("responder", self.responder.map(String::from));

        for content in self.contents {
            jingle = jingle.child(content);
        }

        if let Some((reason, text)) = self.reason {
            let mut reason_node = NodeBuilder::new("reason").child(NodeBuilder::new(reason.as_str()).build());
            if let Some(text) = text {
                reason_node = reason_node.child(NodeBuilder::new("text").string_content(text).build());
            }
            jingle = jingle.child(reason_node.build());
        }
        jingle.build()
    }
}

pub fn session_initiate(sid: &str, initiator: &Jid, sdp: &SessionDescription, owners: &SourceOwners) -> Node {
    JingleBuilder::new(JingleAction::SessionInitiate, sid)
        .initiator(initiator)
        .contents(sdp.to_jingle(Creator::Initiator, owners))
        .build()
}

pub fn session_accept(
    sid: &str,
    initiator: Option<&Jid>,
    responder: &Jid,
    sdp: &SessionDescription,
    owners: &SourceOwners,
) -> Node {
    let mut builder = JingleBuilder::new(JingleAction::SessionAccept, sid).responder(responder);
    if let Some(initiator) = initiator {
        builder = builder.initiator(initiator);
    }
    builder
        .contents(sdp.to_jingle(Creator::Responder, owners))
        .build()
}

/// `transport-info` carrying trickled candidates, one `<content>` per mid in
/// the order the mids first appear.
pub fn transport_info(
    sid: &str,
    creator: Creator,
    local: &SessionDescription,
    candidates: &[(String, Candidate)],
) -> Node {
    let mut mids: Vec<&str> = Vec::new();
    for (mid, _) in candidates {
        if !mids.contains(&mid.as_str()) {
            mids.push(mid);
        }
    }

    let contents = mids.into_iter().map(|mid| {
        let section = local
            .section_index_by_name(mid)
            .map(|idx| &local.media[idx]);
        let ufrag = section.and_then(|s| s.ice_ufrag(&local.session));
        let pwd = section.and_then(|s| s.ice_pwd(&local.session));
        let transport = NodeBuilder::new("transport")
            .attr("xmlns", NS_ICE_UDP)
            .opt_attr("ufrag", ufrag)
            .opt_attr("pwd", pwd)
            .children(
                candidates
                    .iter()
                    .filter(|(m, _)| m == mid)
                    .map(|(_, c)| c.to_node()),
            )
            .build();
        NodeBuilder::new("content")
            .attr("creator", creator.as_str())
            .attr("name", mid)
            .child(transport)
            .build()
    });

    JingleBuilder::new(JingleAction::TransportInfo, sid)
        .contents(contents.collect::<Vec<_>>())
        .build()
}

pub fn source_update(action: JingleAction, sid: &str, contents: Vec<Node>) -> Node {
    JingleBuilder::new(action, sid).contents(contents).build()
}

pub fn session_terminate(sid: &str, reason: TerminateReason, text: Option<String>) -> Node {
    JingleBuilder::new(JingleAction::SessionTerminate, sid)
        .reason(reason, text)
        .build()
}

/// Wrap a `<jingle>` element into an `<iq type="set">`.
pub fn wrap_iq(to: &Jid, id: &str, jingle: Node) -> Node {
    NodeBuilder::new("iq")
        .attr("to", to.to_string())
        .attr("type", "set")
        .attr("id", id)
        .child(jingle)
        .build()
}
