use rtccore_xml::{Node, NodeBuilder};

use super::candidate::Candidate;
use super::sources::SourceOwners;
use super::{Creator, NS_DTLS, NS_GROUPING, NS_HDREXT, NS_ICE_UDP, NS_RTCP_FB, NS_RTP, NS_SCTP, NS_SSMA, NS_SSRC_INFO};
use crate::sdp::lines::{
    Crypto, Extmap, Fingerprint, RtcpFb, Rtpmap, Sctpmap, SsrcGroup, filter_special_chars, find_line_in, find_lines_in,
    parse_fmtp,
};
use crate::sdp::{Direction, MediaSection, SessionDescription, Source};

impl SessionDescription {
    /// Render the description as the children of a `<jingle>` element: one
    /// `<group>` per `a=group` line, then one `<content>` per audio, video or
    /// application section in section order.
    pub fn to_jingle(&self, creator: Creator, owners: &SourceOwners) -> Vec<Node> {
        let mut nodes: Vec<Node> = self
            .groups()
            .into_iter()
            .map(|(semantics, mids)| {
                NodeBuilder::new("group")
                    .attr("xmlns", NS_GROUPING)
                    .attr("semantics", semantics)
                    .children(
                        mids.into_iter()
                            .map(|mid| NodeBuilder::new("content").attr("name", mid).build()),
                    )
                    .build()
            })
            .collect();

        for section in &self.media {
            let media = section.media_type();
            if !matches!(media, "audio" | "video" | "application") {
                continue;
            }
            nodes.push(self.content_to_jingle(section, creator, owners));
        }
        nodes
    }

    fn content_to_jingle(&self, section: &MediaSection, creator: Creator, owners: &SourceOwners) -> Node {
        let mut content = NodeBuilder::new("content")
            .attr("creator", creator.as_str())
            .attr("name", section.name());

        if section.is_rtp() {
            content = content.child(self.description_to_jingle(section, owners));
        }
        content = content.child(self.transport_to_jingle(section));

        let senders = section
            .lines
            .iter()
            .chain(self.session.iter())
            .find_map(|l| Direction::from_attribute(l))
            .map(|d| d.senders());
        let rejected = section.m_line().is_some_and(|m| m.port == "0")
            && find_line_in(&section.lines, &self.session, "a=bundle-only").is_none();
        if rejected {
            content = content.attr("senders", "rejected");
        } else if let Some(senders) = senders {
            content = content.attr("senders", senders);
        }
        content.build()
    }

    fn description_to_jingle(&self, section: &MediaSection, owners: &SourceOwners) -> Node {
        let media = section.media_type();
        let sources = section.sources();
        let mut desc = NodeBuilder::new("description")
            .attr("xmlns", NS_RTP)
            .attr("media", media);
        if let Some(first) = sources.first() {
            desc = desc.attr("ssrc", first.ssrc.to_string());
        }

        let formats = section.m_line().map(|m| m.formats).unwrap_or_default();
        for pt in &formats {
            let mut payload = NodeBuilder::new("payload-type").attr("id", pt);
            if let Some(rtpmap) = section.rtpmap(pt).or_else(|| Rtpmap::static_payload(pt)) {
                payload = payload
                    .attr("name", rtpmap.name)
                    .attr("clockrate", rtpmap.clockrate)
                    .attr("channels", rtpmap.channels.as_deref().unwrap_or("1"));
            }
            if let Some((_, params)) = section.fmtp(pt).and_then(parse_fmtp) {
                for param in params {
                    payload = payload.child(
                        NodeBuilder::new("parameter")
                            .opt_attr("name", param.name)
                            .attr("value", param.value)
                            .build(),
                    );
                }
            }
            for fb in section.rtcp_fbs(pt) {
                payload = payload.child(rtcp_fb_to_jingle(&fb));
            }
            desc = desc.child(payload.build());
        }

        let crypto: Vec<Crypto> = find_lines_in(&section.lines, &self.session, "a=crypto:")
            .into_iter()
            .filter_map(Crypto::parse)
            .collect();
        if !crypto.is_empty() {
            desc = desc.child(
                NodeBuilder::new("encryption")
                    .attr("required", "1")
                    .children(crypto.into_iter().map(|c| {
                        NodeBuilder::new("crypto")
                            .attr("tag", c.tag)
                            .attr("crypto-suite", c.suite)
                            .attr("key-params", c.key_params)
                            .opt_attr("session-params", c.session_params)
                            .build()
                    }))
                    .build(),
            );
        }

        for source in &sources {
            desc = desc.child(source_to_jingle(source, owners));
        }
        for group in section.ssrc_groups() {
            desc = desc.child(group_to_jingle(&group));
        }

        if section.find_line("a=rtcp-mux").is_some() {
            desc = desc.child(NodeBuilder::new("rtcp-mux").build());
        }
        for fb in section.rtcp_fbs("*") {
            desc = desc.child(rtcp_fb_to_jingle(&fb));
        }
        for extmap in section.find_lines("a=extmap:").filter_map(Extmap::parse) {
            let senders = extmap
                .direction
                .as_deref()
                .and_then(Direction::from_attribute)
                .map(|d| d.senders());
            desc = desc.child(
                NodeBuilder::new("rtp-hdrext")
                    .attr("xmlns", NS_HDREXT)
                    .attr("id", extmap.id)
                    .attr("uri", extmap.uri)
                    .opt_attr("senders", senders)
                    .build(),
            );
        }
        desc.build()
    }

    fn transport_to_jingle(&self, section: &MediaSection) -> Node {
        let mut transport = NodeBuilder::new("transport").attr("xmlns", NS_ICE_UDP);

        if let Some(sctp) = find_line_in(&section.lines, &self.session, "a=sctpmap:").and_then(Sctpmap::parse) {
            transport = transport.child(
                NodeBuilder::new("sctpmap")
                    .attr("xmlns", NS_SCTP)
                    .attr("number", sctp.number)
                    .attr("protocol", sctp.protocol)
                    .opt_attr("streams", sctp.streams)
                    .build(),
            );
        } else if let Some(port) = section.find_line("a=sctp-port:") {
            transport = transport.child(
                NodeBuilder::new("sctpmap")
                    .attr("xmlns", NS_SCTP)
                    .attr("number", &port["a=sctp-port:".len()..])
                    .attr("protocol", "webrtc-datachannel")
                    .build(),
            );
        }

        let setup = find_line_in(&section.lines, &self.session, "a=setup:").map(|l| &l["a=setup:".len()..]);
        for fp in find_lines_in(&section.lines, &self.session, "a=fingerprint:")
            .into_iter()
            .filter_map(Fingerprint::parse)
        {
            transport = transport.child(
                NodeBuilder::new("fingerprint")
                    .attr("xmlns", NS_DTLS)
                    .attr("hash", fp.hash)
                    .opt_attr("setup", setup)
                    .string_content(fp.value)
                    .build(),
            );
        }

        if let (Some(ufrag), Some(pwd)) = (section.ice_ufrag(&self.session), section.ice_pwd(&self.session)) {
            transport = transport.attr("ufrag", ufrag).attr("pwd", pwd);
            for line in find_lines_in(&section.lines, &self.session, "a=candidate:") {
                if let Some(candidate) = Candidate::from_sdp_line(line) {
                    transport = transport.child(candidate.to_node());
                }
            }
        }
        transport.build()
    }
}

fn rtcp_fb_to_jingle(fb: &RtcpFb) -> Node {
    if fb.kind == "trr-int" {
        return NodeBuilder::new("rtcp-fb-trr-int")
            .attr("xmlns", NS_RTCP_FB)
            .attr("value", fb.params.first().map(String::as_str).unwrap_or("0"))
            .build();
    }
    NodeBuilder::new("rtcp-fb")
        .attr("xmlns", NS_RTCP_FB)
        .attr("type", &fb.kind)
        .opt_attr("subtype", fb.params.first())
        .build()
}

pub(crate) fn group_to_jingle(group: &SsrcGroup) -> Node {
    NodeBuilder::new("ssrc-group")
        .attr("xmlns", NS_SSMA)
        .attr("semantics", &group.semantics)
        .children(group.ssrcs.iter().map(|ssrc| {
            NodeBuilder::new("source")
                .attr("ssrc", ssrc.to_string())
                .build()
        }))
        .build()
}

pub(crate) fn source_to_jingle(source: &Source, owners: &SourceOwners) -> Node {
    let mut node = NodeBuilder::new("source")
        .attr("xmlns", NS_SSMA)
        .attr("ssrc", source.ssrc.to_string());
    for (name, value) in &source.params {
        node = node.child(
            NodeBuilder::new("parameter")
                .attr("name", name)
                .opt_attr("value", value.as_deref().map(filter_special_chars))
                .build(),
        );
    }
    if let Some(owner) = owners.owner_of(source.ssrc) {
        node = node.child(
            NodeBuilder::new("ssrc-info")
                .attr("xmlns", NS_SSRC_INFO)
                .attr("owner", owner.to_string())
                .build(),
        );
    }
    node.build()
}
