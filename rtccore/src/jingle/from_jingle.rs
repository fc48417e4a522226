use log::debug;
use rtccore_xml::Node;

use super::candidate::Candidate;
use super::{NS_DTLS, NS_GROUPING, NS_HDREXT, NS_ICE_UDP, NS_SCTP, NS_SSMA};
use crate::error::JingleError;
use crate::sdp::lines::{Rtpmap, SsrcLine, filter_special_chars};
use crate::sdp::{Direction, MediaSection, SessionDescription};

const SESSION_HEADER: [&str; 4] = [
    "v=0",
    "o=- 1923518516 2 IN IP4 0.0.0.0",
    "s=-",
    "t=0 0",
];

impl SessionDescription {
    /// Build a description from a `<jingle>` element (or any element whose
    /// children are `<group>` and `<content>` nodes).
    ///
    /// Payload type ids are copied as-is into the `m=` line and sections
    /// follow the order of the `<content>` elements.
    pub fn from_jingle(jingle: &Node) -> Result<Self, JingleError> {
        let mut session: Vec<String> = SESSION_HEADER.iter().map(|l| l.to_string()).collect();

        for group in jingle.get_children_by_tag("group") {
            if group.xmlns().is_some_and(|ns| ns != NS_GROUPING) {
                continue;
            }
            let semantics = group
                .attr("semantics")
                .or_else(|| group.attr("type"))
                .ok_or(JingleError::MissingAttribute("semantics"))?;
            let names: Vec<&str> = group
                .get_children_by_tag("content")
                .filter_map(|c| c.attr("name"))
                .collect();
            if !names.is_empty() {
                session.push(format!("a=group:{semantics} {}", names.join(" ")));
            }
        }

        let media = jingle
            .get_children_by_tag("content")
            .map(content_to_media)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { session, media })
    }
}

fn content_to_media(content: &Node) -> Result<MediaSection, JingleError> {
    let name = content
        .attr("name")
        .ok_or(JingleError::MissingAttribute("name"))?;
    let senders = content.attr("senders");
    let desc = content.get_optional_child("description");
    let transport = content.get_child_ns("transport", NS_ICE_UDP);
    let sctp = transport.and_then(|t| t.get_child_ns("sctpmap", NS_SCTP));
    let has_fingerprint = transport.is_some_and(|t| t.get_child_ns("fingerprint", NS_DTLS).is_some());

    let port = if senders == Some("rejected") { "0" } else { "1" };
    let mut lines = Vec::new();

    if let Some(sctp) = sctp {
        let number = sctp.attr("number").unwrap_or("5000");
        lines.push(format!("m=application {port} DTLS/SCTP {number}"));
        let mut sctpmap = format!(
            "a=sctpmap:{number} {}",
            sctp.attr("protocol").unwrap_or("webrtc-datachannel")
        );
        if let Some(streams) = sctp.attr("streams") {
            sctpmap.push(' ');
            sctpmap.push_str(streams);
        }
        lines.push(sctpmap);
    } else {
        let desc = desc.ok_or_else(|| JingleError::EmptyContent(name.to_string()))?;
        let media = desc.attr("media").unwrap_or(name);
        let proto = if has_fingerprint { "RTP/SAVPF" } else { "RTP/AVPF" };
        let formats: Vec<&str> = desc
            .get_children_by_tag("payload-type")
            .filter_map(|pt| pt.attr("id"))
            .collect();
        if formats.is_empty() {
            return Err(JingleError::EmptyContent(name.to_string()));
        }
        lines.push(format!("m={media} {port} {proto} {}", formats.join(" ")));
    }

    lines.push("c=IN IP4 0.0.0.0".to_string());
    if sctp.is_none() {
        lines.push("a=rtcp:1 IN IP4 0.0.0.0".to_string());
    }

    if let Some(transport) = transport {
        if let Some(ufrag) = transport.attr("ufrag") {
            lines.push(format!("a=ice-ufrag:{ufrag}"));
        }
        if let Some(pwd) = transport.attr("pwd") {
            lines.push(format!("a=ice-pwd:{pwd}"));
        }
        for fp in transport
            .get_children_by_tag("fingerprint")
            .filter(|f| f.xmlns() == Some(NS_DTLS))
        {
            lines.push(format!(
                "a=fingerprint:{} {}",
                fp.attr("hash").unwrap_or_default(),
                fp.text().unwrap_or_default()
            ));
            if let Some(setup) = fp.attr("setup") {
                lines.push(format!("a=setup:{setup}"));
            }
        }
        for candidate in transport.get_children_by_tag("candidate") {
            match Candidate::from_node(candidate) {
                Ok(c) => lines.push(c.to_sdp_line()),
                Err(e) => debug!("Skipping malformed candidate in '{name}': {e}"),
            }
        }
    }

    if let Some(direction) = senders.and_then(Direction::from_senders) {
        lines.push(format!("a={}", direction.attribute()));
    }
    lines.push(format!("a=mid:{name}"));

    if let Some(desc) = desc.filter(|_| sctp.is_none()) {
        description_lines(desc, &mut lines);
    }

    Ok(MediaSection { lines })
}

fn description_lines(desc: &Node, lines: &mut Vec<String>) {
    if desc.get_optional_child("rtcp-mux").is_some() {
        lines.push("a=rtcp-mux".to_string());
    }

    if let Some(encryption) = desc.get_optional_child("encryption") {
        for crypto in encryption.get_children_by_tag("crypto") {
            let mut line = format!(
                "a=crypto:{} {} {}",
                crypto.attr("tag").unwrap_or_default(),
                crypto.attr("crypto-suite").unwrap_or_default(),
                crypto.attr("key-params").unwrap_or_default()
            );
            if let Some(sp) = crypto.attr("session-params") {
                line.push(' ');
                line.push_str(sp);
            }
            lines.push(line);
        }
    }

    for pt in desc.get_children_by_tag("payload-type") {
        let Some(id) = pt.attr("id") else {
            continue;
        };
        if let Some(name) = pt.attr("name").filter(|n| !n.is_empty()) {
            lines.push(
                Rtpmap {
                    id: id.to_string(),
                    name: name.to_string(),
                    clockrate: pt.attr("clockrate").unwrap_or_default().to_string(),
                    channels: pt.attr("channels").map(str::to_string),
                }
                .to_line(),
            );
        }

        let params: Vec<String> = pt
            .get_children_by_tag("parameter")
            .map(|p| match p.attr("name") {
                Some(name) => format!("{name}={}", p.attr("value").unwrap_or_default()),
                None => p.attr("value").unwrap_or_default().to_string(),
            })
            .collect();
        if !params.is_empty() {
            lines.push(format!("a=fmtp:{id} {}", params.join("; ")));
        }
        rtcp_fb_lines(pt, id, lines);
    }
    rtcp_fb_lines(desc, "*", lines);

    for ext in desc
        .get_children_by_tag("rtp-hdrext")
        .filter(|e| e.xmlns() == Some(NS_HDREXT))
    {
        let (Some(id), Some(uri)) = (ext.attr("id"), ext.attr("uri")) else {
            continue;
        };
        lines.push(format!("a=extmap:{id} {uri}"));
    }

    for group in desc
        .get_children_by_tag("ssrc-group")
        .filter(|g| g.xmlns() == Some(NS_SSMA))
    {
        let ssrcs: Vec<&str> = group
            .get_children_by_tag("source")
            .filter_map(|s| s.attr("ssrc"))
            .collect();
        if !ssrcs.is_empty() {
            lines.push(format!(
                "a=ssrc-group:{} {}",
                group.attr("semantics").unwrap_or_default(),
                ssrcs.join(" ")
            ));
        }
    }

    for source in desc
        .get_children_by_tag("source")
        .filter(|s| s.xmlns() == Some(NS_SSMA))
    {
        lines.extend(source_lines(source));
    }
}

fn rtcp_fb_lines(elem: &Node, pt: &str, lines: &mut Vec<String>) {
    for trr in elem.get_children_by_tag("rtcp-fb-trr-int") {
        lines.push(format!(
            "a=rtcp-fb:{pt} trr-int {}",
            trr.attr("value").unwrap_or("0")
        ));
    }
    for fb in elem.get_children_by_tag("rtcp-fb") {
        let Some(kind) = fb.attr("type") else {
            continue;
        };
        match fb.attr("subtype") {
            Some(subtype) => lines.push(format!("a=rtcp-fb:{pt} {kind} {subtype}")),
            None => lines.push(format!("a=rtcp-fb:{pt} {kind}")),
        }
    }
}

/// `a=ssrc` lines for one `<source>` element. Sources with an unparseable
/// ssrc yield nothing.
pub(crate) fn source_lines(source: &Node) -> Vec<String> {
    let Some(ssrc) = source.attr("ssrc").and_then(|s| s.parse::<u32>().ok()) else {
        return Vec::new();
    };
    source
        .get_children_by_tag("parameter")
        .filter_map(|p| {
            let name = p.attr("name")?;
            Some(
                SsrcLine {
                    ssrc,
                    name: name.to_string(),
                    value: p.attr("value").map(filter_special_chars),
                }
                .to_line(),
            )
        })
        .collect()
}
