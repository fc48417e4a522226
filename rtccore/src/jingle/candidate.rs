//! ICE candidate lines and their `<candidate>` element form (XEP-0176).

use log::debug;
use rand::distr::{Alphanumeric, SampleString};
use rtccore_xml::{Node, NodeBuilder};

use crate::error::JingleError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub foundation: String,
    pub component: String,
    pub protocol: String,
    pub priority: String,
    pub ip: String,
    pub port: String,
    pub kind: String,
    pub rel_addr: Option<String>,
    pub rel_port: Option<String>,
    pub tcptype: Option<String>,
    pub generation: String,
    pub network: String,
    pub id: String,
}

fn new_candidate_id() -> String {
    Alphanumeric
        .sample_string(&mut rand::rng(), 10)
        .to_lowercase()
}

impl Candidate {
    /// Parse `a=candidate:...` or the bare `candidate:...` form a media engine
    /// reports for trickled candidates.
    pub fn from_sdp_line(line: &str) -> Option<Self> {
        let body = line
            .strip_prefix("a=candidate:")
            .or_else(|| line.strip_prefix("candidate:"))?;
        let elems: Vec<&str> = body.split_whitespace().collect();
        if elems.len() < 8 || elems[6] != "typ" {
            return None;
        }

        let mut candidate = Self {
            foundation: elems[0].to_string(),
            component: elems[1].to_string(),
            protocol: elems[2].to_lowercase(),
            priority: elems[3].to_string(),
            ip: elems[4].to_string(),
            port: elems[5].to_string(),
            kind: elems[7].to_string(),
            rel_addr: None,
            rel_port: None,
            tcptype: None,
            generation: "0".to_string(),
            network: "1".to_string(),
            id: new_candidate_id(),
        };

        for pair in elems[8..].chunks(2) {
            let [key, value] = pair else {
                break;
            };
            match *key {
                "raddr" => candidate.rel_addr = Some(value.to_string()),
                "rport" => candidate.rel_port = Some(value.to_string()),
                "generation" => candidate.generation = value.to_string(),
                "tcptype" => candidate.tcptype = Some(value.to_string()),
                other => debug!("Ignoring candidate extension {other}={value}"),
            }
        }
        Some(candidate)
    }

    /// The `candidate:...` attribute value, without the `a=` prefix.
    pub fn to_attribute(&self) -> String {
        let mut line = format!(
            "candidate:{} {} {} {} {} {} typ {}",
            self.foundation, self.component, self.protocol, self.priority, self.ip, self.port, self.kind
        );
        if matches!(self.kind.as_str(), "srflx" | "prflx" | "relay")
            && let (Some(addr), Some(port)) = (&self.rel_addr, &self.rel_port)
        {
            line.push_str(&format!(" raddr {addr} rport {port}"));
        }
        if self.protocol.eq_ignore_ascii_case("tcp")
            && let Some(tcptype) = &self.tcptype
        {
            line.push_str(&format!(" tcptype {tcptype}"));
        }
        line.push_str(&format!(" generation {}", self.generation));
        line
    }

    pub fn to_sdp_line(&self) -> String {
        format!("a={}", self.to_attribute())
    }

    pub fn from_node(node: &Node) -> Result<Self, JingleError> {
        let mut attrs = node.attrs();
        let candidate = Self {
            foundation: attrs.string("foundation"),
            component: attrs.string("component"),
            protocol: attrs.string("protocol").to_lowercase(),
            priority: attrs.string("priority"),
            ip: attrs.string("ip"),
            port: attrs.string("port"),
            kind: attrs.string("type"),
            rel_addr: attrs.optional_string("rel-addr").map(str::to_string),
            rel_port: attrs.optional_string("rel-port").map(str::to_string),
            tcptype: attrs.optional_string("tcptype").map(str::to_string),
            generation: attrs
                .optional_string("generation")
                .unwrap_or("0")
                .to_string(),
            network: attrs.optional_string("network").unwrap_or("1").to_string(),
            id: attrs
                .optional_string("id")
                .map(str::to_string)
                .unwrap_or_else(new_candidate_id),
        };
        attrs.finish()?;
        Ok(candidate)
    }

    pub fn to_node(&self) -> Node {
        NodeBuilder::new("candidate")
            .attr("foundation", &self.foundation)
            .attr("component", &self.component)
            .attr("protocol", &self.protocol)
            .attr("priority", &self.priority)
            .attr("ip", &self.ip)
            .attr("port", &self.port)
            .attr("type", &self.kind)
            .opt_attr("rel-addr", self.rel_addr.as_deref())
            .opt_attr("rel-port", self.rel_port.as_deref())
            .opt_attr("tcptype", self.tcptype.as_deref())
            .attr("generation", &self.generation)
            .attr("network", &self.network)
            .attr("id", &self.id)
            .build()
    }
}
