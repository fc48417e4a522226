//! Parsers and builders for individual SDP attribute lines.
//!
//! Each type parses the full line (`a=rtpmap:...`) and renders back to the
//! same shape with `to_line`. Parsers return `None` for lines they cannot make
//! sense of; callers skip those lines.

use std::fmt;

pub fn find_line<'a>(lines: &'a [String], prefix: &str) -> Option<&'a str> {
    lines
        .iter()
        .map(String::as_str)
        .find(|line| line.starts_with(prefix))
}

pub fn find_lines<'a>(lines: &'a [String], prefix: &'a str) -> impl Iterator<Item = &'a str> {
    lines
        .iter()
        .map(String::as_str)
        .filter(move |line| line.starts_with(prefix))
}

/// Look in the media section first and fall back to the session part.
pub fn find_line_in<'a>(media: &'a [String], session: &'a [String], prefix: &str) -> Option<&'a str> {
    find_line(media, prefix).or_else(|| find_line(session, prefix))
}

/// All matching media-level lines, or the session-level ones if the section has none.
pub fn find_lines_in<'a>(media: &'a [String], session: &'a [String], prefix: &'a str) -> Vec<&'a str> {
    let found: Vec<&str> = find_lines(media, prefix).collect();
    if found.is_empty() {
        find_lines(session, prefix).collect()
    } else {
        found
    }
}

/// Strips characters that are not allowed in a jingle `<parameter value>`.
pub fn filter_special_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '\\' | '/' | '{' | ',' | '}' | '+'))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLine {
    pub media: String,
    pub port: String,
    pub proto: String,
    pub formats: Vec<String>,
}

impl MediaLine {
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.strip_prefix("m=")?.split_whitespace();
        let media = parts.next()?.to_string();
        let port = parts.next()?.to_string();
        let proto = parts.next()?.to_string();
        let formats: Vec<String> = parts.map(str::to_string).collect();
        if formats.is_empty() {
            return None;
        }
        Some(Self {
            media,
            port,
            proto,
            formats,
        })
    }
}

impl fmt::Display for MediaLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "m={} {} {} {}",
            self.media,
            self.port,
            self.proto,
            self.formats.join(" ")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rtpmap {
    pub id: String,
    pub name: String,
    pub clockrate: String,
    pub channels: Option<String>,
}

impl Rtpmap {
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix("a=rtpmap:")?;
        let (id, encoding) = rest.split_once(' ')?;
        let mut parts = encoding.split('/');
        let name = parts.next()?.to_string();
        let clockrate = parts.next().unwrap_or_default().to_string();
        let channels = parts.next().map(str::to_string);
        Some(Self {
            id: id.to_string(),
            name,
            clockrate,
            channels,
        })
    }

    /// RFC 3551 static assignment for a payload type that needs no
    /// `a=rtpmap` line.
    pub fn static_payload(id: &str) -> Option<Self> {
        let (name, clockrate, channels) = match id {
            "0" => ("PCMU", "8000", Some("1")),
            "3" => ("GSM", "8000", Some("1")),
            "4" => ("G723", "8000", Some("1")),
            "5" => ("DVI4", "8000", Some("1")),
            "6" => ("DVI4", "16000", Some("1")),
            "7" => ("LPC", "8000", Some("1")),
            "8" => ("PCMA", "8000", Some("1")),
            "9" => ("G722", "8000", Some("1")),
            "10" => ("L16", "44100", Some("2")),
            "11" => ("L16", "44100", Some("1")),
            "12" => ("QCELP", "8000", Some("1")),
            "13" => ("CN", "8000", Some("1")),
            "14" => ("MPA", "90000", None),
            "15" => ("G728", "8000", Some("1")),
            "16" => ("DVI4", "11025", Some("1")),
            "17" => ("DVI4", "22050", Some("1")),
            "18" => ("G729", "8000", Some("1")),
            "25" => ("CelB", "90000", None),
            "26" => ("JPEG", "90000", None),
            "28" => ("nv", "90000", None),
            "31" => ("H261", "90000", None),
            "32" => ("MPV", "90000", None),
            "33" => ("MP2T", "90000", None),
            "34" => ("H263", "90000", None),
            _ => return None,
        };
        Some(Self {
            id: id.to_string(),
            name: name.to_string(),
            clockrate: clockrate.to_string(),
            channels: channels.map(str::to_string),
        })
    }

    pub fn to_line(&self) -> String {
        let mut line = format!("a=rtpmap:{} {}/{}", self.id, self.name, self.clockrate);
        if let Some(channels) = &self.channels
            && channels != "1"
        {
            line.push('/');
            line.push_str(channels);
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FmtpParam {
    pub name: Option<String>,
    pub value: String,
}

/// `a=fmtp:<pt> k=v;k2=v2` into the payload type and its parameters.
pub fn parse_fmtp(line: &str) -> Option<(String, Vec<FmtpParam>)> {
    let rest = line.strip_prefix("a=fmtp:")?;
    let (pt, params) = rest.split_once(' ')?;
    let params = params
        .split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| match p.split_once('=') {
            Some((name, value)) => FmtpParam {
                name: Some(name.to_string()),
                value: value.to_string(),
            },
            None => FmtpParam {
                name: None,
                value: p.to_string(),
            },
        })
        .collect();
    Some((pt.to_string(), params))
}

pub fn build_fmtp(pt: &str, params: &[FmtpParam]) -> String {
    let joined: Vec<String> = params
        .iter()
        .map(|p| match &p.name {
            Some(name) => format!("{name}={}", p.value),
            None => p.value.clone(),
        })
        .collect();
    format!("a=fmtp:{pt} {}", joined.join("; "))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcpFb {
    pub pt: String,
    pub kind: String,
    pub params: Vec<String>,
}

impl RtcpFb {
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.strip_prefix("a=rtcp-fb:")?.split(' ');
        let pt = parts.next()?.to_string();
        let kind = parts.next()?.to_string();
        Some(Self {
            pt,
            kind,
            params: parts.map(str::to_string).collect(),
        })
    }

    pub fn to_line(&self) -> String {
        let mut line = format!("a=rtcp-fb:{} {}", self.pt, self.kind);
        for p in &self.params {
            line.push(' ');
            line.push_str(p);
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extmap {
    pub id: String,
    pub direction: Option<String>,
    pub uri: String,
}

impl Extmap {
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.strip_prefix("a=extmap:")?.split(' ');
        let id_dir = parts.next()?;
        let uri = parts.next()?.to_string();
        let (id, direction) = match id_dir.split_once('/') {
            Some((id, dir)) => (id.to_string(), Some(dir.to_string())),
            None => (id_dir.to_string(), None),
        };
        Some(Self { id, direction, uri })
    }

    pub fn to_line(&self) -> String {
        match &self.direction {
            Some(dir) => format!("a=extmap:{}/{} {}", self.id, dir, self.uri),
            None => format!("a=extmap:{} {}", self.id, self.uri),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crypto {
    pub tag: String,
    pub suite: String,
    pub key_params: String,
    pub session_params: Option<String>,
}

impl Crypto {
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.strip_prefix("a=crypto:")?.split(' ');
        let tag = parts.next()?.to_string();
        let suite = parts.next()?.to_string();
        let key_params = parts.next()?.to_string();
        let rest: Vec<&str> = parts.collect();
        Some(Self {
            tag,
            suite,
            key_params,
            session_params: (!rest.is_empty()).then(|| rest.join(" ")),
        })
    }

    pub fn to_line(&self) -> String {
        let mut line = format!("a=crypto:{} {} {}", self.tag, self.suite, self.key_params);
        if let Some(sp) = &self.session_params {
            line.push(' ');
            line.push_str(sp);
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub hash: String,
    pub value: String,
}

impl Fingerprint {
    pub fn parse(line: &str) -> Option<Self> {
        let (hash, value) = line.strip_prefix("a=fingerprint:")?.split_once(' ')?;
        Some(Self {
            hash: hash.to_string(),
            value: value.to_string(),
        })
    }

    pub fn to_line(&self) -> String {
        format!("a=fingerprint:{} {}", self.hash, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sctpmap {
    pub number: String,
    pub protocol: String,
    pub streams: Option<String>,
}

impl Sctpmap {
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.strip_prefix("a=sctpmap:")?.split(' ');
        Some(Self {
            number: parts.next()?.to_string(),
            protocol: parts.next()?.to_string(),
            streams: parts.next().map(str::to_string),
        })
    }

    pub fn to_line(&self) -> String {
        match &self.streams {
            Some(streams) => format!("a=sctpmap:{} {} {}", self.number, self.protocol, streams),
            None => format!("a=sctpmap:{} {}", self.number, self.protocol),
        }
    }
}

/// One `a=ssrc:<id> <name>[:<value>]` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsrcLine {
    pub ssrc: u32,
    pub name: String,
    pub value: Option<String>,
}

impl SsrcLine {
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix("a=ssrc:")?;
        let (id, attr) = match rest.split_once(' ') {
            Some((id, attr)) => (id, attr),
            None => (rest, ""),
        };
        let ssrc = id.parse().ok()?;
        let (name, value) = match attr.split_once(':') {
            Some((n, v)) => (n.to_string(), Some(v.to_string())),
            None => (attr.to_string(), None),
        };
        Some(Self { ssrc, name, value })
    }

    pub fn to_line(&self) -> String {
        match &self.value {
            Some(v) if !v.is_empty() => format!("a=ssrc:{} {}:{}", self.ssrc, self.name, v),
            _ => format!("a=ssrc:{} {}", self.ssrc, self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SsrcGroup {
    pub semantics: String,
    pub ssrcs: Vec<u32>,
}

impl SsrcGroup {
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.strip_prefix("a=ssrc-group:")?.split_whitespace();
        let semantics = parts.next()?.to_string();
        let ssrcs: Vec<u32> = parts.filter_map(|s| s.parse().ok()).collect();
        if ssrcs.is_empty() {
            return None;
        }
        Some(Self { semantics, ssrcs })
    }

    pub fn to_line(&self) -> String {
        let ids: Vec<String> = self.ssrcs.iter().map(u32::to_string).collect();
        format!("a=ssrc-group:{} {}", self.semantics, ids.join(" "))
    }
}
