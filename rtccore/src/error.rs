use rtccore_xml::XmlError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SdpError {
    #[error("session description has no v= line")]
    MissingSessionLine,

    #[error("malformed m= line: {0}")]
    InvalidMediaLine(String),

    #[error("media section {0} does not exist")]
    NoSuchSection(usize),
}

#[derive(Debug, Error)]
pub enum JingleError {
    #[error("missing <{0}> element")]
    MissingElement(&'static str),

    #[error("missing required attribute: {0}")]
    MissingAttribute(&'static str),

    #[error("unknown jingle action: {0}")]
    UnknownAction(String),

    #[error("content '{0}' has neither a description nor an sctpmap")]
    EmptyContent(String),

    #[error("xml error: {0}")]
    Xml(#[from] XmlError),

    #[error("sdp error: {0}")]
    Sdp(#[from] SdpError),
}

#[derive(Debug, Error)]
pub enum StanzaError {
    #[error("unexpected stanza <{0}>")]
    UnexpectedTag(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(&'static str),

    #[error("jingle error: {0}")]
    Jingle(#[from] JingleError),

    #[error("xml error: {0}")]
    Xml(#[from] XmlError),
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("bridge message is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bridge message has no colibriClass")]
    MissingClass,
}
