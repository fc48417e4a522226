use std::fmt;

use crate::jid::JidError;

#[derive(Debug)]
pub enum XmlError {
    Io(std::io::Error),
    Syntax(String),
    InvalidNode,
    AttrParse(String),
    MissingAttr(String),
    InvalidUtf8(std::str::Utf8Error),
    Jid(JidError),
    UnexpectedEof,
    EmptyData,
    UnbalancedTag(String),
    LeftoverData(String),
    AttrList(Vec<XmlError>),
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XmlError::Io(e) => write!(f, "I/O error: {e}"),
            XmlError::Syntax(s) => write!(f, "XML syntax error: {s}"),
            XmlError::InvalidNode => write!(f, "Invalid node format"),
            XmlError::AttrParse(s) => write!(f, "Attribute parsing failed: {s}"),
            XmlError::MissingAttr(s) => write!(f, "Missing required attribute: {s}"),
            XmlError::InvalidUtf8(e) => write!(f, "Data is not valid UTF-8: {e}"),
            XmlError::Jid(e) => write!(f, "JID parsing error: {e}"),
            XmlError::UnexpectedEof => write!(f, "Unexpected end of XML document"),
            XmlError::EmptyData => write!(f, "Received empty data where a document was expected"),
            XmlError::UnbalancedTag(t) => write!(f, "Closing tag does not match: </{t}>"),
            XmlError::LeftoverData(t) => write!(f, "Leftover data after root element: <{t}>"),
            XmlError::AttrList(list) => write!(f, "Multiple attribute parsing errors: {list:?}"),
        }
    }
}

impl std::error::Error for XmlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            XmlError::Io(e) => Some(e),
            XmlError::InvalidUtf8(e) => Some(e),
            XmlError::Jid(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for XmlError {
    fn from(err: std::io::Error) -> Self {
        XmlError::Io(err)
    }
}
impl From<std::str::Utf8Error> for XmlError {
    fn from(err: std::str::Utf8Error) -> Self {
        XmlError::InvalidUtf8(err)
    }
}
impl From<JidError> for XmlError {
    fn from(err: JidError) -> Self {
        XmlError::Jid(err)
    }
}
impl From<quick_xml::Error> for XmlError {
    fn from(err: quick_xml::Error) -> Self {
        XmlError::Syntax(err.to_string())
    }
}

impl Clone for XmlError {
    fn clone(&self) -> Self {
        match self {
            XmlError::Io(e) => XmlError::Io(std::io::Error::new(e.kind(), e.to_string())),
            XmlError::Syntax(s) => XmlError::Syntax(s.clone()),
            XmlError::InvalidNode => XmlError::InvalidNode,
            XmlError::AttrParse(s) => XmlError::AttrParse(s.clone()),
            XmlError::MissingAttr(s) => XmlError::MissingAttr(s.clone()),
            XmlError::InvalidUtf8(e) => XmlError::InvalidUtf8(*e),
            XmlError::Jid(e) => XmlError::Jid(JidError::InvalidFormat(e.to_string())),
            XmlError::UnexpectedEof => XmlError::UnexpectedEof,
            XmlError::EmptyData => XmlError::EmptyData,
            XmlError::UnbalancedTag(t) => XmlError::UnbalancedTag(t.clone()),
            XmlError::LeftoverData(t) => XmlError::LeftoverData(t.clone()),
            XmlError::AttrList(list) => XmlError::AttrList(list.clone()),
        }
    }
}

pub type Result<T> = std::result::Result<T, XmlError>;
