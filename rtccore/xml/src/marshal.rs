use std::io::Write;

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::{Attrs, Node, NodeContent, Result, XmlError};

/// Parse a single XML element (with its subtree) from text.
///
/// Whitespace-only text between elements is dropped; text mixed with child
/// elements is not representable and the text part is discarded.
pub fn unmarshal(xml: &str) -> Result<Node> {
    if xml.trim().is_empty() {
        return Err(XmlError::EmptyData);
    }

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => {
                let node = start_node(e)?;
                if root.is_some() {
                    return Err(XmlError::LeftoverData(node.tag));
                }
                stack.push(node);
            }
            Event::Empty(ref e) => {
                let node = start_node(e)?;
                if root.is_some() {
                    return Err(XmlError::LeftoverData(node.tag));
                }
                match stack.last_mut() {
                    Some(parent) => parent.push_child(node),
                    None => root = Some(node),
                }
            }
            Event::End(ref e) => {
                let tag = std::str::from_utf8(e.name().as_ref())?.to_string();
                let node = stack.pop().ok_or_else(|| XmlError::UnbalancedTag(tag.clone()))?;
                if node.tag != tag {
                    return Err(XmlError::UnbalancedTag(tag));
                }
                match stack.last_mut() {
                    Some(parent) => parent.push_child(node),
                    None => root = Some(node),
                }
            }
            Event::Text(ref e) => {
                let text = e.unescape()?;
                push_text(&mut stack, &text);
            }
            Event::CData(e) => {
                let bytes = e.into_inner();
                let text = std::str::from_utf8(&bytes)?;
                push_text(&mut stack, text);
            }
            Event::Eof => break,
            // declarations, comments, processing instructions
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(XmlError::UnexpectedEof);
    }
    root.ok_or(XmlError::InvalidNode)
}

fn start_node(e: &BytesStart<'_>) -> Result<Node> {
    let tag = std::str::from_utf8(e.name().as_ref())?.to_string();
    let mut attrs = Attrs::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| XmlError::Syntax(err.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value()?.into_owned();
        attrs.push(key, value);
    }
    Ok(Node {
        tag,
        attrs,
        content: None,
    })
}

fn push_text(stack: &mut [Node], text: &str) {
    let Some(node) = stack.last_mut() else {
        return;
    };
    match &mut node.content {
        None => node.content = Some(NodeContent::String(text.to_string())),
        Some(NodeContent::String(existing)) => existing.push_str(text),
        Some(NodeContent::Nodes(_)) => {}
    }
}

pub fn marshal_to(node: &Node, writer: &mut impl Write) -> Result<()> {
    let mut writer = Writer::new(writer);
    write_node(&mut writer, node)
}

fn write_node<W: Write>(writer: &mut Writer<W>, node: &Node) -> Result<()> {
    let mut start = BytesStart::new(node.tag.as_str());
    for (key, value) in node.attrs.iter() {
        start.push_attribute((key, value));
    }

    match &node.content {
        None => {
            writer.write_event(Event::Empty(start))?;
        }
        Some(NodeContent::Nodes(children)) if children.is_empty() => {
            writer.write_event(Event::Empty(start))?;
        }
        Some(NodeContent::Nodes(children)) => {
            let end = start.to_end().into_owned();
            writer.write_event(Event::Start(start))?;
            for child in children {
                write_node(writer, child)?;
            }
            writer.write_event(Event::End(end))?;
        }
        Some(NodeContent::String(text)) => {
            let end = start.to_end().into_owned();
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Text(BytesText::new(text)))?;
            writer.write_event(Event::End(end))?;
        }
    }
    Ok(())
}

pub fn marshal(node: &Node) -> Result<String> {
    let mut payload = Vec::with_capacity(512);
    marshal_to(node, &mut payload)?;
    String::from_utf8(payload).map_err(|e| XmlError::InvalidUtf8(e.utf8_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeBuilder;

    #[test]
    fn test_parse_jingle_iq() {
        let xml = r#"<iq type="set" from="room@conference.example.com/focus" to="room@conference.example.com/alice">
            <jingle xmlns="urn:xmpp:jingle:1" action="session-initiate" sid="abc123">
                <content creator="initiator" name="audio" senders="both">
                    <description xmlns="urn:xmpp:jingle:apps:rtp:1" media="audio">
                        <payload-type id="111" name="opus" clockrate="48000" channels="2"/>
                    </description>
                </content>
            </jingle>
        </iq>"#;

        let iq = unmarshal(xml).unwrap();
        assert_eq!(iq.tag, "iq");
        assert_eq!(iq.attr("type"), Some("set"));
        let jingle = iq.get_optional_child("jingle").unwrap();
        assert_eq!(jingle.xmlns(), Some("urn:xmpp:jingle:1"));
        let pt = jingle
            .get_optional_child_by_tag(&["content", "description", "payload-type"])
            .unwrap();
        assert_eq!(pt.attr("name"), Some("opus"));
    }

    #[test]
    fn test_text_content_and_escaping() {
        let node = NodeBuilder::new("body")
            .attr("note", "a<b & \"c\"")
            .string_content("1 < 2 & 3")
            .build();
        let xml = marshal(&node).unwrap();
        assert!(!xml.contains("1 < 2"));
        let parsed = unmarshal(&xml).unwrap();
        assert_eq!(parsed, node);
    }

    #[test]
    fn test_empty_element_marshal() {
        let node = NodeBuilder::new("rtcp-mux").build();
        assert_eq!(marshal(&node).unwrap(), "<rtcp-mux/>");
        assert_eq!(node.to_string(), "<rtcp-mux/>");
    }

    #[test]
    fn test_errors() {
        assert!(matches!(unmarshal("   "), Err(XmlError::EmptyData)));
        assert!(unmarshal("<a><b></a>").is_err());
        assert!(matches!(
            unmarshal("<a/><b/>"),
            Err(XmlError::LeftoverData(ref t)) if t == "b"
        ));
        assert!(unmarshal("<a>").is_err());
    }
}
