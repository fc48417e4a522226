use std::fmt;

use crate::attrs::AttrParser;

/// Element attributes in document order.
///
/// A Vec keeps insertion order, which matters when a stanza is marshalled back
/// to text, and linear lookup is fine for the handful of attributes a Jingle
/// element carries.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attrs(pub Vec<(String, String)>);

impl Attrs {
    #[inline]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    /// Insert a key-value pair. If the key already exists, update the value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(pos) = self.0.iter().position(|(k, _)| *k == key) {
            self.0[pos].1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(pos).1)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Push a key-value pair without checking for duplicates.
    #[inline]
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }
}

impl IntoIterator for Attrs {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attrs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Attrs::new();
        for (k, v) in iter {
            attrs.insert(k, v);
        }
        attrs
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeContent {
    String(String),
    Nodes(Vec<Node>),
}

/// One XML element: tag, ordered attributes and either text or child elements.
///
/// Namespaces are kept as plain `xmlns` attributes; Jingle payloads are
/// addressed by local tag name plus an `xmlns` check where it matters.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Node {
    pub tag: String,
    pub attrs: Attrs,
    pub content: Option<NodeContent>,
}

impl Node {
    pub fn new(tag: &str, attrs: Attrs, content: Option<NodeContent>) -> Self {
        Self {
            tag: tag.to_string(),
            attrs,
            content,
        }
    }

    pub fn children(&self) -> Option<&[Node]> {
        match &self.content {
            Some(NodeContent::Nodes(nodes)) => Some(nodes),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match &mut self.content {
            Some(NodeContent::Nodes(nodes)) => Some(nodes),
            _ => None,
        }
    }

    /// Append a child, turning empty or text content into a child list.
    pub fn push_child(&mut self, child: Node) {
        match &mut self.content {
            Some(NodeContent::Nodes(nodes)) => nodes.push(child),
            _ => self.content = Some(NodeContent::Nodes(vec![child])),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Some(NodeContent::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn attrs(&self) -> AttrParser<'_> {
        AttrParser::new(self)
    }

    #[inline]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key)
    }

    pub fn xmlns(&self) -> Option<&str> {
        self.attrs.get("xmlns")
    }

    pub fn get_optional_child_by_tag<'a>(&'a self, tags: &[&str]) -> Option<&'a Node> {
        let mut current_node = self;
        for &tag in tags {
            current_node = current_node.get_optional_child(tag)?;
        }
        Some(current_node)
    }

    pub fn get_children_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Node> {
        self.children()
            .into_iter()
            .flatten()
            .filter(move |c| c.tag == tag)
    }

    pub fn get_optional_child(&self, tag: &str) -> Option<&Node> {
        self.children()
            .and_then(|nodes| nodes.iter().find(|node| node.tag == tag))
    }

    /// First child with the given tag whose `xmlns` matches.
    pub fn get_child_ns(&self, tag: &str, xmlns: &str) -> Option<&Node> {
        self.children()?
            .iter()
            .find(|node| node.tag == tag && node.xmlns() == Some(xmlns))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let xml = crate::marshal::marshal(self).map_err(|_| fmt::Error)?;
        f.write_str(&xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::NodeBuilder;

    fn sample() -> Node {
        NodeBuilder::new("jingle")
            .attr("xmlns", "urn:xmpp:jingle:1")
            .attr("action", "source-add")
            .children([
                NodeBuilder::new("content")
                    .attr("name", "audio")
                    .children([NodeBuilder::new("description")
                        .attr("xmlns", "urn:xmpp:jingle:apps:rtp:1")
                        .build()])
                    .build(),
                NodeBuilder::new("content").attr("name", "video").build(),
            ])
            .build()
    }

    #[test]
    fn test_child_lookup() {
        let node = sample();
        assert_eq!(node.get_children_by_tag("content").count(), 2);
        assert!(
            node.get_optional_child_by_tag(&["content", "description"])
                .is_some()
        );
        assert!(node.get_optional_child_by_tag(&["content", "transport"]).is_none());
        let content = node.get_optional_child("content").unwrap();
        assert!(
            content
                .get_child_ns("description", "urn:xmpp:jingle:apps:rtp:1")
                .is_some()
        );
        assert!(content.get_child_ns("description", "other").is_none());
    }

    #[test]
    fn test_child_ns_outlives_tag() {
        let node = sample();
        let content = node.get_optional_child("content").unwrap();
        let tag = String::from("description");
        let found = content.get_child_ns(&tag, "urn:xmpp:jingle:apps:rtp:1");
        drop(tag);
        assert_eq!(found.map(|n| n.tag.as_str()), Some("description"));
    }

    #[test]
    fn test_attrs_insert_replaces_in_place() {
        let mut attrs = Attrs::new();
        attrs.insert("a", "1");
        attrs.insert("b", "2");
        attrs.insert("a", "3");
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs.get("a"), Some("3"));
        assert_eq!(attrs.iter().next(), Some(("a", "3")));
        assert_eq!(attrs.remove("a"), Some("3".to_string()));
        assert!(!attrs.contains_key("a"));
    }

    #[test]
    fn test_push_child_replaces_text() {
        let mut node = NodeBuilder::new("status").string_content("away").build();
        assert_eq!(node.text(), Some("away"));
        node.push_child(Node::new("x", Attrs::new(), None));
        assert_eq!(node.children().map(|c| c.len()), Some(1));
        assert_eq!(node.text(), None);
    }
}
