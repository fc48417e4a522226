//! Incremental source updates (`source-add` / `source-remove`) and SSRC
//! ownership tracking.

use std::collections::HashMap;

use log::warn;
use rtccore_xml::{Jid, Node};

use super::from_jingle::source_lines;
use super::{NS_SSMA, NS_SSRC_INFO};
use crate::sdp::SessionDescription;
use crate::sdp::lines::SsrcGroup;

/// SSRC → occupant that sends it.
///
/// Entries are filled from `<ssrc-info owner>` elements and only ever
/// overwritten, never removed, for the lifetime of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceOwners {
    owners: HashMap<u32, Jid>,
}

impl SourceOwners {
    pub fn owner_of(&self, ssrc: u32) -> Option<&Jid> {
        self.owners.get(&ssrc)
    }

    pub fn insert(&mut self, ssrc: u32, owner: Jid) {
        self.owners.insert(ssrc, owner);
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Record every `<source><ssrc-info owner/></source>` found under the
    /// `<content>` children of `jingle`. Returns how many owners were seen.
    pub fn record_from_jingle(&mut self, jingle: &Node) -> usize {
        let mut seen = 0;
        for content in jingle.get_children_by_tag("content") {
            for source in content_sources(content) {
                let Some(ssrc) = source.attr("ssrc").and_then(|s| s.parse::<u32>().ok()) else {
                    continue;
                };
                let owner = source
                    .get_children_by_tag("ssrc-info")
                    .filter(|info| info.xmlns() == Some(NS_SSRC_INFO))
                    .find_map(|info| info.attr("owner"));
                if let Some(owner) = owner {
                    match owner.parse::<Jid>() {
                        Ok(jid) => {
                            self.insert(ssrc, jid);
                            seen += 1;
                        }
                        Err(e) => warn!("Ignoring ssrc-info with bad owner '{owner}': {e}"),
                    }
                }
            }
        }
        seen
    }

    /// SSRCs owned by `jid`, compared without resource when `jid` is bare.
    pub fn ssrcs_of<'a>(&'a self, jid: &'a Jid) -> impl Iterator<Item = u32> + 'a {
        self.owners
            .iter()
            .filter(move |(_, owner)| {
                if jid.is_bare() {
                    owner.is_same_bare_as(jid)
                } else {
                    *owner == jid
                }
            })
            .map(|(ssrc, _)| *ssrc)
    }
}

/// `<source>` elements of a content, whether they sit directly under it or
/// under its `<description>`.
fn content_sources(content: &Node) -> impl Iterator<Item = &Node> {
    content
        .get_children_by_tag("source")
        .chain(
            content
                .get_optional_child("description")
                .into_iter()
                .flat_map(|d| d.get_children_by_tag("source")),
        )
        .filter(|s| s.xmlns().is_none_or(|ns| ns == NS_SSMA))
}

fn content_groups(content: &Node) -> Vec<SsrcGroup> {
    content
        .get_children_by_tag("ssrc-group")
        .chain(
            content
                .get_optional_child("description")
                .into_iter()
                .flat_map(|d| d.get_children_by_tag("ssrc-group")),
        )
        .filter_map(|g| {
            let ssrcs: Vec<u32> = g
                .get_children_by_tag("source")
                .filter_map(|s| s.attr("ssrc").and_then(|v| v.parse().ok()))
                .collect();
            (!ssrcs.is_empty()).then(|| SsrcGroup {
                semantics: g.attr("semantics").unwrap_or_default().to_string(),
                ssrcs,
            })
        })
        .collect()
}

impl SessionDescription {
    /// Append the sources and groups of a `source-add` payload to the
    /// sections named by its `<content>` elements.
    ///
    /// Sources already present anywhere in the description are skipped.
    /// Returns the content names that matched no section; those are logged
    /// and otherwise ignored.
    pub fn add_sources(&mut self, delta: &Node) -> Vec<String> {
        let mut unknown = Vec::new();
        for content in delta.get_children_by_tag("content") {
            let name = content.attr("name").unwrap_or_default();
            let Some(idx) = self.section_index_by_name(name) else {
                warn!("source-add for unknown section '{name}', skipping");
                unknown.push(name.to_string());
                continue;
            };

            let mut lines = Vec::new();
            for group in content_groups(content) {
                let line = group.to_line();
                if !self.media[idx].lines.contains(&line) {
                    lines.push(line);
                }
            }
            for source in content_sources(content) {
                let Some(ssrc) = source.attr("ssrc").and_then(|s| s.parse::<u32>().ok()) else {
                    continue;
                };
                if self.contains_ssrc(ssrc) {
                    warn!("source-add for existing SSRC {ssrc}, skipping");
                    continue;
                }
                lines.extend(source_lines(source));
            }
            self.media[idx].lines.extend(lines);
        }
        unknown
    }

    /// Remove the sources and groups named by a `source-remove` payload.
    /// Returns the content names that matched no section.
    pub fn remove_sources(&mut self, delta: &Node) -> Vec<String> {
        let mut unknown = Vec::new();
        for content in delta.get_children_by_tag("content") {
            let name = content.attr("name").unwrap_or_default();
            let Some(idx) = self.section_index_by_name(name) else {
                warn!("source-remove for unknown section '{name}', skipping");
                unknown.push(name.to_string());
                continue;
            };

            let section = &mut self.media[idx];
            for source in content_sources(content) {
                if let Some(ssrc) = source.attr("ssrc").and_then(|s| s.parse::<u32>().ok())
                    && !section.remove_ssrc(ssrc)
                {
                    warn!("source-remove for unknown SSRC {ssrc} in '{name}'");
                }
            }
            let groups = content_groups(content);
            if groups.is_empty() {
                section.prune_groups(None);
            }
            for group in &groups {
                section.prune_groups(Some(group));
            }
        }
        unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdp::tests::PLAN_B_OFFER;
    use rtccore_xml::unmarshal;

    fn source_add(name: &str, ssrc: u32) -> Node {
        unmarshal(&format!(
            r#"<jingle xmlns="urn:xmpp:jingle:1" action="source-add">
                <content name="{name}">
                    <description xmlns="urn:xmpp:jingle:apps:rtp:1" media="video">
                        <source xmlns="urn:xmpp:jingle:apps:rtp:ssma:0" ssrc="{ssrc}">
                            <parameter name="cname" value="peer"/>
                            <parameter name="msid" value="peerstream peertrack"/>
                            <ssrc-info xmlns="http://jitsi.org/jitmeet" owner="room@conference.example.com/bob"/>
                        </source>
                    </description>
                </content>
            </jingle>"#
        ))
        .unwrap()
    }

    #[test]
    fn test_add_sources_to_named_section() {
        let mut sdp = SessionDescription::parse(PLAN_B_OFFER).unwrap();
        let skipped = sdp.add_sources(&source_add("video", 3001));
        assert!(skipped.is_empty());
        assert_eq!(sdp.media[1].ssrcs(), vec![2001, 2002, 3001]);
        assert_eq!(
            sdp.media[1].sources()[2].param("msid"),
            Some("peerstream peertrack")
        );
    }

    #[test]
    fn test_add_existing_source_is_skipped() {
        let mut sdp = SessionDescription::parse(PLAN_B_OFFER).unwrap();
        let before = sdp.clone();
        sdp.add_sources(&source_add("video", 2001));
        assert_eq!(sdp, before);
    }

    #[test]
    fn test_unknown_section_is_reported_and_others_proceed() {
        let mut sdp = SessionDescription::parse(PLAN_B_OFFER).unwrap();
        let delta = unmarshal(
            r#"<jingle>
                <content name="screen">
                    <description media="video"><source ssrc="4001"><parameter name="cname" value="x"/></source></description>
                </content>
                <content name="audio">
                    <description media="audio"><source ssrc="4002"><parameter name="cname" value="y"/></source></description>
                </content>
            </jingle>"#,
        )
        .unwrap();
        let skipped = sdp.add_sources(&delta);
        assert_eq!(skipped, vec!["screen".to_string()]);
        assert!(!sdp.contains_ssrc(4001));
        assert_eq!(sdp.media[0].ssrcs(), vec![1001, 4002]);
    }

    #[test]
    fn test_remove_sources_keeps_empty_section() {
        let mut sdp = SessionDescription::parse(PLAN_B_OFFER).unwrap();
        let delta = unmarshal(
            r#"<jingle>
                <content name="video">
                    <description media="video">
                        <source ssrc="2001"/>
                        <source ssrc="2002"/>
                        <ssrc-group semantics="FID"><source ssrc="2001"/><source ssrc="2002"/></ssrc-group>
                    </description>
                </content>
            </jingle>"#,
        )
        .unwrap();
        assert!(sdp.remove_sources(&delta).is_empty());
        assert_eq!(sdp.media.len(), 2);
        assert!(sdp.media[1].ssrcs().is_empty());
        assert!(sdp.media[1].ssrc_groups().is_empty());
        assert!(sdp.to_string().contains("m=video"));
    }

    #[test]
    fn test_record_owners() {
        let mut owners = SourceOwners::default();
        assert_eq!(owners.record_from_jingle(&source_add("video", 3001)), 1);
        let owner = owners.owner_of(3001).unwrap();
        assert_eq!(owner.resource(), Some("bob"));
        let bare: Jid = "room@conference.example.com".parse().unwrap();
        assert_eq!(owners.ssrcs_of(&bare).collect::<Vec<_>>(), vec![3001]);

        // superseded, never dropped
        owners.insert(3001, "room@conference.example.com/carol".parse().unwrap());
        assert_eq!(owners.owner_of(3001).unwrap().resource(), Some("carol"));
        assert_eq!(owners.len(), 1);
    }
}
