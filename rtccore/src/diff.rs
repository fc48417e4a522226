//! Source differences between two snapshots of the same session.
//!
//! Sections are matched by index. Within a section a source is identified by
//! its SSRC and a group by its semantics and SSRC list; anything present on
//! both sides is untouched.

use rtccore_xml::{Jid, Node, NodeBuilder};

use crate::jingle::{NS_RTP, SourceOwners, group_to_jingle, source_to_jingle};
use crate::sdp::lines::SsrcGroup;
use crate::sdp::{MediaSection, SessionDescription, Source};

/// Sources and groups of one section that changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSources {
    pub index: usize,
    /// Content name: the mid, or the media type.
    pub name: String,
    pub media: String,
    pub sources: Vec<Source>,
    pub groups: Vec<SsrcGroup>,
}

impl SectionSources {
    fn to_content(&self, owners: &SourceOwners) -> Node {
        let description = NodeBuilder::new("description")
            .attr("xmlns", NS_RTP)
            .attr("media", &self.media)
            .children(self.sources.iter().map(|s| source_to_jingle(s, owners)))
            .children(self.groups.iter().map(group_to_jingle))
            .build();
        NodeBuilder::new("content")
            .attr("name", &self.name)
            .child(description)
            .build()
    }

    pub fn ssrcs(&self) -> impl Iterator<Item = u32> + '_ {
        self.sources.iter().map(|s| s.ssrc)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceDiff {
    pub added: Vec<SectionSources>,
    pub removed: Vec<SectionSources>,
}

impl SourceDiff {
    pub fn between(old: &SessionDescription, new: &SessionDescription) -> Self {
        let mut diff = Self::default();
        let count = old.media.len().max(new.media.len());
        for index in 0..count {
            let before = old.media.get(index);
            let after = new.media.get(index);
            if let Some(after) = after
                && let Some(added) = section_delta(index, after, before)
            {
                diff.added.push(added);
            }
            if let Some(before) = before
                && let Some(removed) = section_delta(index, before, after)
            {
                diff.removed.push(removed);
            }
        }
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub fn added_ssrcs(&self) -> Vec<u32> {
        self.added.iter().flat_map(|s| s.ssrcs()).collect()
    }

    pub fn removed_ssrcs(&self) -> Vec<u32> {
        self.removed.iter().flat_map(|s| s.ssrcs()).collect()
    }

    /// `<content>` children for a `source-add`.
    pub fn additions_to_jingle(&self) -> Vec<Node> {
        self.added
            .iter()
            .map(|s| s.to_content(&SourceOwners::default()))
            .collect()
    }

    /// Like [`additions_to_jingle`](Self::additions_to_jingle), tagging every
    /// added source with `<ssrc-info owner>`.
    pub fn additions_to_jingle_owned_by(&self, owner: &Jid) -> Vec<Node> {
        let mut owners = SourceOwners::default();
        for ssrc in self.added_ssrcs() {
            owners.insert(ssrc, owner.clone());
        }
        self.added.iter().map(|s| s.to_content(&owners)).collect()
    }

    /// `<content>` children for a `source-remove`.
    pub fn removals_to_jingle(&self) -> Vec<Node> {
        self.removed
            .iter()
            .map(|s| s.to_content(&SourceOwners::default()))
            .collect()
    }
}

/// What `section` carries that `other` does not.
fn section_delta(index: usize, section: &MediaSection, other: Option<&MediaSection>) -> Option<SectionSources> {
    let other_ssrcs = other.map(MediaSection::ssrcs).unwrap_or_default();
    let other_groups = other.map(MediaSection::ssrc_groups).unwrap_or_default();

    let sources: Vec<Source> = section
        .sources()
        .into_iter()
        .filter(|s| !other_ssrcs.contains(&s.ssrc))
        .collect();
    let groups: Vec<SsrcGroup> = section
        .ssrc_groups()
        .into_iter()
        .filter(|g| !other_groups.contains(g))
        .collect();

    if sources.is_empty() && groups.is_empty() {
        return None;
    }
    Some(SectionSources {
        index,
        name: section.name().to_string(),
        media: section.media_type().to_string(),
        sources,
        groups,
    })
}
