//! ICE candidate exchange.
//!
//! Local candidates are held until a local description and a peer exist,
//! then sent in one `transport-info`. Remote candidates that arrive before
//! the remote description are held until it is applied.

use log::{debug, warn};
use rtccore::jingle::builders;
use rtccore::jingle::{Candidate, Creator};
use rtccore::stanza::JingleMessage;
use rtccore::types::IceCandidate;

use super::Session;

/// Ordered local candidates awaiting transmission.
#[derive(Debug, Default)]
pub(crate) struct CandidateBuffer {
    pending: Vec<IceCandidate>,
}

impl CandidateBuffer {
    pub(crate) fn push(&mut self, candidate: IceCandidate) {
        self.pending.push(candidate);
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn take(&mut self) -> Vec<IceCandidate> {
        std::mem::take(&mut self.pending)
    }

    /// Put back candidates whose send failed, ahead of any gathered since.
    pub(crate) fn restore(&mut self, mut candidates: Vec<IceCandidate>) {
        candidates.append(&mut self.pending);
        self.pending = candidates;
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}

impl Session {
    /// Send every buffered local candidate if a local description and a peer
    /// both exist. Otherwise keep them.
    pub(crate) async fn flush_candidates(&mut self) {
        if self.candidates.is_empty() {
            return;
        }
        let (Some(local), Some(peer), Some(sid)) = (&self.local_sdp, &self.peer, &self.sid) else {
            debug!(
                target: "Session/Candidates",
                "Holding {} candidate(s) until a description and a peer exist",
                self.candidates.len()
            );
            return;
        };

        let batch = self.candidates.take();
        let mut pairs = Vec::with_capacity(batch.len());
        for ice in &batch {
            let Some(candidate) = Candidate::from_sdp_line(&ice.candidate) else {
                warn!(target: "Session/Candidates", "Dropping unparsable candidate '{}'", ice.candidate);
                continue;
            };
            let mid = ice
                .sdp_mid
                .clone()
                .or_else(|| {
                    ice.sdp_m_line_index
                        .and_then(|idx| local.media.get(usize::from(idx)))
                        .map(|section| section.name().to_string())
                })
                .unwrap_or_default();
            pairs.push((mid, candidate));
        }
        if pairs.is_empty() {
            return;
        }

        let creator = self.role.unwrap_or(Creator::Initiator);
        let jingle = builders::transport_info(sid, creator, local, &pairs);
        let peer = peer.clone();
        match self.signaling.send_transport_info(&peer, jingle).await {
            Ok(()) => debug!(target: "Session/Candidates", "Sent {} candidate(s) to {peer}", pairs.len()),
            Err(e) => {
                self.candidates.restore(batch);
                self.report_error(&e.into());
            }
        }
    }

    /// Remote candidates from a `transport-info`.
    pub(crate) async fn on_remote_candidates(&mut self, msg: &JingleMessage) {
        for content in msg.jingle.get_children_by_tag("content") {
            let name = content.attr("name").unwrap_or_default();
            let Some(transport) = content.get_optional_child("transport") else {
                continue;
            };
            for node in transport.get_children_by_tag("candidate") {
                match Candidate::from_node(node) {
                    Ok(candidate) => {
                        let index = self
                            .remote_sdp
                            .as_ref()
                            .and_then(|sdp| sdp.section_index_by_name(name))
                            .and_then(|idx| u16::try_from(idx).ok());
                        let ice = IceCandidate {
                            candidate: candidate.to_attribute(),
                            sdp_mid: Some(name.to_string()),
                            sdp_m_line_index: index,
                        };
                        self.add_remote_candidate(ice).await;
                    }
                    Err(e) => warn!(target: "Session/Candidates", "Ignoring remote candidate: {e}"),
                }
            }
        }
    }

    async fn add_remote_candidate(&mut self, candidate: IceCandidate) {
        if self.remote_sdp.is_none() {
            debug!(target: "Session/Candidates", "Holding remote candidate until the remote description is set");
            self.remote_candidates.push(candidate);
            return;
        }
        if let Err(e) = self.transport.add_ice_candidate(candidate).await {
            warn!(target: "Session/Candidates", "Engine rejected remote candidate: {e}");
        }
    }

    /// Apply remote candidates held back before the remote description.
    pub(crate) async fn apply_remote_candidates(&mut self) {
        for mut candidate in std::mem::take(&mut self.remote_candidates) {
            if candidate.sdp_m_line_index.is_none()
                && let (Some(mid), Some(remote)) = (&candidate.sdp_mid, &self.remote_sdp)
            {
                candidate.sdp_m_line_index = remote
                    .section_index_by_name(mid)
                    .and_then(|idx| u16::try_from(idx).ok());
            }
            self.add_remote_candidate(candidate).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(n: u16) -> IceCandidate {
        IceCandidate {
            candidate: format!("candidate:{n} 1 udp 1 10.0.0.1 {} typ host generation 0", 5000 + n),
            sdp_mid: Some("audio".to_string()),
            sdp_m_line_index: Some(0),
        }
    }

    #[test]
    fn test_restore_keeps_discovery_order() {
        let mut buffer = CandidateBuffer::default();
        buffer.push(candidate(1));
        buffer.push(candidate(2));
        let batch = buffer.take();
        assert!(buffer.is_empty());
        buffer.push(candidate(3));
        buffer.restore(batch);
        let order: Vec<_> = buffer.take().into_iter().map(|c| c.candidate).collect();
        assert_eq!(order, vec![candidate(1).candidate, candidate(2).candidate, candidate(3).candidate]);
    }
}
