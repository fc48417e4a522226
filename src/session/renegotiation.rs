//! Serialized renegotiation.
//!
//! Source updates and local stream changes each need a full offer/answer
//! cycle against the engine. They are queued and run one at a time, and only
//! while the engine is `stable` with ICE connected or completed.

use std::collections::VecDeque;

use log::{debug, info, warn};
use rtccore::SourceDiff;
use rtccore::jingle::{JingleAction, builders};
use rtccore::sdp::SessionDescription;
use rtccore::types::SdpType;
use rtccore::xml::Node;

use super::Session;
use crate::error::SessionError;
use crate::transport::{LocalStream, OfferConstraints, SignalingState};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RenegotiationTask {
    /// Payload of a remote `source-add`.
    AddRemoteSources(Node),
    /// Payload of a remote `source-remove`.
    RemoveRemoteSources(Node),
    /// Replace the local stream, or drop it with `None`.
    SwitchLocalStream(Option<LocalStream>),
}

impl RenegotiationTask {
    fn name(&self) -> &'static str {
        match self {
            Self::AddRemoteSources(_) => "source-add",
            Self::RemoveRemoteSources(_) => "source-remove",
            Self::SwitchLocalStream(_) => "stream switch",
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct RenegotiationQueue {
    tasks: VecDeque<RenegotiationTask>,
    running: bool,
}

impl RenegotiationQueue {
    pub(crate) fn push(&mut self, task: RenegotiationTask) {
        self.tasks.push_back(task);
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn clear(&mut self) {
        self.tasks.clear();
    }
}

impl Session {
    /// The engine can take another offer/answer cycle.
    pub(crate) fn transport_ready(&self) -> bool {
        self.signaling_state == SignalingState::Stable && self.ice_state.is_connected()
    }

    pub(crate) async fn enqueue_renegotiation(&mut self, task: RenegotiationTask) {
        debug!(target: "Session/Renegotiation", "Queued {} ({} waiting)", task.name(), self.queue.len());
        self.queue.push(task);
        self.process_queue().await;
    }

    /// Run queued tasks in order until the queue is empty or the engine
    /// stops being ready. A failed task is reported and the next one runs.
    pub(crate) async fn process_queue(&mut self) {
        if self.queue.running {
            return;
        }
        self.queue.running = true;
        while !self.call_state.is_ended() && self.call_state.is_negotiated() && self.transport_ready() {
            let Some(task) = self.queue.tasks.pop_front() else {
                break;
            };
            let name = task.name();
            match self.run_renegotiation(task).await {
                Ok(()) => info!(target: "Session/Renegotiation", "{name} done"),
                Err(e) => {
                    warn!(target: "Session/Renegotiation", "{name} failed: {e}");
                    self.report_error(&e);
                }
            }
        }
        if !self.queue.tasks.is_empty() {
            debug!(
                target: "Session/Renegotiation",
                "{} task(s) paused: signaling {}, ice {:?}",
                self.queue.len(),
                self.signaling_state,
                self.ice_state
            );
        }
        self.queue.running = false;
    }

    /// One offer/answer cycle. The stored descriptions are committed only
    /// if every step succeeds.
    async fn run_renegotiation(&mut self, task: RenegotiationTask) -> Result<(), SessionError> {
        let old_local = self
            .local_sdp
            .clone()
            .ok_or_else(|| SessionError::Negotiation("no local description".to_string()))?;
        let mut remote = self
            .remote_sdp
            .clone()
            .ok_or_else(|| SessionError::Negotiation("no remote description".to_string()))?;

        match task {
            RenegotiationTask::AddRemoteSources(delta) => {
                let skipped = remote.add_sources(&delta);
                if !skipped.is_empty() {
                    warn!(target: "Session/Renegotiation", "source-add named unknown sections {skipped:?}");
                }
            }
            RenegotiationTask::RemoveRemoteSources(delta) => {
                let skipped = remote.remove_sources(&delta);
                if !skipped.is_empty() {
                    warn!(target: "Session/Renegotiation", "source-remove named unknown sections {skipped:?}");
                }
            }
            RenegotiationTask::SwitchLocalStream(stream) => {
                // local_stream tracks what the engine holds, even if the
                // cycle below fails.
                if let Some(old) = self.local_stream.take()
                    && let Err(e) = self.transport.remove_stream(&old).await
                {
                    self.local_stream = Some(old);
                    return Err(e.into());
                }
                if let Some(stream) = stream {
                    self.transport.add_stream(&stream).await?;
                    self.local_stream = Some(stream);
                }
            }
        }

        let local = self.renegotiate(&remote).await?;

        self.remote_sdp = Some(remote);
        self.local_sdp = Some(local.clone());
        self.announce_local_sources(&old_local, &local).await
    }

    /// Re-run offer/answer against `remote` in the role this side took
    /// during the initial exchange. Returns the new local description.
    ///
    /// A failure after the engine left `stable` puts it back there with the
    /// last applied remote description, so later tasks can run.
    async fn renegotiate(&mut self, remote: &SessionDescription) -> Result<SessionDescription, SessionError> {
        let constraints = self.config.constraints();
        if self.is_offerer() {
            let offer = self.transport.create_offer(constraints).await?;
            let (engine, local) = self.shape_local(offer)?;
            self.transport.set_local_description(engine).await?;
            let applied = async {
                let answer = self.strategy.to_engine(remote, SdpType::Answer)?;
                self.transport.set_remote_description(answer).await?;
                Ok::<_, SessionError>(())
            }
            .await;
            if let Err(e) = applied {
                self.restore_stable().await;
                return Err(e);
            }
            Ok(local)
        } else {
            let offer = self.strategy.to_engine(remote, SdpType::Offer)?;
            self.transport.set_remote_description(offer).await?;
            match self.answer_remote_offer(constraints).await {
                Ok(local) => Ok(local),
                Err(e) => {
                    self.restore_stable().await;
                    Err(e)
                }
            }
        }
    }

    async fn answer_remote_offer(&self, constraints: OfferConstraints) -> Result<SessionDescription, SessionError> {
        let answer = self.transport.create_answer(constraints).await?;
        let (engine, local) = self.shape_local(answer)?;
        self.transport.set_local_description(engine).await?;
        Ok(local)
    }

    /// Complete the engine's pending exchange with the stored remote
    /// description: as the answer to our offer, or as the offer we answer.
    async fn restore_stable(&self) {
        let Some(last) = self.remote_sdp.clone() else {
            return;
        };
        let restored = async {
            if self.is_offerer() {
                let answer = self.strategy.to_engine(&last, SdpType::Answer)?;
                self.transport.set_remote_description(answer).await?;
            } else {
                let offer = self.strategy.to_engine(&last, SdpType::Offer)?;
                self.transport.set_remote_description(offer).await?;
                self.answer_remote_offer(self.config.constraints()).await?;
            }
            Ok::<_, SessionError>(())
        }
        .await;
        match restored {
            Ok(()) => debug!(target: "Session/Renegotiation", "[{}] Engine back to stable", self.id),
            Err(e) => warn!(target: "Session/Renegotiation", "[{}] Could not restore a stable engine: {e}", self.id),
        }
    }

    /// Tell the peer about local sources that appeared or went away.
    async fn announce_local_sources(
        &mut self,
        old: &SessionDescription,
        new: &SessionDescription,
    ) -> Result<(), SessionError> {
        let diff = SourceDiff::between(old, new);
        if diff.is_empty() {
            return Ok(());
        }
        let (Some(peer), Some(sid)) = (self.peer.clone(), self.sid.clone()) else {
            return Ok(());
        };
        if !diff.removed.is_empty() {
            let jingle = builders::source_update(JingleAction::SourceRemove, &sid, diff.removals_to_jingle());
            self.signaling.send_source_remove(&peer, jingle).await?;
        }
        if !diff.added.is_empty() {
            let contents = match &self.occupant {
                Some(me) => diff.additions_to_jingle_owned_by(me),
                None => diff.additions_to_jingle(),
            };
            let jingle = builders::source_update(JingleAction::SourceAdd, &sid, contents);
            self.signaling.send_source_add(&peer, jingle).await?;
        }
        Ok(())
    }
}
