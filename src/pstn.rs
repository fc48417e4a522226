//! Phone leg control through the focus.
//!
//! Dialing goes out as a Rayo `dial`; hold, unhold and hangup are plain
//! requests to the focus. Each command is checked against [`PstnState`]
//! before anything is sent.

use log::info;
use rtccore::state::{PstnState, PstnTransition, StateMachine};
use rtccore::types::CallType;

use crate::error::SessionError;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PstnCommand {
    Dial { number: String },
    Hold,
    Unhold,
    Hangup,
}

impl PstnCommand {
    fn transition(&self) -> PstnTransition {
        match self {
            Self::Dial { .. } => PstnTransition::Dial,
            Self::Hold => PstnTransition::Hold,
            Self::Unhold => PstnTransition::Unhold,
            Self::Hangup => PstnTransition::Hangup,
        }
    }
}

impl Session {
    pub(crate) async fn handle_pstn(&mut self, command: PstnCommand) -> Result<(), SessionError> {
        if self.call_type != CallType::Pstn {
            return Err(SessionError::Unsupported("phone control"));
        }
        let focus = self
            .focus
            .clone()
            .ok_or_else(|| SessionError::Presence("the focus has not joined".to_string()))?;

        let transition = command.transition();
        let mut next: PstnState = self.pstn;
        next.apply_transition(transition)?;

        match &command {
            PstnCommand::Dial { number } => {
                info!(target: "Session/Pstn", "[{}] Dialing {number}", self.id);
                self.signaling
                    .send_rayo(&focus, number, self.config.pstn_caller_id.as_deref())
                    .await?
            }
            PstnCommand::Hold => self.signaling.send_hold(&focus).await?,
            PstnCommand::Unhold => self.signaling.send_unhold(&focus).await?,
            PstnCommand::Hangup => self.signaling.send_hangup(&focus).await?,
        }
        self.set_pstn_state(transition)
    }

    /// Dial the configured number once the focus is in the room.
    pub(crate) async fn dial_configured_number(&mut self) {
        let Some(number) = self.config.pstn_number.clone().filter(|n| !n.is_empty()) else {
            return;
        };
        if self.pstn != PstnState::Idle {
            return;
        }
        if let Err(e) = self.handle_pstn(PstnCommand::Dial { number }).await {
            self.report_error(&e);
        }
    }
}
