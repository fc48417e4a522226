//! Lifecycle state machines.
//!
//! Three orthogonal machines describe a session: the call negotiation phase,
//! the local presence in the room, and the PSTN leg. Each has its own
//! transition table; the session composes them.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EndReason {
    /// `end_session` was called.
    LocalHangup,
    /// The peer sent `session-terminate`.
    RemoteTerminate,
    /// The initial offer/answer exchange could not complete.
    NegotiationFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CallState {
    #[default]
    Idle,
    /// Allocation or room join requested, no negotiation yet.
    Connecting,
    /// This side generated the offer and waits for `session-accept`.
    Outgoing,
    /// This side waits for `session-initiate`.
    Incoming,
    /// Descriptions exchanged, ICE not connected yet.
    InProgress,
    Connected,
    Ended(EndReason),
}

impl CallState {
    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Ended(_))
    }

    /// Both descriptions are in place and renegotiation is allowed.
    pub fn is_negotiated(&self) -> bool {
        matches!(self, Self::InProgress | Self::Connected)
    }

    pub fn can_accept_initiate(&self) -> bool {
        matches!(self, Self::Incoming)
    }

    pub fn can_accept_answer(&self) -> bool {
        matches!(self, Self::Outgoing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTransition {
    Start,
    BecomeInitiator,
    BecomeResponder,
    /// `session-accept` received for our offer.
    RemoteAccepted,
    /// Our answer to a `session-initiate` is applied and sent.
    LocalAccepted,
    MediaConnected,
    Terminate(EndReason),
}

/// Applies a transition to a state. Shared shape for the three machines.
pub trait StateMachine: Sized + Copy + std::fmt::Debug {
    type Transition: Copy + std::fmt::Debug;

    fn next(self, transition: Self::Transition) -> Option<Self>;

    fn apply_transition(&mut self, transition: Self::Transition) -> Result<(), InvalidTransition> {
        match self.next(transition) {
            Some(state) => {
                *self = state;
                Ok(())
            }
            None => Err(InvalidTransition {
                current_state: format!("{:?}", self),
                attempted: format!("{:?}", transition),
            }),
        }
    }
}

impl StateMachine for CallState {
    type Transition = CallTransition;

    fn next(self, transition: CallTransition) -> Option<Self> {
        use CallState::*;
        use CallTransition::*;
        match (self, transition) {
            (Ended(_), _) => None,
            (_, Terminate(reason)) => Some(Ended(reason)),
            (Idle, Start) => Some(Connecting),
            (Connecting, BecomeInitiator) => Some(Outgoing),
            (Connecting, BecomeResponder) => Some(Incoming),
            (Outgoing, RemoteAccepted) => Some(InProgress),
            (Incoming, LocalAccepted) => Some(InProgress),
            (InProgress, MediaConnected) => Some(Connected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PresenceState {
    #[default]
    None,
    Joined,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceTransition {
    Join,
    Leave,
}

impl StateMachine for PresenceState {
    type Transition = PresenceTransition;

    fn next(self, transition: PresenceTransition) -> Option<Self> {
        match (self, transition) {
            (PresenceState::None, PresenceTransition::Join) => Some(PresenceState::Joined),
            (PresenceState::Joined, PresenceTransition::Leave) => Some(PresenceState::Left),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PstnState {
    #[default]
    Idle,
    Dialing,
    Connected,
    OnHold,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PstnTransition {
    Dial,
    Answered,
    Hold,
    Unhold,
    Hangup,
}

impl StateMachine for PstnState {
    type Transition = PstnTransition;

    fn next(self, transition: PstnTransition) -> Option<Self> {
        use PstnState::*;
        match (self, transition) {
            (Idle, PstnTransition::Dial) => Some(Dialing),
            (Dialing, PstnTransition::Answered) => Some(Connected),
            (Connected, PstnTransition::Hold) => Some(OnHold),
            (OnHold, PstnTransition::Unhold) => Some(Connected),
            (Dialing | Connected | OnHold, PstnTransition::Hangup) => Some(Ended),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvalidTransition {
    pub current_state: String,
    pub attempted: String,
}

impl std::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid transition {} in state {}",
            self.attempted, self.current_state
        )
    }
}

impl std::error::Error for InvalidTransition {}
