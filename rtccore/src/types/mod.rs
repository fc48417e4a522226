pub mod call;
pub mod participant;

pub use call::{CallType, Description, IceCandidate, SdpType, SessionType};
pub use participant::{Participant, ParticipantUpdate};
