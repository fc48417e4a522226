pub use rtccore_xml as xml;

pub mod bridge;
pub mod diff;
pub mod error;
pub mod jingle;
pub mod sdp;
pub mod stanza;
pub mod state;
pub mod types;

pub use diff::SourceDiff;
pub use error::{JingleError, SdpError};
pub use jingle::SourceOwners;
pub use sdp::SessionDescription;
