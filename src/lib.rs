// Core types are re-exported, events (with the event bus) live here.
pub mod types {
    pub use rtccore::types::*;
    pub mod events;
}

pub use rtccore;

mod bridge;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod interop;
mod pstn;
pub mod session;
pub mod signaling;
pub mod transport;

#[cfg(feature = "webrtc")]
pub mod webrtc;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use client::Client;
pub use config::{ClientConfig, SessionConfig};
pub use session::{SessionHandle, SessionSnapshot};
