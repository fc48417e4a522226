//! Inbound signaling handlers, one per [`EventKind`](crate::signaling::EventKind).

pub mod chat;
pub mod connection;
pub mod discovery;
pub mod jingle;
pub mod presence;
pub mod room;
pub mod router;
pub mod traits;
