//! Plan-B / Unified-Plan rewriting.
//!
//! The rewrite itself is an external capability; this module only defines
//! the seam the session calls through.

use rtccore::sdp::SessionDescription;

use crate::error::TransportError;

/// Rewrites descriptions between the Plan-B layout Jingle carries and the
/// Unified-Plan layout of the engine.
///
/// Implementations must keep the section order of descriptions they return
/// stable across calls, since sources are matched to sections by index.
pub trait InteropAdapter: Send + Sync {
    /// Plan-B description from signaling to the engine's layout.
    fn to_unified_plan(&self, sdp: &SessionDescription) -> Result<SessionDescription, TransportError>;

    /// Engine description back to Plan-B for signaling and diffing.
    fn to_plan_b(&self, sdp: &SessionDescription) -> Result<SessionDescription, TransportError>;
}
