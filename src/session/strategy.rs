//! Description layout handling per media engine.

use std::sync::Arc;

use rtccore::sdp::SessionDescription;
use rtccore::types::{Description, SdpType};

use crate::error::SessionError;
use crate::interop::InteropAdapter;
use crate::transport::NegotiationModel;

/// Chosen once per session from the transport's [`NegotiationModel`].
///
/// Sessions keep every description in Plan-B form. `PlanB` engines take
/// them as they are; `UnifiedPlan` engines get them rewritten on the way in
/// and rewrite theirs back on the way out.
#[derive(Clone)]
pub(crate) enum NegotiationStrategy {
    PlanB,
    UnifiedPlan(Arc<dyn InteropAdapter>),
}

impl NegotiationStrategy {
    pub(crate) fn for_model(
        model: NegotiationModel,
        interop: Option<Arc<dyn InteropAdapter>>,
    ) -> Result<Self, SessionError> {
        match (model, interop) {
            (NegotiationModel::PlanB, _) => Ok(Self::PlanB),
            (NegotiationModel::UnifiedPlan, Some(adapter)) => Ok(Self::UnifiedPlan(adapter)),
            (NegotiationModel::UnifiedPlan, None) => Err(SessionError::Unsupported(
                "unified-plan negotiation without an interop adapter",
            )),
        }
    }

    pub(crate) fn model(&self) -> NegotiationModel {
        match self {
            Self::PlanB => NegotiationModel::PlanB,
            Self::UnifiedPlan(_) => NegotiationModel::UnifiedPlan,
        }
    }

    /// A stored description as the engine expects it.
    pub(crate) fn to_engine(&self, sdp: &SessionDescription, kind: SdpType) -> Result<Description, SessionError> {
        let sdp = match self {
            Self::PlanB => sdp.to_string(),
            Self::UnifiedPlan(adapter) => adapter.to_unified_plan(sdp)?.to_string(),
        };
        Ok(Description { kind, sdp })
    }

    /// The Plan-B view of a description the engine produced.
    pub(crate) fn from_engine(&self, sdp: &SessionDescription) -> Result<SessionDescription, SessionError> {
        match self {
            Self::PlanB => Ok(sdp.clone()),
            Self::UnifiedPlan(adapter) => Ok(adapter.to_plan_b(sdp)?),
        }
    }
}

impl std::fmt::Debug for NegotiationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NegotiationStrategy({:?})", self.model())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MarkingInterop, PLAN_B_OFFER};

    #[test]
    fn test_plan_b_is_passthrough() {
        let strategy = NegotiationStrategy::for_model(NegotiationModel::PlanB, None).unwrap();
        let sdp = SessionDescription::parse(PLAN_B_OFFER).unwrap();
        let engine = strategy.to_engine(&sdp, SdpType::Offer).unwrap();
        assert_eq!(engine.sdp, sdp.to_string());
        assert_eq!(strategy.from_engine(&sdp).unwrap(), sdp);
    }

    #[test]
    fn test_unified_plan_requires_adapter() {
        assert!(NegotiationStrategy::for_model(NegotiationModel::UnifiedPlan, None).is_err());

        let interop = Arc::new(MarkingInterop::default());
        let strategy = NegotiationStrategy::for_model(NegotiationModel::UnifiedPlan, Some(interop.clone())).unwrap();
        let sdp = SessionDescription::parse(PLAN_B_OFFER).unwrap();
        let engine = strategy.to_engine(&sdp, SdpType::Answer).unwrap();
        assert!(engine.sdp.contains("a=x-layout:unified"));
        let back = strategy.from_engine(&SessionDescription::parse(&engine.sdp).unwrap()).unwrap();
        assert_eq!(back, sdp);
        assert_eq!(interop.calls(), (1, 1));
    }
}
