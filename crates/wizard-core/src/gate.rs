//! Step gates
//!
//! Each step has its own predicate over the state rather than a linear
//! "step N requires step N-1" chain: a resumed session or a locked,
//! pre-inferred industry can legitimately hold later-stage state.
//!
//! - location: ZIP of at least five digits, or a resolved address
//! - industry: location gate and an assigned industry
//! - profile: industry gate and a template for that industry
//! - options / magicfit / results: profile stage complete (pricing excluded)

use crate::geo;
use crate::state::WizardState;
use crate::types::{LocationRecord, WizardStep};
use serde::{Deserialize, Serialize};

/// Gate outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    /// Navigation allowed
    pub ok: bool,
    /// Why navigation is refused
    pub reason: Option<String>,
}

impl GateDecision {
    fn allow() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }

    fn from_result(result: Result<(), &'static str>) -> Self {
        match result {
            Ok(()) => Self::allow(),
            Err(reason) => Self::deny(reason),
        }
    }
}

fn location_ok(state: &WizardState) -> Result<(), &'static str> {
    let zip_from_record = state
        .location
        .as_ref()
        .and_then(|l| l.postal_code.as_deref())
        .and_then(geo::normalize_zip);
    let has_address = state
        .location
        .as_ref()
        .is_some_and(LocationRecord::has_address);
    if zip_from_record.is_some() || geo::normalize_zip(&state.location_input).is_some() || has_address
    {
        Ok(())
    } else {
        Err("Enter a 5-digit ZIP code or a full address")
    }
}

fn industry_ok(state: &WizardState) -> Result<(), &'static str> {
    location_ok(state)?;
    if state.industry.is_resolved() {
        Ok(())
    } else {
        Err("Select an industry")
    }
}

fn profile_ok(state: &WizardState) -> Result<(), &'static str> {
    industry_ok(state)?;
    if state.has_template_for_industry() {
        Ok(())
    } else {
        Err("Questions for this industry are not loaded yet")
    }
}

fn profile_complete(state: &WizardState) -> Result<(), &'static str> {
    if state.profile_complete {
        Ok(())
    } else {
        Err("Complete the facility profile first")
    }
}

/// Decide whether navigation to `target` is allowed
#[must_use]
pub fn can_proceed(state: &WizardState, target: WizardStep) -> GateDecision {
    let result = match target {
        WizardStep::Location => Ok(()),
        WizardStep::Industry => location_ok(state),
        WizardStep::Profile => profile_ok(state),
        WizardStep::Options | WizardStep::MagicFit | WizardStep::Results => {
            profile_complete(state)
        }
    };
    GateDecision::from_result(result)
}

/// Check if the stage a step owns is satisfied
///
/// Entering a step and satisfying it differ: the industry step may be
/// entered once the location is valid, but it is satisfied only once an
/// industry is assigned.
#[must_use]
pub fn is_satisfied(state: &WizardState, step: WizardStep) -> bool {
    match step {
        WizardStep::Location => location_ok(state).is_ok(),
        WizardStep::Industry => industry_ok(state).is_ok(),
        WizardStep::Profile => profile_ok(state).is_ok() && state.profile_complete,
        WizardStep::Options | WizardStep::MagicFit | WizardStep::Results => {
            profile_complete(state).is_ok()
        }
    }
}

/// Step the operator should be routed to when `target` is refused
#[must_use]
pub fn earliest_unmet(state: &WizardState, target: WizardStep) -> WizardStep {
    WizardStep::ALL
        .iter()
        .copied()
        .take_while(|s| *s <= target)
        .skip(1)
        .find(|s| !can_proceed(state, *s).ok)
        .and_then(WizardStep::prev)
        .unwrap_or(target)
}

/// Per-step navigation gates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gates {
    /// Location step
    pub location: bool,
    /// Industry step
    pub industry: bool,
    /// Profile step
    pub profile: bool,
    /// Options step
    pub options: bool,
    /// Magic-fit step
    pub magicfit: bool,
    /// Results step
    pub results: bool,
}

impl Gates {
    /// Gate of one step
    #[must_use]
    pub fn get(&self, step: WizardStep) -> bool {
        match step {
            WizardStep::Location => self.location,
            WizardStep::Industry => self.industry,
            WizardStep::Profile => self.profile,
            WizardStep::Options => self.options,
            WizardStep::MagicFit => self.magicfit,
            WizardStep::Results => self.results,
        }
    }
}

/// Evaluate every gate
#[must_use]
pub fn gates(state: &WizardState) -> Gates {
    let ok = |step| can_proceed(state, step).ok;
    Gates {
        location: ok(WizardStep::Location),
        industry: ok(WizardStep::Industry),
        profile: ok(WizardStep::Profile),
        options: ok(WizardStep::Options),
        magicfit: ok(WizardStep::MagicFit),
        results: ok(WizardStep::Results),
    }
}

/// Progress through the fixed steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Zero-based index of the current step
    pub index: usize,
    /// Number of steps
    pub count: usize,
    /// Percent complete, counting the current step
    pub percent: u8,
}

/// Progress of the current step
#[must_use]
pub fn progress(state: &WizardState) -> Progress {
    let index = state.step.index();
    let count = WizardStep::ALL.len();
    let percent = u8::try_from((index + 1) * 100 / count).unwrap_or(100);
    Progress {
        index,
        count,
        percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::QuestionTemplate;
    use crate::types::IndustrySlug;
    use std::sync::Arc;

    #[test]
    fn empty_state_only_allows_location() {
        let state = WizardState::default();
        assert!(can_proceed(&state, WizardStep::Location).ok);
        let decision = can_proceed(&state, WizardStep::Industry);
        assert!(!decision.ok);
        assert!(decision.reason.is_some());
    }

    #[test]
    fn short_zip_is_rejected() {
        let mut state = WizardState::default();
        state.location_input = "9410".into();
        assert!(!can_proceed(&state, WizardStep::Industry).ok);
        state.location_input = "94105".into();
        assert!(can_proceed(&state, WizardStep::Industry).ok);
    }

    #[test]
    fn raw_street_address_is_not_a_zip() {
        let mut state = WizardState::default();
        state.location_input = "12345 Main Street".into();
        assert!(!can_proceed(&state, WizardStep::Industry).ok);
        state.location_input = "10250 Santa Monica Blvd".into();
        assert!(!can_proceed(&state, WizardStep::Industry).ok);
    }

    #[test]
    fn address_without_zip_passes_location() {
        let mut state = WizardState::default();
        state.location = Some(LocationRecord {
            formatted_address: Some("1 Market St, San Francisco".into()),
            ..LocationRecord::default()
        });
        assert!(can_proceed(&state, WizardStep::Industry).ok);
    }

    #[test]
    fn industry_without_location_never_unlocks_profile() {
        let mut state = WizardState::default();
        state.industry = IndustrySlug::new("hotel");
        state.template = Some(Arc::new(QuestionTemplate::generic(IndustrySlug::new("hotel"))));
        assert!(!can_proceed(&state, WizardStep::Profile).ok);
        assert_eq!(earliest_unmet(&state, WizardStep::Profile), WizardStep::Location);
    }

    #[test]
    fn results_gate_ignores_pricing_status() {
        let mut state = WizardState::default();
        state.profile_complete = true;
        state.pricing.status = crate::state::PricingStatus::Error;
        assert!(can_proceed(&state, WizardStep::Results).ok);
    }

    #[test]
    fn earliest_unmet_routes_to_owner_step() {
        let mut state = WizardState::default();
        state.location_input = "94105".into();
        assert_eq!(earliest_unmet(&state, WizardStep::Results), WizardStep::Industry);

        state.industry = IndustrySlug::new("hotel");
        state.template = Some(Arc::new(QuestionTemplate::generic(IndustrySlug::new("hotel"))));
        assert_eq!(earliest_unmet(&state, WizardStep::Results), WizardStep::Profile);
        assert_eq!(earliest_unmet(&state, WizardStep::Profile), WizardStep::Profile);
    }

    #[test]
    fn satisfied_differs_from_enterable() {
        let mut state = WizardState::default();
        state.location_input = "94105".into();
        assert!(can_proceed(&state, WizardStep::Industry).ok);
        assert!(!is_satisfied(&state, WizardStep::Industry));
    }

    #[test]
    fn progress_counts_current_step() {
        let mut state = WizardState::default();
        assert_eq!(progress(&state).percent, 16);
        state.step = WizardStep::Results;
        let p = progress(&state);
        assert_eq!((p.index, p.count, p.percent), (5, 6, 100));
    }
}
