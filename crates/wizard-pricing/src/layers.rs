//! Pricing layer seams
//!
//! The physical layer turns answers into a load profile and sizing hints.
//! The financial layer turns those, plus rates and add-ons, into a cost and
//! savings breakdown. Both are injected as trait objects.

use async_trait::async_trait;
use std::sync::Arc;
use wizard_core::{
    AddOnConfig, AnswerStore, FinancialBreakdown, IndustrySlug, LoadProfile, LocationIntel,
    LocationRecord, PricingInputs, QuestionTemplate, SizingHints, WizardState,
};

/// Pricing layer failure
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayerError {
    /// Inputs cannot support a computation
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Backing service unavailable; may succeed later
    #[error("layer unavailable: {0}")]
    Unavailable(String),

    /// Computation failed
    #[error("computation failed: {0}")]
    Failed(String),
}

impl LayerError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, LayerError::Unavailable(_))
    }
}

/// Everything one pricing run reads, captured when the run starts
#[derive(Debug, Clone)]
pub struct PricingRequest {
    /// Request-key inputs
    pub inputs: PricingInputs,
    /// Assigned industry
    pub industry: IndustrySlug,
    /// Loaded template
    pub template: Option<Arc<QuestionTemplate>>,
    /// Answers with provenance
    pub answers: AnswerStore,
    /// Location, resolved or synthesized
    pub location: Option<LocationRecord>,
    /// Enrichment
    pub intel: LocationIntel,
    /// Add-ons
    pub add_ons: AddOnConfig,
}

impl PricingRequest {
    /// Capture a request from a state snapshot
    #[must_use]
    pub fn from_state(state: &WizardState) -> Self {
        Self {
            inputs: state.pricing_inputs(),
            industry: state.industry.clone(),
            template: state.template.clone(),
            answers: state.answers.clone(),
            location: state.location.clone(),
            intel: state.location_intel.clone(),
            add_ons: state.add_ons.clone(),
        }
    }

    /// Rate inputs for the financial layer
    ///
    /// Answers win over raw enrichment so operator edits are honored.
    #[must_use]
    pub fn rates(&self) -> RateInputs {
        let utility = self.intel.utility.value.as_ref();
        let solar = self.intel.solar.value.as_ref();
        RateInputs {
            electricity_rate: self
                .answers
                .number("electricityRate")
                .or_else(|| utility.and_then(|u| u.rate_per_kwh)),
            demand_charge: self
                .answers
                .number("demandCharge")
                .or_else(|| utility.and_then(|u| u.demand_charge_per_kw)),
            peak_sun_hours: self
                .answers
                .number("peakSunHours")
                .or_else(|| solar.and_then(|s| s.peak_sun_hours)),
        }
    }
}

/// Physical-layer result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalOutput {
    /// Load profile
    pub load_profile: LoadProfile,
    /// Storage sizing
    pub sizing: SizingHints,
}

/// Tariff and resource inputs
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateInputs {
    /// Energy rate ($/kWh)
    pub electricity_rate: Option<f64>,
    /// Demand charge ($/kW-month)
    pub demand_charge: Option<f64>,
    /// Peak sun hours per day
    pub peak_sun_hours: Option<f64>,
}

/// Financial-layer input
#[derive(Debug, Clone, PartialEq)]
pub struct FinancialRequest {
    /// Load profile from the physical layer
    pub load_profile: LoadProfile,
    /// Sizing from the physical layer
    pub sizing: SizingHints,
    /// Tariff and resource inputs
    pub rates: RateInputs,
    /// Add-ons
    pub add_ons: AddOnConfig,
}

/// Deterministic load-profile computation
#[async_trait]
pub trait PhysicalLayer: Send + Sync {
    /// Compute load profile and sizing hints
    async fn compute_load_profile(&self, request: &PricingRequest) -> Result<PhysicalOutput, LayerError>;
}

/// Cost and savings computation
#[async_trait]
pub trait FinancialLayer: Send + Sync {
    /// Compute the financial breakdown
    async fn compute_financials(&self, request: &FinancialRequest) -> Result<FinancialBreakdown, LayerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use wizard_core::{IntelValue, UtilityRate};

    #[test]
    fn only_unavailable_is_retryable() {
        assert!(LayerError::Unavailable("503".into()).is_retryable());
        assert!(!LayerError::InsufficientData("no rate".into()).is_retryable());
        assert!(!LayerError::Failed("nan".into()).is_retryable());
    }

    #[test]
    fn answers_win_over_raw_enrichment() {
        let mut state = WizardState::default();
        state.location_intel.mark_ready(IntelValue::Utility(UtilityRate {
            rate_per_kwh: Some(0.18),
            demand_charge_per_kw: Some(20.0),
            ..UtilityRate::default()
        }));
        state.answers = state
            .answers
            .set_user_answer("electricityRate", json!(0.22), Utc::now());

        let rates = PricingRequest::from_state(&state).rates();
        assert_eq!(rates.electricity_rate, Some(0.22));
        assert_eq!(rates.demand_charge, Some(20.0));
        assert_eq!(rates.peak_sun_hours, None);
    }
}
