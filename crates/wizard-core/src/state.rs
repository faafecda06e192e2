//! Wizard state snapshot
//!
//! [`WizardState`] is the single source of truth for a session. It is only
//! ever replaced wholesale by the reducer; the query helpers here are pure
//! reads used by gates, navigation and rendering.

use crate::answers::{AnswerPatch, AnswerStore, ProvenanceSource};
use crate::defaults::{DefaultsContext, DefaultsScope};
use crate::error::ErrorRecord;
use crate::geo;
use crate::intel::LocationIntel;
use crate::quote::{PricingFailure, PricingInputs, QuoteOutput, RequestKey};
use crate::template::{QuestionTemplate, TemplatePart};
use crate::types::{AddOnConfig, BusinessCard, IndustrySlug, LocationRecord, SessionId, Telemetry, WizardStep};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Pricing run status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingStatus {
    /// No run in flight
    #[default]
    Idle,
    /// Run in flight
    Pending,
    /// Last run produced a quote
    Ok,
    /// Last run failed
    Error,
    /// Last run passed the hard deadline
    TimedOut,
}

/// Pricing bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingState {
    /// Run status
    pub status: PricingStatus,
    /// Key of the run whose result is accepted
    pub request_key: Option<RequestKey>,
    /// Failure of the last run
    pub last_failure: Option<PricingFailure>,
    /// Explicit retries requested
    pub retry_count: u32,
}

/// Session snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    /// Session identifier, regenerated on reset
    pub session_id: SessionId,
    /// Current step
    pub step: WizardStep,
    /// Visited steps, no duplicate consecutive entries
    pub step_history: Vec<WizardStep>,
    /// Raw ZIP / address text
    pub location_input: String,
    /// Resolved or synthesized location
    pub location: Option<LocationRecord>,
    /// Location stage complete
    pub location_confirmed: bool,
    /// Enrichment slots for the current location
    pub location_intel: LocationIntel,
    /// Detected business
    pub business: Option<BusinessCard>,
    /// Assigned industry (`auto` when unresolved)
    pub industry: IndustrySlug,
    /// Industry was inferred and locked
    pub industry_locked: bool,
    /// Template for the assigned industry
    pub template: Option<Arc<QuestionTemplate>>,
    /// Answers with provenance
    pub answers: AnswerStore,
    /// Parts whose defaults were applied
    pub defaults_applied_parts: BTreeSet<String>,
    /// Profile sub-section cursor
    pub part_index: usize,
    /// Profile stage complete
    pub profile_complete: bool,
    /// Add-on configuration
    pub add_ons: AddOnConfig,
    /// Add-on stage complete
    pub add_ons_confirmed: bool,
    /// Pricing bookkeeping
    pub pricing: PricingState,
    /// Latest accepted quote
    pub quote: Option<QuoteOutput>,
    /// Error shown to the operator
    pub error: Option<ErrorRecord>,
    /// Busy label shown while a side effect runs
    pub busy: Option<String>,
    /// External analytics counters
    pub telemetry: Telemetry,
}

impl Default for WizardState {
    fn default() -> Self {
        Self::new(SessionId::new())
    }
}

impl WizardState {
    /// Fresh state at the location step
    #[must_use]
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            step: WizardStep::Location,
            step_history: vec![WizardStep::Location],
            location_input: String::new(),
            location: None,
            location_confirmed: false,
            location_intel: LocationIntel::default(),
            business: None,
            industry: IndustrySlug::unresolved(),
            industry_locked: false,
            template: None,
            answers: AnswerStore::new(),
            defaults_applied_parts: BTreeSet::new(),
            part_index: 0,
            profile_complete: false,
            add_ons: AddOnConfig::default(),
            add_ons_confirmed: false,
            pricing: PricingState::default(),
            quote: None,
            error: None,
            busy: None,
            telemetry: Telemetry::default(),
        }
    }

    /// Normalized ZIP from the location record, else from the raw input
    #[must_use]
    pub fn current_zip(&self) -> Option<String> {
        self.location
            .as_ref()
            .and_then(|l| l.postal_code.as_deref())
            .and_then(geo::normalize_zip)
            .or_else(|| geo::normalize_zip(&self.location_input))
    }

    /// Check if the loaded template belongs to the assigned industry
    #[must_use]
    pub fn has_template_for_industry(&self) -> bool {
        self.industry.is_resolved()
            && self
                .template
                .as_ref()
                .is_some_and(|t| t.industry == self.industry)
    }

    /// Current profile part
    #[must_use]
    pub fn current_part(&self) -> Option<&TemplatePart> {
        self.template.as_ref()?.parts.get(self.part_index)
    }

    /// Number of profile parts
    #[must_use]
    pub fn part_count(&self) -> usize {
        self.template.as_ref().map_or(0, |t| t.parts.len())
    }

    /// Required questions without a usable answer
    #[must_use]
    pub fn missing_required(&self) -> Vec<String> {
        self.template.as_ref().map_or_else(Vec::new, |t| {
            t.required_ids()
                .filter(|id| !self.answers.is_answered(id))
                .map(str::to_string)
                .collect()
        })
    }

    /// Defaults context over the loaded template
    #[must_use]
    pub fn defaults_context(&self) -> Option<DefaultsContext<'_>> {
        self.template
            .as_deref()
            .map(|t| DefaultsContext::new(t, &self.location_intel, self.business.as_ref()))
    }

    /// Resolved default for one question
    #[must_use]
    pub fn default_for_question(&self, key: &str) -> Option<Value> {
        self.defaults_context()?.default_for(key).map(|(v, _)| v)
    }

    /// Check if any question in a part has a default
    #[must_use]
    pub fn part_has_any_defaults(&self, part_id: &str) -> bool {
        let Some(ctx) = self.defaults_context() else {
            return false;
        };
        let resolved = ctx.resolved();
        ctx.scope_keys(&DefaultsScope::Part(part_id.to_string()))
            .iter()
            .any(|k| resolved.contains_key(*k))
    }

    /// Check if defaults were applied to a part
    #[inline]
    #[must_use]
    pub fn has_defaults_applied(&self, part_id: &str) -> bool {
        self.defaults_applied_parts.contains(part_id)
    }

    /// Check if applying part defaults would do anything
    #[must_use]
    pub fn can_apply_defaults(&self, part_id: &str) -> bool {
        !self.has_defaults_applied(part_id) && self.part_has_any_defaults(part_id)
    }

    /// Check if a reset would change any answer in scope
    #[must_use]
    pub fn can_reset_to_defaults(&self, scope: &DefaultsScope) -> bool {
        let Some(ctx) = self.defaults_context() else {
            return false;
        };
        let resolved = ctx.resolved();
        ctx.scope_keys(scope).iter().any(|key| {
            let current = self.answers.get(key);
            match resolved.get(*key) {
                Some((value, _)) => current != Some(value),
                None => current.is_some_and(|v| !v.is_null()),
            }
        })
    }

    /// Defaults for a part that may be written without clobbering edits
    #[must_use]
    pub fn part_defaults(&self, part_id: &str) -> Vec<(ProvenanceSource, AnswerPatch)> {
        let Some(ctx) = self.defaults_context() else {
            return Vec::new();
        };
        let keys: BTreeSet<&str> = ctx
            .scope_keys(&DefaultsScope::Part(part_id.to_string()))
            .into_iter()
            .collect();
        ctx.layers()
            .into_iter()
            .map(|(source, layer)| {
                let scoped = layer
                    .into_iter()
                    .filter(|(k, _)| keys.contains(k.as_str()))
                    .collect();
                (source, scoped)
            })
            .collect()
    }

    /// Pricing-relevant inputs of the current state
    #[must_use]
    pub fn pricing_inputs(&self) -> PricingInputs {
        let answers = self
            .answers
            .answers()
            .iter()
            .filter(|(key, _)| {
                self.template
                    .as_ref()
                    .map_or(true, |t| t.question(key).is_some_and(|q| q.pricing_input))
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        PricingInputs {
            industry: self.industry.clone(),
            zip: self.current_zip(),
            region: self.location.as_ref().and_then(|l| l.region.clone()),
            answers,
            add_ons: self.add_ons.clone(),
        }
    }

    /// Check if a pricing run is in flight
    #[inline]
    #[must_use]
    pub fn is_pricing_pending(&self) -> bool {
        self.pricing.status == PricingStatus::Pending
    }

    /// Check if an explicit pricing retry is allowed
    #[must_use]
    pub fn can_retry_pricing(&self) -> bool {
        match self.pricing.status {
            PricingStatus::Error | PricingStatus::TimedOut => true,
            PricingStatus::Ok => self.quote.as_ref().is_some_and(|q| !q.pricing_complete),
            PricingStatus::Idle | PricingStatus::Pending => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn with_template() -> WizardState {
        let mut state = WizardState::default();
        state.industry = IndustrySlug::new("office");
        state.template = Some(Arc::new(QuestionTemplate::generic(IndustrySlug::new("office"))));
        state
    }

    #[test]
    fn fresh_state_starts_at_location() {
        let state = WizardState::default();
        assert_eq!(state.step, WizardStep::Location);
        assert_eq!(state.step_history, vec![WizardStep::Location]);
        assert!(!state.industry.is_resolved());
    }

    #[test]
    fn zip_falls_back_to_raw_input() {
        let mut state = WizardState::default();
        state.location_input = " 94105-1234 ".into();
        assert_eq!(state.current_zip().as_deref(), Some("94105"));
    }

    #[test]
    fn template_must_match_industry() {
        let mut state = with_template();
        assert!(state.has_template_for_industry());
        state.industry = IndustrySlug::new("hotel");
        assert!(!state.has_template_for_industry());
    }

    #[test]
    fn part_default_queries() {
        let mut state = with_template();
        assert!(state.part_has_any_defaults("facility"));
        assert!(state.can_apply_defaults("facility"));
        state.defaults_applied_parts.insert("facility".into());
        assert!(!state.can_apply_defaults("facility"));
        assert!(state.has_defaults_applied("facility"));
        assert_eq!(state.default_for_question("operatingHours"), Some(json!(12)));
    }

    #[test]
    fn reset_possible_only_when_answers_differ() {
        let mut state = with_template();
        let scope = DefaultsScope::Part("facility".into());
        state.answers = state
            .defaults_context()
            .map(|ctx| ctx.seed(Utc::now()))
            .unwrap_or_default();
        assert!(!state.can_reset_to_defaults(&scope));
        state.answers = state
            .answers
            .set_user_answer("operatingHours", json!(20), Utc::now());
        assert!(state.can_reset_to_defaults(&scope));
    }

    #[test]
    fn pricing_inputs_skip_non_pricing_questions() {
        let mut state = with_template();
        state.answers = state
            .answers
            .set_user_answer("operatingHours", json!(10), Utc::now())
            .set_user_answer("contactEmail", json!("a@b.c"), Utc::now());
        let inputs = state.pricing_inputs();
        assert!(inputs.answers.contains_key("operatingHours"));
        assert!(!inputs.answers.contains_key("contactEmail"));
    }

    #[test]
    fn missing_required_lists_unanswered() {
        let state = with_template();
        assert_eq!(
            state.missing_required(),
            vec!["operatingHours".to_string(), "gridConnection".to_string()]
        );
    }
}
