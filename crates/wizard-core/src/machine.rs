//! Wizard reducer
//!
//! [`apply`] is a pure, total function from a snapshot and an intent to the
//! next snapshot. It never performs I/O and never reads the clock; side
//! effects are run by the caller and their results re-enter as intents.
//!
//! Pricing results are accepted only while the run they belong to is the
//! pending one, so a late response can never overwrite newer state.

use crate::answers::{AnswerPatch, AnswerStore, ProvenanceSource};
use crate::defaults::DefaultsScope;
use crate::error::{ErrorKind, WizardError};
use crate::gate;
use crate::intel::{self, LocationIntel};
use crate::intent::Intent;
use crate::quote::{PricingFailureKind, RequestKey};
use crate::state::{PricingState, PricingStatus, WizardState};
use crate::types::{BusinessCard, WizardStep};
use chrono::{DateTime, Utc};

/// Apply one intent
#[must_use]
pub fn apply(state: &WizardState, intent: Intent) -> WizardState {
    let mut next = state.clone();
    match intent {
        Intent::Reset { session_id } => {
            let mut fresh = WizardState::new(session_id);
            fresh.telemetry = state.telemetry;
            fresh.telemetry.resets += 1;
            return fresh;
        }
        Intent::Hydrate(snapshot) => return hydrate(state, *snapshot),
        Intent::SetStep(target) => set_step(&mut next, target),
        Intent::SetLocationInput(text) => next.location_input = text,
        Intent::SetLocation(record) => {
            let previous_zip = state.current_zip();
            next.location = Some(record);
            if next.current_zip() != previous_zip {
                next.location_intel = LocationIntel::default();
            }
        }
        Intent::ConfirmLocation(confirmed) => next.location_confirmed = confirmed,
        Intent::IntelFetching { zip, field } => {
            if is_current_zip(state, &zip) {
                next.location_intel.mark_fetching(field);
            }
        }
        Intent::IntelReady { zip, value, at } => {
            if is_current_zip(state, &zip) {
                let patch = intel::answers_from(&value);
                next.location_intel.mark_ready(value);
                if let Some(template) = next.template.clone() {
                    let patch = patch
                        .into_iter()
                        .filter(|(key, _)| template.has_question(key))
                        .collect();
                    next.answers = next
                        .answers
                        .patch_answers(patch, ProvenanceSource::LocationEnrichment, at)
                        .store;
                }
            } else {
                tracing::debug!(zip = %zip, "enrichment for a previous location ignored");
            }
        }
        Intent::IntelFailed {
            zip,
            field,
            message,
        } => {
            if is_current_zip(state, &zip) {
                next.location_intel.mark_failed(field, message);
            }
        }
        Intent::SetBusiness { card, at } => set_business(&mut next, card, at),
        Intent::SetIndustry { slug, locked } => {
            if slug != state.industry {
                next.template = None;
                next.answers = AnswerStore::new();
                next.defaults_applied_parts.clear();
                next.part_index = 0;
                next.profile_complete = false;
                next.quote = None;
                next.pricing = PricingState::default();
            }
            next.industry = slug;
            next.industry_locked = locked;
        }
        Intent::SetTemplate(template) => {
            if next.industry.is_resolved() && template.industry == next.industry {
                next.template = Some(template);
                next.part_index = 0;
            } else {
                tracing::debug!(
                    template = %template.industry,
                    industry = %next.industry,
                    "template for another industry ignored"
                );
            }
        }
        Intent::SeedDefaults { at } => seed_defaults(&mut next, at),
        Intent::SetAnswer { key, value, at } => {
            next.answers = next.answers.set_user_answer(key, value, at);
            if next.profile_complete && !next.missing_required().is_empty() {
                next.profile_complete = false;
            }
        }
        Intent::SetAnswers {
            answers,
            source,
            at,
        } => next.answers = next.answers.set_answers(answers, source, at),
        Intent::PatchAnswers { patch, source, at } => {
            next.answers = next.answers.patch_answers(patch, source, at).store;
        }
        Intent::ResetToDefaults { scope, at } => reset_to_defaults(&mut next, &scope, at),
        Intent::ApplyPartDefaults { part_id, at } => {
            if next.template.as_ref().is_some_and(|t| t.part(&part_id).is_some()) {
                for (source, layer) in next.part_defaults(&part_id) {
                    if !layer.is_empty() {
                        next.answers = next.answers.patch_answers(layer, source, at).store;
                    }
                }
                next.defaults_applied_parts.insert(part_id);
            }
        }
        Intent::SetPartIndex(index) => next.part_index = clamp_part(&next, index),
        Intent::NextPart => next.part_index = clamp_part(&next, next.part_index + 1),
        Intent::PrevPart => next.part_index = next.part_index.saturating_sub(1),
        Intent::CompleteProfile => complete_profile(&mut next),
        Intent::SetAddOns(config) => {
            next.add_ons = config;
            next.add_ons_confirmed = false;
        }
        Intent::ConfirmAddOns => next.add_ons_confirmed = true,
        Intent::PricingStart { request_key } => {
            next.pricing.status = PricingStatus::Pending;
            next.pricing.request_key = Some(request_key);
            next.pricing.last_failure = None;
            next.telemetry.pricing_runs += 1;
        }
        Intent::PricingSuccess { request_key, quote } => {
            if accepts_result(state, &request_key) {
                next.quote = Some(*quote);
                next.pricing.status = PricingStatus::Ok;
                next.pricing.last_failure = None;
            }
        }
        Intent::PricingError {
            request_key,
            failure,
        } => {
            if accepts_result(state, &request_key) {
                match failure.kind {
                    PricingFailureKind::Aborted => {
                        next.pricing.status = PricingStatus::Idle;
                        next.pricing.request_key = None;
                    }
                    PricingFailureKind::TimedOut => {
                        next.quote = None;
                        next.pricing.status = PricingStatus::TimedOut;
                        next.pricing.last_failure = Some(failure);
                    }
                    PricingFailureKind::PhysicalLayer | PricingFailureKind::MissingInputs => {
                        next.quote = None;
                        next.pricing.status = PricingStatus::Error;
                        next.pricing.last_failure = Some(failure);
                    }
                }
            }
        }
        Intent::PricingRetry => {
            if state.can_retry_pricing() {
                next.pricing.status = PricingStatus::Idle;
                next.pricing.request_key = None;
                next.pricing.retry_count += 1;
            }
        }
        Intent::SetError(record) => next.error = Some(record),
        Intent::ClearError => next.error = None,
        Intent::SetBusy(label) => next.busy = label,
        Intent::Unknown => {}
    }
    next
}

fn hydrate(current: &WizardState, mut snapshot: WizardState) -> WizardState {
    snapshot.answers = snapshot.answers.normalized();
    if snapshot.pricing.status == PricingStatus::Pending {
        snapshot.pricing.status = PricingStatus::Idle;
        snapshot.pricing.request_key = None;
    }
    snapshot.step_history.dedup();
    if snapshot.step_history.is_empty() {
        snapshot.step_history.push(snapshot.step);
    }
    snapshot.part_index = clamp_part(&snapshot, snapshot.part_index);
    let allowed = gate::earliest_unmet(&snapshot, snapshot.step);
    if allowed != snapshot.step {
        tracing::debug!(from = %snapshot.step, to = %allowed, "resumed step fails its gate");
        snapshot.step = allowed;
        if snapshot.step_history.last() != Some(&allowed) {
            snapshot.step_history.push(allowed);
        }
    }
    snapshot.busy = None;
    snapshot.telemetry = current.telemetry;
    snapshot
}

fn set_step(next: &mut WizardState, target: WizardStep) {
    if target > next.step {
        let decision = gate::can_proceed(next, target);
        if !decision.ok {
            let route_to = gate::earliest_unmet(next, target);
            let reason = decision.reason.unwrap_or_default();
            tracing::debug!(from = %next.step, to = %target, %route_to, "forward navigation refused");
            next.error = Some(WizardError::State { reason, route_to }.to_record());
            return;
        }
    }
    next.step = target;
    if next.step_history.last() != Some(&target) {
        next.step_history.push(target);
    }
    if next.error.as_ref().is_some_and(|e| e.kind == ErrorKind::State) {
        next.error = None;
    }
}

fn is_current_zip(state: &WizardState, zip: &str) -> bool {
    state.current_zip().as_deref() == Some(zip)
}

fn accepts_result(state: &WizardState, request_key: &RequestKey) -> bool {
    let accepted = state.pricing.status == PricingStatus::Pending
        && state.pricing.request_key.as_ref() == Some(request_key);
    if !accepted {
        tracing::debug!(key = %request_key, "stale pricing result discarded");
    }
    accepted
}

fn set_business(next: &mut WizardState, card: Option<BusinessCard>, at: DateTime<Utc>) {
    let hints = card.as_ref().map(|c| c.answer_hints.clone()).unwrap_or_default();
    next.business = card;
    if let Some(template) = next.template.clone() {
        let patch: AnswerPatch = hints
            .into_iter()
            .filter(|(key, _)| template.has_question(key))
            .collect();
        if !patch.is_empty() {
            next.answers = next
                .answers
                .patch_answers(patch, ProvenanceSource::BusinessDetection, at)
                .store;
        }
    }
}

fn seed_defaults(next: &mut WizardState, at: DateTime<Utc>) {
    let Some(ctx) = next.defaults_context() else {
        return;
    };
    let answers = if next.answers.is_empty() {
        ctx.seed(at)
    } else {
        ctx.layers()
            .into_iter()
            .filter(|(_, layer)| !layer.is_empty())
            .fold(next.answers.clone(), |store, (source, layer)| {
                store.patch_answers(layer, source, at).store
            })
    };
    let parts = ctx.template.parts.iter().map(|p| p.id.clone()).collect();
    next.answers = answers;
    next.defaults_applied_parts = parts;
}

fn reset_to_defaults(next: &mut WizardState, scope: &DefaultsScope, at: DateTime<Utc>) {
    let Some(ctx) = next.defaults_context() else {
        return;
    };
    let resolved = ctx.resolved();
    let keys = ctx.scope_keys(scope);
    let answers = next.answers.reset_to_defaults(&resolved, keys, at);
    let parts: Vec<String> = match scope {
        DefaultsScope::All => ctx.template.parts.iter().map(|p| p.id.clone()).collect(),
        DefaultsScope::Part(id) if ctx.template.part(id).is_some() => vec![id.clone()],
        DefaultsScope::Part(_) => Vec::new(),
    };
    next.answers = answers;
    next.defaults_applied_parts.extend(parts);
    if next.profile_complete && !next.missing_required().is_empty() {
        next.profile_complete = false;
    }
}

fn complete_profile(next: &mut WizardState) {
    let decision = gate::can_proceed(next, WizardStep::Profile);
    if !decision.ok {
        let route_to = gate::earliest_unmet(next, WizardStep::Profile);
        let reason = decision.reason.unwrap_or_default();
        next.error = Some(WizardError::State { reason, route_to }.to_record());
        return;
    }
    let missing = next.missing_required();
    if missing.is_empty() {
        next.profile_complete = true;
        next.error = None;
    } else {
        next.error = Some(
            WizardError::Validation(format!("missing required answers: {}", missing.join(", ")))
                .to_record(),
        );
    }
}

fn clamp_part(state: &WizardState, index: usize) -> usize {
    index.min(state.part_count().saturating_sub(1))
}
