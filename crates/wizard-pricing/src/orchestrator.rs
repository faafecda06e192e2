//! Two-layer pricing orchestrator
//!
//! One run:
//! 1. derive the request key and dispatch `PricingStart`
//! 2. physical layer under half the deadline; persist the load profile
//! 3. financial layer under the remaining deadline, retrying transient
//!    failures; any failure becomes a quote warning
//! 4. merge (load profile always, financial group only on success)
//! 5. confidence and sanity pass
//! 6. dispatch `PricingSuccess` or `PricingError` with the run's key
//!
//! A cancelled run dispatches nothing; the reducer's key check discards
//! anything a superseded run might still deliver.

use crate::config::PricingConfig;
use crate::layers::{FinancialLayer, FinancialRequest, LayerError, PhysicalLayer, PricingRequest};
use crate::retry::{retry_if, AttemptError};
use crate::sanity;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use wizard_core::memory::{LOAD_PROFILE_SLICE, PRICING_FREEZE_SLICE};
use wizard_core::{
    score_confidence, Intent, IntentSink, PricingFailure, PricingFailureKind, PricingFreeze,
    QuoteOutput, RequestKey, SliceStore,
};

/// Result of one run, as dispatched
#[derive(Debug, Clone, PartialEq)]
pub enum PricingOutcome {
    /// Quote produced (possibly without financials)
    Quoted(Box<QuoteOutput>),
    /// No quote
    Failed(PricingFailure),
    /// Superseded; nothing dispatched
    Cancelled,
}

impl PricingOutcome {
    /// Quote, when one was produced
    #[must_use]
    pub fn quote(&self) -> Option<&QuoteOutput> {
        match self {
            PricingOutcome::Quoted(quote) => Some(quote),
            PricingOutcome::Failed(_) | PricingOutcome::Cancelled => None,
        }
    }
}

/// Runs pricing against injected layers
#[derive(Clone)]
pub struct PricingOrchestrator {
    physical: Arc<dyn PhysicalLayer>,
    financial: Arc<dyn FinancialLayer>,
    slices: Arc<dyn SliceStore>,
    config: PricingConfig,
}

impl std::fmt::Debug for PricingOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PricingOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PricingOrchestrator {
    /// Create orchestrator with default config
    #[must_use]
    pub fn new(
        physical: Arc<dyn PhysicalLayer>,
        financial: Arc<dyn FinancialLayer>,
        slices: Arc<dyn SliceStore>,
    ) -> Self {
        Self {
            physical,
            financial,
            slices,
            config: PricingConfig::default(),
        }
    }

    /// With config
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: PricingConfig) -> Self {
        self.config = config;
        self
    }

    /// Active config
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Run pricing, dispatching every state change to `sink`
    pub async fn run_pricing_safe(
        &self,
        request: PricingRequest,
        sink: &dyn IntentSink,
        cancel: CancellationToken,
    ) -> PricingOutcome {
        let key = request.inputs.request_key();
        if cancel.is_cancelled() {
            return PricingOutcome::Cancelled;
        }
        tracing::info!(key = %key, industry = %request.industry, "Pricing run started");
        metrics::counter!("wizard_pricing_runs_total").increment(1);
        sink.dispatch(Intent::PricingStart {
            request_key: key.clone(),
        });

        let deadline = Instant::now() + self.config.total_timeout();
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => PricingOutcome::Cancelled,
            result = tokio::time::timeout_at(deadline, self.run_layers(&request, &key, deadline, &cancel)) => {
                result.unwrap_or_else(|_| {
                    tracing::warn!(key = %key, "Pricing passed its hard deadline");
                    PricingOutcome::Failed(PricingFailure::timed_out(self.config.total_timeout_ms))
                })
            }
        };

        match &outcome {
            PricingOutcome::Quoted(quote) => {
                tracing::info!(
                    key = %key,
                    complete = quote.pricing_complete,
                    warnings = quote.warnings.len(),
                    "Pricing run finished"
                );
                metrics::counter!("wizard_pricing_outcomes_total", "outcome" => "quoted").increment(1);
                sink.dispatch(Intent::PricingSuccess {
                    request_key: key,
                    quote: quote.clone(),
                });
            }
            PricingOutcome::Failed(failure) => {
                tracing::warn!(key = %key, "Pricing run failed: {}", failure.message);
                metrics::counter!("wizard_pricing_outcomes_total", "outcome" => "failed").increment(1);
                sink.dispatch(Intent::PricingError {
                    request_key: key,
                    failure: failure.clone(),
                });
            }
            PricingOutcome::Cancelled => {
                tracing::debug!(key = %key, "Pricing run superseded");
                metrics::counter!("wizard_pricing_outcomes_total", "outcome" => "cancelled").increment(1);
            }
        }
        outcome
    }

    async fn run_layers(
        &self,
        request: &PricingRequest,
        key: &RequestKey,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> PricingOutcome {
        if !request.industry.is_resolved() {
            return PricingOutcome::Failed(PricingFailure::new(
                PricingFailureKind::MissingInputs,
                "industry is not assigned",
            ));
        }

        let physical_budget = self.config.physical_timeout();
        let physical = match tokio::time::timeout(
            physical_budget,
            self.physical.compute_load_profile(request),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return PricingOutcome::Failed(PricingFailure::new(
                    PricingFailureKind::PhysicalLayer,
                    format!("physical layer failed: {e}"),
                ));
            }
            Err(_) => {
                return PricingOutcome::Failed(PricingFailure::timed_out(self.config.total_timeout_ms / 2));
            }
        };

        let mut storage_warnings = Vec::new();
        if let Ok(value) = serde_json::to_value(physical.load_profile) {
            if let Err(e) = self.slices.persist_slice(LOAD_PROFILE_SLICE, value) {
                storage_warnings.push(format!("load profile not persisted: {e}"));
            }
        }
        let freeze = PricingFreeze::capture(&physical.sizing, &request.add_ons, Utc::now());
        if let Ok(value) = serde_json::to_value(&freeze) {
            if let Err(e) = self.slices.persist_slice(PRICING_FREEZE_SLICE, value) {
                storage_warnings.push(format!("pricing freeze not persisted: {e}"));
            }
        }

        let financial_request = FinancialRequest {
            load_profile: physical.load_profile,
            sizing: physical.sizing,
            rates: request.rates(),
            add_ons: request.add_ons.clone(),
        };
        let financial_deadline = deadline
            .checked_sub(self.config.merge_reserve())
            .unwrap_or(deadline);
        let financial = match tokio::time::timeout_at(
            financial_deadline,
            retry_if(
                self.config.financial_retry,
                cancel,
                |attempt| {
                    tracing::debug!("Financial layer attempt {}", attempt);
                    self.financial.compute_financials(&financial_request)
                },
                |e| matches!(e, AttemptError::Failed(err) if err.is_retryable()),
            ),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AttemptError::TimedOut),
        };

        let confidence = score_confidence(&request.answers, request.template.as_deref());
        let mut quote = QuoteOutput::physical_only(
            key.clone(),
            physical.load_profile,
            physical.sizing,
            freeze,
            confidence,
        );
        match financial {
            Ok(breakdown) => quote = quote.with_financials(breakdown),
            Err(AttemptError::Aborted) => return PricingOutcome::Cancelled,
            Err(e) => {
                let warning = financial_warning(&e);
                tracing::warn!(key = %key, "{}", warning);
                quote = quote.with_warning(warning);
            }
        }
        if request.location.as_ref().is_some_and(|l| l.synthesized) {
            quote = quote.with_note("Location inferred from ZIP code");
        }
        if request.template.as_ref().is_some_and(|t| t.fallback) {
            quote = quote.with_note("Generic questionnaire used for this industry");
        }

        quote.warnings.extend(storage_warnings);
        let findings = sanity::check(&quote, self.config.sanity_tolerance);
        for finding in findings {
            quote = quote.with_warning(format!("Sanity check: {finding}"));
        }

        PricingOutcome::Quoted(Box::new(quote))
    }
}

fn financial_warning(error: &AttemptError<LayerError>) -> String {
    match error {
        AttemptError::Failed(e) => format!("Financial pricing unavailable: {e}"),
        AttemptError::TimedOut => "Financial pricing unavailable: timed out".to_string(),
        AttemptError::Aborted => "Financial pricing unavailable: aborted".to_string(),
    }
}
