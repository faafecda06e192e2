//! Wizard session driver
//!
//! Owns the authoritative state behind a single `RwLock`; every write goes
//! through the reducer. Side effects (location resolution, enrichment,
//! template loading, pricing, profile submission) run outside the lock and
//! feed their results back as intents.
//!
//! Pricing is fire-and-forget: [`WizardSession::dispatch`] returns as soon as
//! the triggering intent is applied, carrying the spawned run's handle.

use crate::cancel::{CancellationFamilies, Family};
use crate::collaborators::{Collaborators, ProfileSubmission};
use crate::config::SessionConfig;
use chrono::Utc;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use wizard_core::memory::{LOAD_PROFILE_SLICE, PRICING_FREEZE_SLICE, SNAPSHOT_SLICE};
use wizard_core::{
    apply, gate, geo, AddOnConfig, Gates, IndustrySlug, Intent, IntentSink, IntelField,
    IntelValue, LocationRecord, Progress, QuestionTemplate, SliceStore, WizardError, WizardState,
    WizardStep,
};
use wizard_pricing::{
    retry_if, AttemptError, FinancialLayer, PhysicalLayer, PricingOrchestrator, PricingOutcome,
    PricingRequest,
};

/// Result of a dispatched intent
#[derive(Debug)]
pub struct Dispatched {
    /// State after the intent was applied
    pub state: WizardState,
    /// Pricing run started by the intent
    pub pricing: Option<JoinHandle<PricingOutcome>>,
}

impl Dispatched {
    /// Wait for the started pricing run, if any
    pub async fn wait_for_pricing(self) -> Option<PricingOutcome> {
        match self.pricing {
            Some(handle) => handle.await.ok(),
            None => None,
        }
    }
}

/// Outcome of a navigation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Now on the requested step
    Arrived(WizardStep),
    /// Gate refused; moved to the earliest step needing attention
    Redirected {
        /// Step the operator was sent to
        to: WizardStep,
        /// Gate reason
        reason: String,
    },
}

/// Profile submission result
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// No submitter configured
    Skipped,
    /// Accepted by the submitter
    Sent,
    /// Gave up; the wizard continues regardless
    Failed(WizardError),
}

/// Result of completing the profile stage
#[derive(Debug)]
pub struct Completion {
    /// Reducer result and pricing run
    pub dispatched: Dispatched,
    /// Submission result
    pub submission: Submission,
}

const FINDING_LOCATION: &str = "Finding location";
const LOADING_QUESTIONS: &str = "Loading questions";

/// Clears its busy label on drop unless a newer label replaced it
struct BusyGuard<'a> {
    session: &'a WizardSession,
    label: &'static str,
    ticket: u64,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.session.state.write();
        let owned = self.session.busy_owner.load(Ordering::Relaxed) == self.ticket;
        if owned && state.busy.as_deref() == Some(self.label) {
            self.session.commit_locked(&mut state, Intent::SetBusy(None));
        }
    }
}

/// One operator session
pub struct WizardSession {
    state: RwLock<WizardState>,
    collaborators: Collaborators,
    pricing: PricingOrchestrator,
    slices: Arc<dyn SliceStore>,
    families: CancellationFamilies,
    config: SessionConfig,
    busy_tickets: AtomicU64,
    busy_owner: AtomicU64,
}

impl std::fmt::Debug for WizardSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WizardSession")
            .field("session_id", &self.state.read().session_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IntentSink for WizardSession {
    fn dispatch(&self, intent: Intent) {
        self.commit(intent);
    }
}

impl WizardSession {
    /// Create a session over the given collaborators and pricing layers
    #[must_use]
    pub fn new(
        collaborators: Collaborators,
        physical: Arc<dyn PhysicalLayer>,
        financial: Arc<dyn FinancialLayer>,
        slices: Arc<dyn SliceStore>,
        config: SessionConfig,
    ) -> Arc<Self> {
        let pricing =
            PricingOrchestrator::new(physical, financial, slices.clone()).with_config(config.pricing);
        Arc::new(Self {
            state: RwLock::new(WizardState::default()),
            collaborators,
            pricing,
            slices,
            families: CancellationFamilies::new(),
            config,
            busy_tickets: AtomicU64::new(0),
            busy_owner: AtomicU64::new(0),
        })
    }

    /// Active config
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current state
    #[must_use]
    pub fn snapshot(&self) -> WizardState {
        self.state.read().clone()
    }

    /// Progress through the fixed steps
    #[must_use]
    pub fn progress(&self) -> Progress {
        gate::progress(&self.state.read())
    }

    /// Gate status of every step
    #[must_use]
    pub fn gates(&self) -> Gates {
        gate::gates(&self.state.read())
    }

    fn commit(&self, intent: Intent) -> WizardState {
        let mut guard = self.state.write();
        self.commit_locked(&mut guard, intent)
    }

    fn commit_locked(&self, state: &mut WizardState, intent: Intent) -> WizardState {
        let name = intent.name();
        let next = apply(state, intent);
        *state = next.clone();
        if self.config.persist_snapshots {
            match serde_json::to_value(&next) {
                Ok(value) => {
                    if let Err(e) = self.slices.persist_slice(SNAPSHOT_SLICE, value) {
                        tracing::warn!("Snapshot not persisted: {}", e);
                    }
                }
                Err(e) => tracing::warn!("Snapshot not serializable: {}", e),
            }
        }
        tracing::trace!(intent = name, step = %next.step, "Intent applied");
        next
    }

    /// Show `label` until the returned guard drops
    fn busy(&self, label: &'static str) -> BusyGuard<'_> {
        let ticket = self.busy_tickets.fetch_add(1, Ordering::Relaxed) + 1;
        let mut state = self.state.write();
        self.busy_owner.store(ticket, Ordering::Relaxed);
        self.commit_locked(&mut state, Intent::SetBusy(Some(label.to_string())));
        BusyGuard {
            session: self,
            label,
            ticket,
        }
    }

    /// Apply an intent, starting pricing when it completes the inputs
    pub fn dispatch(self: &Arc<Self>, intent: Intent) -> Dispatched {
        let triggers = match intent {
            Intent::CompleteProfile | Intent::ConfirmAddOns => self.config.auto_price,
            Intent::PricingRetry => true,
            _ => false,
        };
        let state = self.commit(intent);
        let pricing = (triggers && wants_pricing(&state)).then(|| self.spawn_pricing(&state));
        Dispatched { state, pricing }
    }

    fn spawn_pricing(self: &Arc<Self>, state: &WizardState) -> JoinHandle<PricingOutcome> {
        let cancel = self.families.begin(Family::Pricing);
        let request = PricingRequest::from_state(state);
        let session = Arc::clone(self);
        tokio::spawn(async move {
            session
                .pricing
                .run_pricing_safe(request, &*session, cancel)
                .await
        })
    }

    /// Navigate, running the side effects entering `target` needs
    ///
    /// # Errors
    /// Returns [`WizardError::Aborted`] when superseded, or a template error
    /// when the industry's template violates its schema.
    pub async fn go_to_step(&self, target: WizardStep) -> Result<Navigation, WizardError> {
        let cancel = self.families.begin(Family::Navigation);
        let current = self.snapshot();

        if target > current.step {
            if target >= WizardStep::Industry && current.location.is_none() {
                self.synthesize_location(&current.location_input);
            }
            if target >= WizardStep::Profile
                && current.industry.is_resolved()
                && !current.has_template_for_industry()
            {
                self.ensure_template(&current.industry, &cancel).await?;
            }
        }

        let state = self.commit(Intent::SetStep(target));
        if state.step == target {
            tracing::info!("Navigated to {}", target);
            return Ok(Navigation::Arrived(target));
        }

        let reason = gate::can_proceed(&state, target).reason.unwrap_or_default();
        let route_to = gate::earliest_unmet(&state, target);
        tracing::info!(%target, %route_to, "Navigation refused: {}", reason);
        metrics::counter!("wizard_navigation_redirects_total").increment(1);
        if route_to != state.step {
            let error = state.error.clone();
            self.commit(Intent::SetStep(route_to));
            if let Some(record) = error {
                self.commit(Intent::SetError(record));
            }
        }
        Ok(Navigation::Redirected {
            to: route_to,
            reason,
        })
    }

    fn synthesize_location(&self, input: &str) -> Option<LocationRecord> {
        let record = geo::minimal_location(input)?;
        tracing::debug!(zip = ?record.postal_code, region = ?record.region, "Synthesized location from ZIP");
        self.commit(Intent::SetLocation(record.clone()));
        self.commit(Intent::ConfirmLocation(true));
        Some(record)
    }

    /// Resolve location input, then run the three enrichment lookups
    ///
    /// A bare ZIP the resolver cannot place is still accepted as a
    /// synthesized location.
    ///
    /// # Errors
    /// Returns [`WizardError::Validation`] when the input holds neither a
    /// resolvable address nor a ZIP, or [`WizardError::Aborted`] when
    /// superseded.
    pub async fn submit_location(&self, input: &str) -> Result<LocationRecord, WizardError> {
        let cancel = self.families.begin(Family::Location);
        self.commit(Intent::SetLocationInput(input.to_string()));
        let busy = self.busy(FINDING_LOCATION);

        let resolved = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(WizardError::Aborted),
            result = self.collaborators.location.resolve_location(input, &cancel) => result,
        };
        drop(busy);

        let record = match resolved {
            Ok(Some(record)) => geo::backfill(record, input),
            Err(WizardError::Aborted) => return Err(WizardError::Aborted),
            Ok(None) => match geo::minimal_location(input) {
                Some(record) => record,
                None => {
                    let error =
                        WizardError::Validation("Enter a 5-digit ZIP code or a full address".into());
                    self.commit(Intent::SetError(error.to_record()));
                    return Err(error);
                }
            },
            Err(e) => match geo::minimal_location(input) {
                Some(record) => {
                    tracing::warn!("Location lookup failed, using ZIP only: {}", e);
                    record
                }
                None => {
                    self.commit(Intent::SetError(e.to_record()));
                    return Err(e);
                }
            },
        };

        self.commit(Intent::SetLocation(record.clone()));
        self.commit(Intent::ConfirmLocation(true));
        tracing::info!(zip = ?record.postal_code, synthesized = record.synthesized, "Location confirmed");

        if let Some(zip) = record.postal_code.clone() {
            self.enrich(&zip, &cancel).await;
        }
        Ok(record)
    }

    async fn enrich(&self, zip: &str, cancel: &CancellationToken) {
        for field in IntelField::ALL {
            self.commit(Intent::IntelFetching {
                zip: zip.to_string(),
                field,
            });
        }

        let intel = &self.collaborators.intel;
        let mut lookups: FuturesUnordered<BoxFuture<'_, (IntelField, Result<IntelValue, WizardError>)>> =
            FuturesUnordered::new();
        lookups.push(
            async move {
                let result = intel.fetch_utility_rate(zip).await.map(IntelValue::Utility);
                (IntelField::Utility, result)
            }
            .boxed(),
        );
        lookups.push(
            async move {
                let result = intel.fetch_solar_resource(zip).await.map(IntelValue::Solar);
                (IntelField::Solar, result)
            }
            .boxed(),
        );
        lookups.push(
            async move {
                let result = intel.fetch_weather_profile(zip).await.map(IntelValue::Weather);
                (IntelField::Weather, result)
            }
            .boxed(),
        );

        loop {
            let settled = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!(zip, "Enrichment superseded");
                    return;
                }
                settled = lookups.next() => settled,
            };
            let Some((field, result)) = settled else {
                break;
            };
            match result {
                Ok(value) => {
                    self.commit(Intent::IntelReady {
                        zip: zip.to_string(),
                        value,
                        at: Utc::now(),
                    });
                }
                Err(e) => {
                    tracing::warn!(zip, ?field, "Enrichment lookup failed: {}", e);
                    self.commit(Intent::IntelFailed {
                        zip: zip.to_string(),
                        field,
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    /// Assign the industry and load its template
    ///
    /// # Errors
    /// Returns [`WizardError::Validation`] for the unresolved sentinel, a
    /// template error for a schema violation, or [`WizardError::Aborted`]
    /// when superseded.
    pub async fn select_industry(
        &self,
        slug: IndustrySlug,
        locked: bool,
    ) -> Result<Arc<QuestionTemplate>, WizardError> {
        let cancel = self.families.begin(Family::Industry);
        if !slug.is_resolved() {
            let error = WizardError::Validation("Select an industry".into());
            self.commit(Intent::SetError(error.to_record()));
            return Err(error);
        }
        let state = self.commit(Intent::SetIndustry {
            slug: slug.clone(),
            locked,
        });
        if let Some(template) = state.template.filter(|t| t.industry == slug) {
            return Ok(template);
        }
        self.ensure_template(&slug, &cancel).await
    }

    async fn ensure_template(
        &self,
        industry: &IndustrySlug,
        cancel: &CancellationToken,
    ) -> Result<Arc<QuestionTemplate>, WizardError> {
        let busy = self.busy(LOADING_QUESTIONS);
        let loaded = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(WizardError::Aborted),
            result = self.collaborators.templates.load_template(industry, cancel) => result,
        };
        if cancel.is_cancelled() {
            return Err(WizardError::Aborted);
        }
        drop(busy);

        let template = match loaded.and_then(|t| t.validate().map(|()| t).map_err(WizardError::from)) {
            Ok(template) => template,
            Err(WizardError::Aborted) => return Err(WizardError::Aborted),
            Err(e @ WizardError::Template(_)) => {
                tracing::error!(%industry, "Template rejected: {}", e);
                self.commit(Intent::SetError(e.to_record()));
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(%industry, "Template unavailable, using generic questions: {}", e);
                QuestionTemplate::generic(industry.clone())
            }
        };

        let template = Arc::new(template);
        self.commit(Intent::SetTemplate(Arc::clone(&template)));
        self.commit(Intent::seed_defaults());
        Ok(template)
    }

    /// Record an operator edit
    pub fn set_answer(&self, key: impl Into<String>, value: impl Into<Value>) -> WizardState {
        self.commit(Intent::user_edit(key, value))
    }

    /// Complete the profile stage, start pricing and submit the profile
    ///
    /// # Errors
    /// Returns [`WizardError::State`] when an earlier gate is unmet, or
    /// [`WizardError::Validation`] listing unanswered required questions.
    pub async fn complete_profile(self: &Arc<Self>) -> Result<Completion, WizardError> {
        let dispatched = self.dispatch(Intent::CompleteProfile);
        if !dispatched.state.profile_complete {
            return Err(profile_error(&dispatched.state));
        }
        let submission = self.submit_profile(&dispatched.state, false).await;
        Ok(Completion {
            dispatched,
            submission,
        })
    }

    /// Submit the answers given so far without completing the profile
    ///
    /// Unanswered (`null`) questions are left out. Like the completed
    /// submission, failures are reported but never block the wizard.
    ///
    /// # Errors
    /// Returns [`WizardError::State`] when no template is loaded for the
    /// assigned industry yet.
    pub async fn submit_partial_profile(&self) -> Result<Submission, WizardError> {
        let state = self.snapshot();
        let decision = gate::can_proceed(&state, WizardStep::Profile);
        if !decision.ok {
            return Err(WizardError::State {
                reason: decision.reason.unwrap_or_default(),
                route_to: gate::earliest_unmet(&state, WizardStep::Profile),
            });
        }
        Ok(self.submit_profile(&state, true).await)
    }

    async fn submit_profile(&self, state: &WizardState, partial: bool) -> Submission {
        let Some(submitter) = &self.collaborators.submitter else {
            return Submission::Skipped;
        };
        let submission = ProfileSubmission {
            session_id: state.session_id,
            industry: state.industry.clone(),
            zip: state.current_zip(),
            answers: state
                .answers
                .answers()
                .iter()
                .filter(|(_, v)| !partial || !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            partial,
        };
        let cancel = CancellationToken::new();
        let result = retry_if(
            self.config.submission_retry,
            &cancel,
            |attempt| {
                tracing::debug!("Profile submission attempt {}", attempt);
                submitter.submit(&submission)
            },
            |e| matches!(e, AttemptError::Failed(err) if err.is_retryable()),
        )
        .await;
        match result {
            Ok(()) => {
                tracing::info!(session = %state.session_id, partial, "Profile submitted");
                Submission::Sent
            }
            Err(e) => {
                tracing::warn!(session = %state.session_id, "Profile submission failed: {}", e);
                metrics::counter!("wizard_submission_failures_total").increment(1);
                let error = match e {
                    AttemptError::Failed(err) => err,
                    AttemptError::TimedOut => WizardError::Network("submission timed out".into()),
                    AttemptError::Aborted => WizardError::Aborted,
                };
                Submission::Failed(error)
            }
        }
    }

    /// Store add-ons and confirm them, re-pricing when inputs changed
    pub fn confirm_add_ons(self: &Arc<Self>, add_ons: AddOnConfig) -> Dispatched {
        self.commit(Intent::SetAddOns(add_ons));
        self.dispatch(Intent::ConfirmAddOns)
    }

    /// Explicit pricing retry
    pub fn retry_pricing(self: &Arc<Self>) -> Dispatched {
        self.dispatch(Intent::PricingRetry)
    }

    /// Abort everything in flight and start a fresh session
    pub fn reset(&self) -> WizardState {
        self.families.cancel_all();
        for slice in [LOAD_PROFILE_SLICE, PRICING_FREEZE_SLICE] {
            if let Err(e) = self.slices.persist_slice(slice, Value::Null) {
                tracing::warn!("Slice {} not cleared: {}", slice, e);
            }
        }
        let state = self.commit(Intent::reset());
        tracing::info!(session = %state.session_id, "Session reset");
        state
    }

    /// Resume the persisted snapshot, if one exists
    ///
    /// # Errors
    /// Returns [`WizardError::Unknown`] when the stored snapshot cannot be
    /// read back.
    pub fn resume(&self) -> Result<bool, WizardError> {
        let snapshot = match self.slices.read_slice(SNAPSHOT_SLICE) {
            None | Some(Value::Null) => return Ok(false),
            Some(value) => serde_json::from_value::<WizardState>(value)
                .map_err(|e| WizardError::Unknown(format!("snapshot unreadable: {e}")))?,
        };
        self.resume_from(snapshot);
        Ok(true)
    }

    /// Resume an explicit snapshot
    pub fn resume_from(&self, snapshot: WizardState) -> WizardState {
        self.families.cancel_all();
        let state = self.commit(Intent::Hydrate(Box::new(snapshot)));
        tracing::info!(session = %state.session_id, step = %state.step, "Session resumed");
        state
    }
}

fn wants_pricing(state: &WizardState) -> bool {
    if !state.profile_complete || !state.industry.is_resolved() {
        return false;
    }
    let key = state.pricing_inputs().request_key();
    let same_key = state.pricing.request_key.as_ref() == Some(&key);
    if state.is_pricing_pending() && same_key {
        return false;
    }
    !state
        .quote
        .as_ref()
        .is_some_and(|q| q.pricing_complete && q.request_key == key)
}

fn profile_error(state: &WizardState) -> WizardError {
    let decision = gate::can_proceed(state, WizardStep::Profile);
    if decision.ok {
        WizardError::Validation(format!(
            "missing required answers: {}",
            state.missing_required().join(", ")
        ))
    } else {
        WizardError::State {
            reason: decision.reason.unwrap_or_default(),
            route_to: gate::earliest_unmet(state, WizardStep::Profile),
        }
    }
}
