//! Testing utilities for the wizard workspace
//!
//! Shared fixtures, fake pricing layers and fake collaborators.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wizard_core::geo;
use wizard_core::{
    apply, IndustrySlug, Intent, IntentSink, LocationRecord, Question,
    QuestionTemplate, SolarResource, TemplatePart, UtilityRate, WeatherProfile, WizardError,
    WizardState, WizardStep,
};
use wizard_pricing::{
    FinancialLayer, FinancialRequest, LayerError, PhysicalLayer, PhysicalOutput, PricingRequest,
    ReferenceFinancialModel, ReferenceLoadModel,
};
pub use wizard_runtime::InMemorySliceStore;
use wizard_runtime::{
    Collaborators, IntelProvider, LocationResolver, ProfileSubmission,
    ProfileSubmitter, SessionConfig, TemplateLoader, WizardSession,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0)
        .single()
        .unwrap()
}

pub fn hotel_template() -> QuestionTemplate {
    let facility = TemplatePart {
        id: "facility".to_string(),
        title: "Facility".to_string(),
        questions: vec![
            Question::number("roomCount", "Number of rooms", Some("rooms"))
                .with_default(150)
                .required(),
            Question::number("facilitySize", "Facility size (sq ft)", Some("sq ft"))
                .with_default(80_000),
            Question::number("operatingHours", "Daily operating hours", Some("hours"))
                .with_default(24)
                .required(),
            Question::select(
                "gridConnection",
                "Grid connection quality",
                &[
                    ("reliable", "Reliable Grid"),
                    ("unreliable", "Unreliable Grid"),
                    ("off_grid", "Off-Grid"),
                ],
            )
            .with_default("reliable"),
        ],
    };
    let energy = TemplatePart {
        id: "energy".to_string(),
        title: "Energy costs".to_string(),
        questions: vec![
            Question::number("electricityRate", "Electricity rate", Some("$/kWh")),
            Question::number("demandCharge", "Demand charge", Some("$/kW")).with_default(15),
            Question::number("peakSunHours", "Peak sun hours", Some("h/day")),
        ],
    };
    QuestionTemplate {
        industry: IndustrySlug::new("hotel"),
        version: "test".to_string(),
        parts: vec![facility, energy],
        defaults: BTreeMap::from([("facilitySize".to_string(), json!(100_000))]),
        fallback: false,
    }
}

pub fn sf_location() -> LocationRecord {
    geo::minimal_location("94105").unwrap()
}

/// State on the profile step with the hotel template seeded
pub fn state_at_profile() -> WizardState {
    [
        Intent::SetLocationInput("94105".to_string()),
        Intent::SetLocation(sf_location()),
        Intent::ConfirmLocation(true),
        Intent::SetIndustry {
            slug: IndustrySlug::new("hotel"),
            locked: false,
        },
        Intent::SetTemplate(Arc::new(hotel_template())),
        Intent::SeedDefaults { at: at(0) },
        Intent::SetStep(WizardStep::Industry),
        Intent::SetStep(WizardStep::Profile),
    ]
    .into_iter()
    .fold(WizardState::default(), |state, intent| apply(&state, intent))
}

/// Profile-complete state with an electricity rate answered
pub fn state_ready_to_price() -> WizardState {
    let state = apply(
        &state_at_profile(),
        Intent::SetAnswer {
            key: "electricityRate".to_string(),
            value: json!(0.2),
            at: at(1),
        },
    );
    apply(&state, Intent::CompleteProfile)
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RecordingSink {
    intents: Mutex<Vec<Intent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intents(&self) -> Vec<Intent> {
        self.intents.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.intents.lock().iter().map(Intent::name).collect()
    }

    /// Fold every recorded intent over `state`
    pub fn replay(&self, state: &WizardState) -> WizardState {
        self.intents()
            .into_iter()
            .fold(state.clone(), |state, intent| apply(&state, intent))
    }
}

impl IntentSink for RecordingSink {
    fn dispatch(&self, intent: Intent) {
        self.intents.lock().push(intent);
    }
}

// ---------------------------------------------------------------------------
// Pricing layers
// ---------------------------------------------------------------------------

/// Reference load model after an optional delay
#[derive(Debug, Default)]
pub struct SlowPhysical {
    pub delay: Duration,
}

#[async_trait]
impl PhysicalLayer for SlowPhysical {
    async fn compute_load_profile(&self, request: &PricingRequest) -> Result<PhysicalOutput, LayerError> {
        tokio::time::sleep(self.delay).await;
        ReferenceLoadModel::compute(request)
    }
}

#[derive(Debug)]
pub struct HangingPhysical;

#[async_trait]
impl PhysicalLayer for HangingPhysical {
    async fn compute_load_profile(&self, _: &PricingRequest) -> Result<PhysicalOutput, LayerError> {
        std::future::pending().await
    }
}

#[derive(Debug)]
pub struct FailingFinancial(pub LayerError);

#[async_trait]
impl FinancialLayer for FailingFinancial {
    async fn compute_financials(
        &self,
        _: &FinancialRequest,
    ) -> Result<wizard_core::FinancialBreakdown, LayerError> {
        Err(self.0.clone())
    }
}

/// Fails with `Unavailable` for the first `failures` calls
#[derive(Debug, Default)]
pub struct FlakyFinancial {
    failures: u32,
    calls: AtomicU32,
    model: ReferenceFinancialModel,
}

impl FlakyFinancial {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FinancialLayer for FlakyFinancial {
    async fn compute_financials(
        &self,
        request: &FinancialRequest,
    ) -> Result<wizard_core::FinancialBreakdown, LayerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(LayerError::Unavailable(format!("tariff service busy (call {})", call + 1)))
        } else {
            self.model.compute(request)
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Geocoder that never finds an address
#[derive(Debug)]
pub struct NoAddressResolver;

#[async_trait]
impl LocationResolver for NoAddressResolver {
    async fn resolve_location(
        &self,
        _input: &str,
        _cancel: &CancellationToken,
    ) -> Result<Option<LocationRecord>, WizardError> {
        Ok(None)
    }
}

/// Geocoder returning an address without postal code or region
#[derive(Debug)]
pub struct AddressOnlyResolver;

#[async_trait]
impl LocationResolver for AddressOnlyResolver {
    async fn resolve_location(
        &self,
        input: &str,
        _cancel: &CancellationToken,
    ) -> Result<Option<LocationRecord>, WizardError> {
        Ok(Some(LocationRecord {
            formatted_address: Some(input.to_string()),
            ..LocationRecord::default()
        }))
    }
}

/// Enrichment with per-slot results and an optional delay
#[derive(Debug, Clone)]
pub struct ScriptedIntel {
    pub utility: Result<UtilityRate, WizardError>,
    pub solar: Result<SolarResource, WizardError>,
    pub weather: Result<WeatherProfile, WizardError>,
    pub delay: Duration,
}

impl Default for ScriptedIntel {
    fn default() -> Self {
        Self {
            utility: Ok(UtilityRate::default()),
            solar: Ok(SolarResource::default()),
            weather: Ok(WeatherProfile::default()),
            delay: Duration::ZERO,
        }
    }
}

impl ScriptedIntel {
    pub fn with_rate(rate: f64) -> Self {
        Self {
            utility: Ok(UtilityRate {
                utility_name: Some("Pacific Test & Electric".to_string()),
                rate_per_kwh: Some(rate),
                demand_charge_per_kw: Some(20.0),
            }),
            ..Self::default()
        }
    }

    pub fn failing_solar(mut self) -> Self {
        self.solar = Err(WizardError::Network("solar service unreachable".to_string()));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl IntelProvider for ScriptedIntel {
    async fn fetch_utility_rate(&self, _zip: &str) -> Result<UtilityRate, WizardError> {
        tokio::time::sleep(self.delay).await;
        self.utility.clone()
    }

    async fn fetch_solar_resource(&self, _zip: &str) -> Result<SolarResource, WizardError> {
        tokio::time::sleep(self.delay).await;
        self.solar.clone()
    }

    async fn fetch_weather_profile(&self, _zip: &str) -> Result<WeatherProfile, WizardError> {
        tokio::time::sleep(self.delay).await;
        self.weather.clone()
    }
}

/// Loader returning a fixed template or error
#[derive(Debug, Clone)]
pub struct StaticTemplates(pub Result<QuestionTemplate, WizardError>);

#[async_trait]
impl TemplateLoader for StaticTemplates {
    async fn load_template(
        &self,
        _industry: &IndustrySlug,
        _cancel: &CancellationToken,
    ) -> Result<QuestionTemplate, WizardError> {
        self.0.clone()
    }
}

/// Loader returning the hotel template after a delay
#[derive(Debug)]
pub struct DelayedTemplates {
    pub delay: Duration,
}

#[async_trait]
impl TemplateLoader for DelayedTemplates {
    async fn load_template(
        &self,
        _industry: &IndustrySlug,
        _cancel: &CancellationToken,
    ) -> Result<QuestionTemplate, WizardError> {
        tokio::time::sleep(self.delay).await;
        Ok(hotel_template())
    }
}

#[derive(Debug, Default)]
pub struct RecordingSubmitter {
    submissions: Mutex<Vec<ProfileSubmission>>,
}

impl RecordingSubmitter {
    pub fn submissions(&self) -> Vec<ProfileSubmission> {
        self.submissions.lock().clone()
    }
}

#[async_trait]
impl ProfileSubmitter for RecordingSubmitter {
    async fn submit(&self, submission: &ProfileSubmission) -> Result<(), WizardError> {
        self.submissions.lock().push(submission.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

pub fn collaborators(intel: ScriptedIntel) -> Collaborators {
    Collaborators::new(
        Arc::new(NoAddressResolver),
        Arc::new(intel),
        Arc::new(StaticTemplates(Ok(hotel_template()))),
    )
}

/// Session over the reference layers with an in-memory slice store
pub fn setup_test_session(
    collaborators: Collaborators,
    financial: Arc<dyn FinancialLayer>,
) -> (Arc<WizardSession>, Arc<InMemorySliceStore>) {
    let slices = Arc::new(InMemorySliceStore::new());
    let session = WizardSession::new(
        collaborators,
        Arc::new(ReferenceLoadModel),
        financial,
        slices.clone(),
        SessionConfig::default(),
    );
    (session, slices)
}
