//! External collaborator seams
//!
//! The session never talks to a geocoder, tariff database, template service
//! or CRM directly. Each is injected behind one of these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wizard_core::geo;
use wizard_core::{
    AnswerPatch, IndustrySlug, LocationRecord, QuestionTemplate, SessionId, SolarResource,
    UtilityRate, WeatherProfile, WizardError,
};

/// Turns free-form location input into a location record
#[async_trait]
pub trait LocationResolver: Send + Sync {
    /// Resolve `input`; `Ok(None)` when nothing matched
    async fn resolve_location(
        &self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<LocationRecord>, WizardError>;
}

/// Location enrichment lookups, each independent of the others
#[async_trait]
pub trait IntelProvider: Send + Sync {
    /// Utility tariff for a ZIP
    async fn fetch_utility_rate(&self, zip: &str) -> Result<UtilityRate, WizardError>;

    /// Solar resource for a ZIP
    async fn fetch_solar_resource(&self, zip: &str) -> Result<SolarResource, WizardError>;

    /// Climate summary for a ZIP
    async fn fetch_weather_profile(&self, zip: &str) -> Result<WeatherProfile, WizardError>;
}

/// Loads the question template of an industry
///
/// Implementations report schema violations as [`WizardError::Template`];
/// the session treats any other failure as transient and falls back to the
/// generic template.
#[async_trait]
pub trait TemplateLoader: Send + Sync {
    /// Load the template for `industry`
    async fn load_template(
        &self,
        industry: &IndustrySlug,
        cancel: &CancellationToken,
    ) -> Result<QuestionTemplate, WizardError>;
}

/// Profile sent to a CRM, in progress or once the profile stage completes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSubmission {
    /// Session the profile belongs to
    pub session_id: SessionId,
    /// Assigned industry
    pub industry: IndustrySlug,
    /// Normalized ZIP
    pub zip: Option<String>,
    /// Every answered question
    pub answers: AnswerPatch,
    /// Sent before the profile stage completed
    #[serde(default)]
    pub partial: bool,
}

/// Receives completed profiles; failures never block the wizard
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileSubmitter: Send + Sync {
    /// Submit one profile
    async fn submit(&self, submission: &ProfileSubmission) -> Result<(), WizardError>;
}

/// Resolver that only understands ZIP codes
///
/// Produces the same synthesized record the session builds for a bare ZIP.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipOnlyResolver;

#[async_trait]
impl LocationResolver for ZipOnlyResolver {
    async fn resolve_location(
        &self,
        input: &str,
        _cancel: &CancellationToken,
    ) -> Result<Option<LocationRecord>, WizardError> {
        Ok(geo::minimal_location(input))
    }
}

/// Provider answering every ZIP with the same values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixedIntel {
    /// Utility tariff
    pub utility: UtilityRate,
    /// Solar resource
    pub solar: SolarResource,
    /// Climate summary
    pub weather: WeatherProfile,
}

#[async_trait]
impl IntelProvider for FixedIntel {
    async fn fetch_utility_rate(&self, _zip: &str) -> Result<UtilityRate, WizardError> {
        Ok(self.utility.clone())
    }

    async fn fetch_solar_resource(&self, _zip: &str) -> Result<SolarResource, WizardError> {
        Ok(self.solar.clone())
    }

    async fn fetch_weather_profile(&self, _zip: &str) -> Result<WeatherProfile, WizardError> {
        Ok(self.weather.clone())
    }
}

/// Every collaborator a session needs
#[derive(Clone)]
pub struct Collaborators {
    /// Location resolution
    pub location: Arc<dyn LocationResolver>,
    /// Location enrichment
    pub intel: Arc<dyn IntelProvider>,
    /// Template loading
    pub templates: Arc<dyn TemplateLoader>,
    /// Optional profile submission
    pub submitter: Option<Arc<dyn ProfileSubmitter>>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("submitter", &self.submitter.is_some())
            .finish_non_exhaustive()
    }
}

impl Collaborators {
    /// Create without a submitter
    #[must_use]
    pub fn new(
        location: Arc<dyn LocationResolver>,
        intel: Arc<dyn IntelProvider>,
        templates: Arc<dyn TemplateLoader>,
    ) -> Self {
        Self {
            location,
            intel,
            templates,
            submitter: None,
        }
    }

    /// With profile submitter
    #[inline]
    #[must_use]
    pub fn with_submitter(mut self, submitter: Arc<dyn ProfileSubmitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }
}
