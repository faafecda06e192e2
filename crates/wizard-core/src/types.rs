//! Core types for the wizard
//!
//! Defines the fundamental value types shared by the reducer, the gates and
//! the pricing pipeline:
//! - Session identifiers and the fixed step enumeration
//! - Location, business and industry records
//! - Add-on configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ulid::Ulid;

/// Unique session identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Ulid);

impl SessionId {
    /// Generate new session ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wizard steps, in presentation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WizardStep {
    /// ZIP / address entry
    Location,
    /// Industry selection
    Industry,
    /// Facility profile questionnaire
    Profile,
    /// Add-on options (solar, generator, EV)
    Options,
    /// Automatic system fit
    #[serde(rename = "magicfit")]
    MagicFit,
    /// Priced recommendation
    Results,
}

impl WizardStep {
    /// All steps in order
    pub const ALL: [WizardStep; 6] = [
        WizardStep::Location,
        WizardStep::Industry,
        WizardStep::Profile,
        WizardStep::Options,
        WizardStep::MagicFit,
        WizardStep::Results,
    ];

    /// Zero-based position
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            WizardStep::Location => 0,
            WizardStep::Industry => 1,
            WizardStep::Profile => 2,
            WizardStep::Options => 3,
            WizardStep::MagicFit => 4,
            WizardStep::Results => 5,
        }
    }

    /// Step name as used in routes and logs
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WizardStep::Location => "location",
            WizardStep::Industry => "industry",
            WizardStep::Profile => "profile",
            WizardStep::Options => "options",
            WizardStep::MagicFit => "magicfit",
            WizardStep::Results => "results",
        }
    }

    /// Following step, if any
    #[inline]
    #[must_use]
    pub fn next(self) -> Option<WizardStep> {
        WizardStep::ALL.get(self.index() + 1).copied()
    }

    /// Preceding step, if any
    #[inline]
    #[must_use]
    pub fn prev(self) -> Option<WizardStep> {
        self.index().checked_sub(1).map(|i| WizardStep::ALL[i])
    }
}

impl Default for WizardStep {
    fn default() -> Self {
        WizardStep::Location
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Industry slug (`"auto"` is the unresolved sentinel)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndustrySlug(String);

impl IndustrySlug {
    /// Sentinel for "not yet assigned"
    pub const UNRESOLVED: &'static str = "auto";

    /// Create slug
    #[inline]
    #[must_use]
    pub fn new(slug: impl Into<String>) -> Self {
        let slug: String = slug.into();
        let slug = slug.trim().to_ascii_lowercase();
        if slug.is_empty() {
            Self::unresolved()
        } else {
            Self(slug)
        }
    }

    /// The unresolved sentinel
    #[inline]
    #[must_use]
    pub fn unresolved() -> Self {
        Self(Self::UNRESOLVED.to_string())
    }

    /// Check if an industry has been assigned
    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.0 != Self::UNRESOLVED
    }

    /// Slug text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for IndustrySlug {
    fn default() -> Self {
        Self::unresolved()
    }
}

impl std::fmt::Display for IndustrySlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolved (or synthesized) location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    /// Normalized five-digit ZIP
    pub postal_code: Option<String>,
    /// Two-letter state / region code
    pub region: Option<String>,
    /// City name
    pub city: Option<String>,
    /// Geocoded address line
    pub formatted_address: Option<String>,
    /// Latitude
    pub lat: Option<f64>,
    /// Longitude
    pub lon: Option<f64>,
    /// Built locally from a bare ZIP without geocoding
    #[serde(default)]
    pub synthesized: bool,
}

impl LocationRecord {
    /// Check if a non-empty address string was resolved
    #[inline]
    #[must_use]
    pub fn has_address(&self) -> bool {
        self.formatted_address
            .as_deref()
            .is_some_and(|a| !a.trim().is_empty())
    }
}

/// Business detected from a name/address lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessCard {
    /// Business name
    pub name: String,
    /// Business address
    pub address: Option<String>,
    /// Industry inferred by the detector
    pub inferred_industry: Option<IndustrySlug>,
    /// Inference confidence (0.0 - 1.0)
    pub confidence: f64,
    /// Answer values suggested by the detector (question id -> value)
    #[serde(default)]
    pub answer_hints: BTreeMap<String, serde_json::Value>,
}

/// EV charger add-on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvChargers {
    /// Number of chargers
    pub count: u32,
    /// Rated power per charger
    pub kw_each: f64,
}

impl EvChargers {
    /// Total charger power
    #[inline]
    #[must_use]
    pub fn total_kw(&self) -> f64 {
        f64::from(self.count) * self.kw_each
    }
}

/// Add-on configuration chosen on the options step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOnConfig {
    /// Solar array capacity
    pub solar_kw: Option<f64>,
    /// Backup generator capacity
    pub generator_kw: Option<f64>,
    /// EV charging
    pub ev_chargers: Option<EvChargers>,
}

impl AddOnConfig {
    /// With solar array
    #[inline]
    #[must_use]
    pub fn with_solar(mut self, kw: f64) -> Self {
        self.solar_kw = Some(kw);
        self
    }

    /// With generator
    #[inline]
    #[must_use]
    pub fn with_generator(mut self, kw: f64) -> Self {
        self.generator_kw = Some(kw);
        self
    }

    /// With EV chargers
    #[inline]
    #[must_use]
    pub fn with_ev_chargers(mut self, count: u32, kw_each: f64) -> Self {
        self.ev_chargers = Some(EvChargers { count, kw_each });
        self
    }
}

/// Analytics counters owned by an external collaborator; survive reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Telemetry {
    /// Number of resets in this page session
    pub resets: u32,
    /// Number of pricing runs started
    pub pricing_runs: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_generation() {
        let id1 = SessionId::new();
        let id2 = SessionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn step_order() {
        assert_eq!(WizardStep::Location.index(), 0);
        assert_eq!(WizardStep::Results.index(), 5);
        assert_eq!(WizardStep::Profile.next(), Some(WizardStep::Options));
        assert_eq!(WizardStep::Location.prev(), None);
        assert!(WizardStep::Industry < WizardStep::MagicFit);
    }

    #[test]
    fn step_serializes_lowercase() {
        let json = serde_json::to_string(&WizardStep::MagicFit).unwrap();
        assert_eq!(json, "\"magicfit\"");
    }

    #[test]
    fn industry_slug_sentinel() {
        assert!(!IndustrySlug::default().is_resolved());
        assert!(!IndustrySlug::new("  ").is_resolved());
        assert!(IndustrySlug::new("Hotel").is_resolved());
        assert_eq!(IndustrySlug::new("Hotel").as_str(), "hotel");
    }

    #[test]
    fn add_on_builder() {
        let addons = AddOnConfig::default()
            .with_solar(100.0)
            .with_ev_chargers(4, 19.2);
        assert_eq!(addons.solar_kw, Some(100.0));
        assert!((addons.ev_chargers.unwrap().total_kw() - 76.8).abs() < 1e-9);
    }
}
