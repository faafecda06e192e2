//! Quote output, pricing freeze and request keys
//!
//! A quote always carries the load profile once the physical layer ran. The
//! financial breakdown is one optional group, so a failed financial layer
//! leaves no partial subset behind and `pricing_complete` stays `false`.

use crate::confidence::ConfidenceRecord;
use crate::types::{AddOnConfig, IndustrySlug};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Physical-layer load profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadProfile {
    /// Continuous base load
    #[serde(rename = "baseLoadKW", alias = "baseLoadKw")]
    pub base_load_kw: f64,
    /// Peak demand
    #[serde(rename = "peakLoadKW", alias = "peakLoadKw")]
    pub peak_load_kw: f64,
    /// Energy consumed per day
    pub daily_energy_kwh: f64,
}

/// Storage sizing suggested by the physical layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizingHints {
    /// Storage power rating
    pub storage_kw: f64,
    /// Storage duration
    pub duration_hours: f64,
    /// Storage energy capacity (power x duration)
    pub storage_kwh: f64,
}

impl SizingHints {
    /// Create hints with energy derived from power and duration
    #[inline]
    #[must_use]
    pub fn new(storage_kw: f64, duration_hours: f64) -> Self {
        Self {
            storage_kw,
            duration_hours,
            storage_kwh: storage_kw * duration_hours,
        }
    }
}

/// Financial-layer breakdown; present as a whole or not at all
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialBreakdown {
    /// Equipment cost
    pub equipment_cost: f64,
    /// Installation cost
    pub installation_cost: f64,
    /// Equipment + installation
    pub total_cost: f64,
    /// Investment tax credit
    pub tax_credit: f64,
    /// Total cost after incentives
    pub net_cost: f64,
    /// Yearly savings
    pub annual_savings: f64,
    /// Simple payback period
    pub payback_years: f64,
}

/// Immutable snapshot of the inputs of one pricing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingFreeze {
    /// Storage power
    pub power_kw: f64,
    /// Storage duration
    pub duration_hours: f64,
    /// Storage energy
    pub energy_kwh: f64,
    /// Solar add-on capacity
    pub solar_kw: f64,
    /// Generator add-on capacity
    pub generator_kw: f64,
    /// EV charging capacity
    pub ev_kw: f64,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl PricingFreeze {
    /// Freeze sizing and add-ons at `at`
    #[must_use]
    pub fn capture(sizing: &SizingHints, add_ons: &AddOnConfig, at: DateTime<Utc>) -> Self {
        Self {
            power_kw: sizing.storage_kw,
            duration_hours: sizing.duration_hours,
            energy_kwh: sizing.storage_kwh,
            solar_kw: add_ons.solar_kw.unwrap_or(0.0),
            generator_kw: add_ons.generator_kw.unwrap_or(0.0),
            ev_kw: add_ons.ev_chargers.map_or(0.0, |ev| ev.total_kw()),
            created_at: at,
        }
    }
}

/// Merged pricing result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteOutput {
    /// Run that produced this quote
    pub request_key: RequestKey,
    /// Load profile fields
    #[serde(flatten)]
    pub load_profile: LoadProfile,
    /// Sizing hints
    pub sizing: SizingHints,
    /// Financial group
    pub financials: Option<FinancialBreakdown>,
    /// Financial group present
    pub pricing_complete: bool,
    /// Confidence over the answers used
    pub confidence: ConfidenceRecord,
    /// Informational notes
    #[serde(default)]
    pub notes: Vec<String>,
    /// Degradations and sanity findings
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Inputs of this run
    pub freeze: PricingFreeze,
}

impl QuoteOutput {
    /// Quote with load-profile fields only
    #[must_use]
    pub fn physical_only(
        request_key: RequestKey,
        load_profile: LoadProfile,
        sizing: SizingHints,
        freeze: PricingFreeze,
        confidence: ConfidenceRecord,
    ) -> Self {
        Self {
            request_key,
            load_profile,
            sizing,
            financials: None,
            pricing_complete: false,
            confidence,
            notes: Vec::new(),
            warnings: Vec::new(),
            freeze,
        }
    }

    /// With the complete financial group
    #[inline]
    #[must_use]
    pub fn with_financials(mut self, financials: FinancialBreakdown) -> Self {
        self.financials = Some(financials);
        self.pricing_complete = true;
        self
    }

    /// With a warning
    #[inline]
    #[must_use]
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// With a note
    #[inline]
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

/// Pricing-relevant inputs of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingInputs {
    /// Assigned industry
    pub industry: IndustrySlug,
    /// Normalized ZIP
    pub zip: Option<String>,
    /// Region code
    pub region: Option<String>,
    /// Answers of pricing-input questions
    pub answers: BTreeMap<String, Value>,
    /// Add-on configuration
    pub add_ons: AddOnConfig,
}

impl PricingInputs {
    /// Derive the request key of these inputs
    #[inline]
    #[must_use]
    pub fn request_key(&self) -> RequestKey {
        RequestKey::derive(self)
    }
}

/// Deterministic digest of pricing inputs; identifies one pricing run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestKey(String);

impl RequestKey {
    /// Hex characters kept from the digest
    pub const LEN: usize = 16;

    /// Digest canonical JSON of the inputs
    #[must_use]
    pub fn derive(inputs: &PricingInputs) -> Self {
        // Maps are BTreeMaps so key order is canonical.
        let document = serde_json::to_vec(inputs).unwrap_or_default();
        let digest = Sha256::digest(&document);
        let mut hex = hex::encode(digest);
        hex.truncate(Self::LEN);
        Self(hex)
    }

    /// Wrap an existing key
    #[inline]
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Get as string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a pricing run produced no quote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingFailureKind {
    /// Physical layer failed; nothing to show
    PhysicalLayer,
    /// Hard deadline passed
    TimedOut,
    /// Run was superseded
    Aborted,
    /// Inputs insufficient to start
    MissingInputs,
}

/// Failure carried by a pricing error intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingFailure {
    /// Failure classification
    pub kind: PricingFailureKind,
    /// Display message
    pub message: String,
}

impl PricingFailure {
    /// Create new failure
    #[inline]
    #[must_use]
    pub fn new(kind: PricingFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Deadline failure
    #[must_use]
    pub fn timed_out(after_ms: u64) -> Self {
        Self::new(
            PricingFailureKind::TimedOut,
            format!("pricing timed out after {after_ms}ms"),
        )
    }
}
