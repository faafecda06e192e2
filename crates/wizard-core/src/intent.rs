//! Intents accepted by the reducer
//!
//! Every operator action and every side-effect result enters the state
//! machine as an [`Intent`]. Intents carry their own timestamps and fresh
//! identifiers so the reducer stays a pure function of its inputs.

use crate::answers::{AnswerPatch, ProvenanceSource};
use crate::defaults::DefaultsScope;
use crate::error::ErrorRecord;
use crate::intel::{IntelField, IntelValue};
use crate::quote::{PricingFailure, QuoteOutput, RequestKey};
use crate::state::WizardState;
use crate::template::QuestionTemplate;
use crate::types::{AddOnConfig, BusinessCard, IndustrySlug, LocationRecord, SessionId, WizardStep};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Reducer input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    /// Reinitialize everything except telemetry
    Reset {
        /// Identifier of the new session
        session_id: SessionId,
    },
    /// Resume a persisted snapshot
    Hydrate(Box<WizardState>),
    /// Navigate to a step
    SetStep(WizardStep),
    /// Raw location text changed
    SetLocationInput(String),
    /// Location resolved or synthesized
    SetLocation(LocationRecord),
    /// Location stage completion
    ConfirmLocation(bool),
    /// Enrichment lookup started
    IntelFetching {
        /// ZIP the lookup is for
        zip: String,
        /// Slot
        field: IntelField,
    },
    /// Enrichment lookup settled with a value
    IntelReady {
        /// ZIP the lookup is for
        zip: String,
        /// Settled value
        value: IntelValue,
        /// Settlement time
        at: DateTime<Utc>,
    },
    /// Enrichment lookup failed
    IntelFailed {
        /// ZIP the lookup is for
        zip: String,
        /// Slot
        field: IntelField,
        /// Failure message
        message: String,
    },
    /// Business detection result
    SetBusiness {
        /// Detected business, `None` to clear
        card: Option<BusinessCard>,
        /// Detection time
        at: DateTime<Utc>,
    },
    /// Assign industry
    SetIndustry {
        /// Industry slug
        slug: IndustrySlug,
        /// Inferred and locked
        locked: bool,
    },
    /// Template loaded
    SetTemplate(Arc<QuestionTemplate>),
    /// Seed baseline defaults from the loaded template
    SeedDefaults {
        /// Write time
        at: DateTime<Utc>,
    },
    /// Operator edit
    SetAnswer {
        /// Question id
        key: String,
        /// New value
        value: Value,
        /// Write time
        at: DateTime<Utc>,
    },
    /// Replace every answer
    SetAnswers {
        /// New answers
        answers: AnswerPatch,
        /// Source stamped on every key
        source: ProvenanceSource,
        /// Write time
        at: DateTime<Utc>,
    },
    /// Merge without clobbering operator edits
    PatchAnswers {
        /// Values to merge
        patch: AnswerPatch,
        /// Source of the values
        source: ProvenanceSource,
        /// Write time
        at: DateTime<Utc>,
    },
    /// Rewrite answers in scope from recomputed defaults
    ResetToDefaults {
        /// Whole form or one part
        scope: DefaultsScope,
        /// Write time
        at: DateTime<Utc>,
    },
    /// Merge one part's defaults and mark it applied
    ApplyPartDefaults {
        /// Part id
        part_id: String,
        /// Write time
        at: DateTime<Utc>,
    },
    /// Move the profile cursor
    SetPartIndex(usize),
    /// Next profile part
    NextPart,
    /// Previous profile part
    PrevPart,
    /// Mark the profile stage complete
    CompleteProfile,
    /// Add-on configuration changed
    SetAddOns(AddOnConfig),
    /// Add-on stage complete
    ConfirmAddOns,
    /// Pricing run started
    PricingStart {
        /// Key of the new run
        request_key: RequestKey,
    },
    /// Pricing run produced a quote
    PricingSuccess {
        /// Key of the run
        request_key: RequestKey,
        /// Merged quote
        quote: Box<QuoteOutput>,
    },
    /// Pricing run failed
    PricingError {
        /// Key of the run
        request_key: RequestKey,
        /// Failure
        failure: PricingFailure,
    },
    /// Operator asked for a new run
    PricingRetry,
    /// Show an error
    SetError(ErrorRecord),
    /// Clear the error
    ClearError,
    /// Busy label
    SetBusy(Option<String>),
    /// Unrecognized intent; ignored
    #[serde(other)]
    Unknown,
}

impl Intent {
    /// Fresh reset
    #[must_use]
    pub fn reset() -> Self {
        Intent::Reset {
            session_id: SessionId::new(),
        }
    }

    /// Operator edit stamped now
    #[must_use]
    pub fn user_edit(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Intent::SetAnswer {
            key: key.into(),
            value: value.into(),
            at: Utc::now(),
        }
    }

    /// Non-clobbering patch stamped now
    #[must_use]
    pub fn patch(patch: AnswerPatch, source: ProvenanceSource) -> Self {
        Intent::PatchAnswers {
            patch,
            source,
            at: Utc::now(),
        }
    }

    /// Seed defaults stamped now
    #[must_use]
    pub fn seed_defaults() -> Self {
        Intent::SeedDefaults { at: Utc::now() }
    }

    /// Reset to defaults stamped now
    #[must_use]
    pub fn reset_to_defaults(scope: DefaultsScope) -> Self {
        Intent::ResetToDefaults {
            scope,
            at: Utc::now(),
        }
    }

    /// Apply part defaults stamped now
    #[must_use]
    pub fn apply_part_defaults(part_id: impl Into<String>) -> Self {
        Intent::ApplyPartDefaults {
            part_id: part_id.into(),
            at: Utc::now(),
        }
    }

    /// Business detection result stamped now
    #[must_use]
    pub fn business(card: Option<BusinessCard>) -> Self {
        Intent::SetBusiness {
            card,
            at: Utc::now(),
        }
    }

    /// Enrichment value stamped now
    #[must_use]
    pub fn intel_ready(zip: impl Into<String>, value: IntelValue) -> Self {
        Intent::IntelReady {
            zip: zip.into(),
            value,
            at: Utc::now(),
        }
    }

    /// Name used in logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Intent::Reset { .. } => "RESET",
            Intent::Hydrate(_) => "HYDRATE",
            Intent::SetStep(_) => "SET_STEP",
            Intent::SetLocationInput(_) => "SET_LOCATION_INPUT",
            Intent::SetLocation(_) => "SET_LOCATION",
            Intent::ConfirmLocation(_) => "CONFIRM_LOCATION",
            Intent::IntelFetching { .. } => "INTEL_FETCHING",
            Intent::IntelReady { .. } => "INTEL_READY",
            Intent::IntelFailed { .. } => "INTEL_FAILED",
            Intent::SetBusiness { .. } => "SET_BUSINESS",
            Intent::SetIndustry { .. } => "SET_INDUSTRY",
            Intent::SetTemplate(_) => "SET_TEMPLATE",
            Intent::SeedDefaults { .. } => "SEED_DEFAULTS",
            Intent::SetAnswer { .. } => "SET_ANSWER",
            Intent::SetAnswers { .. } => "SET_ANSWERS",
            Intent::PatchAnswers { .. } => "PATCH_ANSWERS",
            Intent::ResetToDefaults { .. } => "RESET_TO_DEFAULTS",
            Intent::ApplyPartDefaults { .. } => "APPLY_PART_DEFAULTS",
            Intent::SetPartIndex(_) => "SET_PART_INDEX",
            Intent::NextPart => "NEXT_PART",
            Intent::PrevPart => "PREV_PART",
            Intent::CompleteProfile => "COMPLETE_PROFILE",
            Intent::SetAddOns(_) => "SET_ADD_ONS",
            Intent::ConfirmAddOns => "CONFIRM_ADD_ONS",
            Intent::PricingStart { .. } => "PRICING_START",
            Intent::PricingSuccess { .. } => "PRICING_SUCCESS",
            Intent::PricingError { .. } => "PRICING_ERROR",
            Intent::PricingRetry => "PRICING_RETRY",
            Intent::SetError(_) => "SET_ERROR",
            Intent::ClearError => "CLEAR_ERROR",
            Intent::SetBusy(_) => "SET_BUSY",
            Intent::Unknown => "UNKNOWN",
        }
    }
}

/// Receiver of intents produced by asynchronous work
pub trait IntentSink: Send + Sync {
    /// Deliver one intent
    fn dispatch(&self, intent: Intent);
}

impl<F> IntentSink for F
where
    F: Fn(Intent) + Send + Sync,
{
    fn dispatch(&self, intent: Intent) {
        self(intent);
    }
}
