//! Wizard Core - step machine, gates and provenance-aware answers
//!
//! The pure heart of the configuration wizard:
//! - Applies intents to immutable state snapshots
//! - Gates forward navigation with independent per-step predicates
//! - Tracks who supplied every answer so enrichment never clobbers edits
//! - Scores confidence over answer provenance
//! - Derives pricing request keys
//!
//! # Example
//!
//! ```rust
//! use wizard_core::prelude::*;
//!
//! let state = WizardState::default();
//! let state = apply(&state, Intent::SetLocationInput("94105".into()));
//! assert!(can_proceed(&state, WizardStep::Industry).ok);
//! ```

#![warn(unreachable_pub)]

pub mod answers;
pub mod confidence;
pub mod defaults;
pub mod error;
pub mod gate;
pub mod geo;
pub mod intel;
pub mod intent;
pub mod machine;
pub mod memory;
pub mod quote;
pub mod state;
pub mod template;
pub mod types;

// Re-exports for convenience
pub use answers::{AnswerPatch, AnswerStore, PatchOutcome, ProvenanceEntry, ProvenanceSource};
pub use confidence::{score as score_confidence, ConfidenceRecord};
pub use defaults::{DefaultsContext, DefaultsScope};
pub use error::{ErrorKind, ErrorRecord, TemplateError, WizardError};
pub use gate::{can_proceed, earliest_unmet, gates, is_satisfied, progress, GateDecision, Gates, Progress};
pub use intel::{
    FetchStatus, IntelField, IntelSlot, IntelValue, LocationIntel, SolarResource, UtilityRate,
    WeatherProfile,
};
pub use intent::{Intent, IntentSink};
pub use machine::apply;
pub use memory::{SliceError, SliceStore};
pub use quote::{
    FinancialBreakdown, LoadProfile, PricingFailure, PricingFailureKind, PricingFreeze,
    PricingInputs, QuoteOutput, RequestKey, SizingHints,
};
pub use state::{PricingState, PricingStatus, WizardState};
pub use template::{Question, QuestionKind, QuestionTemplate, SelectOption, TemplatePart};
pub use types::{
    AddOnConfig, BusinessCard, EvChargers, IndustrySlug, LocationRecord, SessionId, Telemetry,
    WizardStep,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the wizard core
    pub use crate::{
        apply, can_proceed, AnswerStore, Intent, IntentSink, ProvenanceSource, QuestionTemplate,
        QuoteOutput, WizardError, WizardState, WizardStep,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
