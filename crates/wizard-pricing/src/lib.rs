//! Wizard Pricing - two-layer quote pipeline
//!
//! Converts answers into a priced recommendation without ever blocking the
//! wizard:
//! - Physical layer (load profile + sizing) under half the deadline
//! - Financial layer under the rest, with exponential-backoff retry
//! - Monotonic merge: the financial group is all present or all absent
//! - Request keys tie every result to the run that produced it
//!
//! # Example
//!
//! ```rust,ignore
//! use wizard_pricing::prelude::*;
//!
//! let orchestrator = PricingOrchestrator::new(
//!     Arc::new(ReferenceLoadModel),
//!     Arc::new(ReferenceFinancialModel::default()),
//!     slices,
//! );
//! let outcome = orchestrator
//!     .run_pricing_safe(PricingRequest::from_state(&state), &sink, cancel)
//!     .await;
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod layers;
pub mod orchestrator;
pub mod reference;
pub mod retry;
pub mod sanity;

// Re-exports for convenience
pub use config::PricingConfig;
pub use layers::{
    FinancialLayer, FinancialRequest, LayerError, PhysicalLayer, PhysicalOutput, PricingRequest,
    RateInputs,
};
pub use orchestrator::{PricingOrchestrator, PricingOutcome};
pub use reference::{ReferenceFinancialModel, ReferenceLoadModel};
pub use retry::{retry, retry_if, AttemptError, RetryPolicy};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the pricing pipeline
    pub use crate::{
        FinancialLayer, LayerError, PhysicalLayer, PricingConfig, PricingOrchestrator,
        PricingOutcome, PricingRequest, ReferenceFinancialModel, ReferenceLoadModel, RetryPolicy,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
