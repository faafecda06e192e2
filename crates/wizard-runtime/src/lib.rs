//! Wizard Runtime - async session driver
//!
//! Runs the side effects around the pure reducer:
//! - Cancellation families so a newer operation supersedes an older one
//! - Location resolution with all-settled enrichment lookups
//! - Template loading with a TTL cache and a generic fallback
//! - Fire-and-forget pricing and non-fatal profile submission
//! - Snapshot persistence and resume
//!
//! # Example
//!
//! ```rust,ignore
//! use wizard_runtime::prelude::*;
//!
//! let session = WizardSession::new(collaborators, physical, financial, slices, config);
//! session.submit_location("94105").await?;
//! session.select_industry(IndustrySlug::new("hotel"), false).await?;
//! session.go_to_step(WizardStep::Profile).await?;
//! let completion = session.complete_profile().await?;
//! ```

#![warn(unreachable_pub)]

pub mod cancel;
pub mod collaborators;
pub mod config;
pub mod memory;
pub mod session;
pub mod templates;

// Re-exports for convenience
pub use cancel::{CancellationFamilies, Family};
pub use collaborators::{
    Collaborators, FixedIntel, IntelProvider, LocationResolver, ProfileSubmission,
    ProfileSubmitter, TemplateLoader, ZipOnlyResolver,
};
pub use config::{ConfigError, SessionConfig};
pub use memory::InMemorySliceStore;
pub use session::{Completion, Dispatched, Navigation, Submission, WizardSession};
pub use templates::{CachedTemplateLoader, DirectoryTemplateLoader, GenericTemplateLoader};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving a wizard session
    pub use crate::{
        Collaborators, InMemorySliceStore, Navigation, SessionConfig, Submission, WizardSession,
    };
    pub use wizard_core::prelude::*;
    pub use wizard_core::IndustrySlug;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
