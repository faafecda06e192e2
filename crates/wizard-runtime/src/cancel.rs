//! Cancellation families
//!
//! Operations are grouped into families; beginning an operation cancels the
//! one it supersedes in the same family. Nothing is shared across families,
//! so retyping a location never aborts a pricing run.

use parking_lot::Mutex;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Operation family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Location resolution and enrichment
    Location,
    /// Industry selection and template loading
    Industry,
    /// Step navigation side effects
    Navigation,
    /// Pricing runs
    Pricing,
}

impl Family {
    /// All families
    pub const ALL: [Family; 4] = [
        Family::Location,
        Family::Industry,
        Family::Navigation,
        Family::Pricing,
    ];
}

/// One live token per family
#[derive(Debug, Default)]
pub struct CancellationFamilies {
    tokens: Mutex<HashMap<Family, CancellationToken>>,
}

impl CancellationFamilies {
    /// Create empty
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new operation, cancelling the previous one in `family`
    pub fn begin(&self, family: Family) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.tokens.lock().insert(family, token.clone()) {
            if !previous.is_cancelled() {
                tracing::debug!(?family, "superseding in-flight operation");
                previous.cancel();
            }
        }
        token
    }

    /// Cancel the live operation in `family`, if any
    pub fn cancel(&self, family: Family) {
        if let Some(token) = self.tokens.lock().remove(&family) {
            token.cancel();
        }
    }

    /// Cancel every family
    pub fn cancel_all(&self) {
        for (_, token) in self.tokens.lock().drain() {
            token.cancel();
        }
    }

    /// Check if `family` has an operation that has not been cancelled
    #[must_use]
    pub fn is_active(&self, family: Family) -> bool {
        self.tokens
            .lock()
            .get(&family)
            .is_some_and(|t| !t.is_cancelled())
    }
}
