//! Error types for the wizard core
//!
//! Provides the error taxonomy shared by every layer of the wizard:
//! - Operator input problems (`VALIDATION`, blocking, shown inline)
//! - Missing prerequisites (`STATE`, blocking, routes to an earlier step)
//! - Superseded operations (`ABORTED`, silent)
//! - External collaborator failures (`NETWORK` / `API`)
//! - Everything else (`UNKNOWN`)

use crate::types::WizardStep;
use serde::{Deserialize, Serialize};

/// Main wizard error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WizardError {
    /// Operator input is insufficient
    #[error("validation failed: {0}")]
    Validation(String),

    /// A prerequisite step has not been satisfied
    #[error("{reason}")]
    State {
        /// Human-readable gate reason
        reason: String,
        /// Earliest step the operator should be routed to
        route_to: WizardStep,
    },

    /// Operation was superseded by a newer one in the same family
    #[error("operation aborted")]
    Aborted,

    /// Transport-level failure talking to a collaborator
    #[error("network error: {0}")]
    Network(String),

    /// Collaborator answered with an error
    #[error("api error: {message}")]
    Api {
        /// Optional status code reported by the collaborator
        status: Option<u16>,
        /// Collaborator message
        message: String,
    },

    /// Question template violates its schema
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// Catch-all, surfaced with the raw message
    #[error("{0}")]
    Unknown(String),
}

impl WizardError {
    /// Classify the error
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::State { .. } => ErrorKind::State,
            Self::Aborted => ErrorKind::Aborted,
            Self::Network(_) => ErrorKind::Network,
            Self::Api { .. } | Self::Template(_) => ErrorKind::Api,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Check if the error blocks forward progress
    #[inline]
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::State { .. } | Self::Template(_)
        )
    }

    /// Check if the error must never be shown as a failure
    #[inline]
    #[must_use]
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Api { status, .. } => status.map_or(true, |s| s >= 500 || s == 429),
            _ => false,
        }
    }

    /// Build the record stored on the wizard state
    #[must_use]
    pub fn to_record(&self) -> ErrorRecord {
        ErrorRecord::new(self.kind(), self.to_string())
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Operator input insufficient
    Validation,
    /// Prerequisite missing
    State,
    /// Superseded operation
    Aborted,
    /// Transport failure
    Network,
    /// Collaborator failure
    Api,
    /// Catch-all
    Unknown,
}

/// Error as stored on the wizard state and shown to the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Classification
    pub kind: ErrorKind,
    /// Display message
    pub message: String,
}

impl ErrorRecord {
    /// Create new record
    #[inline]
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Question template schema violations
///
/// These are fatal: a template that fails validation is never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// Template has no parts
    #[error("template for {0} has no parts")]
    Empty(String),

    /// Question id used twice
    #[error("duplicate question id: {0}")]
    DuplicateQuestion(String),

    /// Part id used twice
    #[error("duplicate part id: {0}")]
    DuplicatePart(String),

    /// Default value does not fit the question kind
    #[error("question {question} has an invalid default: {reason}")]
    InvalidDefault {
        /// Offending question
        question: String,
        /// Why the default was rejected
        reason: String,
    },

    /// Template-level default refers to an unknown question
    #[error("template default refers to unknown question: {0}")]
    UnknownDefault(String),

    /// Document could not be parsed into a template
    #[error("malformed template: {0}")]
    Malformed(String),

    /// Document declares a different industry than the one requested
    #[error("template declares industry {found}, expected {expected}")]
    IndustryMismatch {
        /// Requested industry
        expected: String,
        /// Declared industry
        found: String,
    },
}
