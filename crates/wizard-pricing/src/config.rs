//! Pricing configuration

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pricing orchestrator configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Hard wall-clock deadline for a whole run
    pub total_timeout_ms: u64,
    /// Time kept back from the financial layer for merge and sanity
    pub merge_reserve_ms: u64,
    /// Retry policy of the financial layer
    pub financial_retry: RetryPolicy,
    /// Relative tolerance of sanity cross-checks
    pub sanity_tolerance: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            total_timeout_ms: 15_000,
            merge_reserve_ms: 250,
            financial_retry: RetryPolicy::default(),
            sanity_tolerance: 0.05,
        }
    }
}

impl PricingConfig {
    /// Create with defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With total deadline
    #[inline]
    #[must_use]
    pub fn with_total_timeout_ms(mut self, ms: u64) -> Self {
        self.total_timeout_ms = ms;
        self
    }

    /// With financial retry policy
    #[inline]
    #[must_use]
    pub fn with_financial_retry(mut self, policy: RetryPolicy) -> Self {
        self.financial_retry = policy;
        self
    }

    /// With merge reserve
    #[inline]
    #[must_use]
    pub fn with_merge_reserve_ms(mut self, ms: u64) -> Self {
        self.merge_reserve_ms = ms;
        self
    }

    /// Hard deadline
    #[inline]
    #[must_use]
    pub fn total_timeout(&self) -> Duration {
        Duration::from_millis(self.total_timeout_ms)
    }

    /// Physical-layer budget: half the total deadline
    #[inline]
    #[must_use]
    pub fn physical_timeout(&self) -> Duration {
        Duration::from_millis(self.total_timeout_ms / 2)
    }

    /// Merge reserve
    #[inline]
    #[must_use]
    pub fn merge_reserve(&self) -> Duration {
        Duration::from_millis(self.merge_reserve_ms)
    }
}
