//! Retry with exponential backoff, per-attempt timeout and cancellation
//!
//! Delays double per attempt starting at `base_delay_ms`, capped at
//! `max_delay_ms`. Exhaustion returns the last attempt's error; a cancelled
//! token yields [`AttemptError::Aborted`] at the next suspension point.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Delay before the first retry
    pub base_delay_ms: u64,
    /// Upper bound for any single delay
    pub max_delay_ms: u64,
    /// Bound on each attempt; `None` waits indefinitely
    pub timeout_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 8_000,
            timeout_ms: None,
        }
    }
}

impl RetryPolicy {
    /// Create with defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With attempt count
    #[inline]
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// With base delay
    #[inline]
    #[must_use]
    pub fn with_base_delay_ms(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    /// With per-attempt timeout
    #[inline]
    #[must_use]
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Delay after `retries_used` failed attempts (zero-based)
    #[must_use]
    pub fn backoff(&self, retries_used: u32) -> Duration {
        if self.base_delay_ms == 0 {
            return Duration::ZERO;
        }
        let max_ms = self.max_delay_ms.max(self.base_delay_ms);
        let multiplier = 1u64 << retries_used.min(20);
        Duration::from_millis(self.base_delay_ms.saturating_mul(multiplier).min(max_ms))
    }
}

/// Failure of a retried operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError<E> {
    /// Operation returned an error
    #[error("{0}")]
    Failed(E),

    /// Attempt exceeded the per-attempt timeout
    #[error("attempt timed out")]
    TimedOut,

    /// Cancellation token fired
    #[error("operation aborted")]
    Aborted,
}

impl<E> AttemptError<E> {
    /// Inner error, when the operation itself failed
    #[must_use]
    pub fn into_inner(self) -> Option<E> {
        match self {
            AttemptError::Failed(e) => Some(e),
            AttemptError::TimedOut | AttemptError::Aborted => None,
        }
    }

    /// Check if the failure was a cancellation
    #[inline]
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, AttemptError::Aborted)
    }
}

/// Retry every failure
///
/// # Errors
/// Returns the last attempt's error, or [`AttemptError::Aborted`].
pub async fn retry<T, E, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    op: F,
) -> Result<T, AttemptError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_if(policy, cancel, op, |_| true).await
}

/// Retry failures accepted by `should_retry`
///
/// `op` receives the one-based attempt number.
///
/// # Errors
/// Returns the first non-retryable error, the last attempt's error, or
/// [`AttemptError::Aborted`].
pub async fn retry_if<T, E, F, Fut, P>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
    should_retry: P,
) -> Result<T, AttemptError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&AttemptError<E>) -> bool,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        if cancel.is_cancelled() {
            return Err(AttemptError::Aborted);
        }

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AttemptError::Aborted),
            outcome = bounded(op(attempt), policy.timeout_ms) => outcome,
        };

        let error = match outcome {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if attempt >= attempts || !should_retry(&error) {
            return Err(error);
        }

        let delay = policy.backoff(attempt - 1);
        tracing::debug!("Attempt {} of {} failed; retrying in {:?}", attempt, attempts, delay);
        metrics::counter!("wizard_retry_attempts_total").increment(1);

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AttemptError::Aborted),
            () = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}

async fn bounded<T, E, Fut>(fut: Fut, timeout_ms: Option<u64>) -> Result<T, AttemptError<E>>
where
    Fut: Future<Output = Result<T, E>>,
{
    match timeout_ms {
        Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), fut).await {
            Ok(result) => result.map_err(AttemptError::Failed),
            Err(_) => Err(AttemptError::TimedOut),
        },
        None => fut.await.map_err(AttemptError::Failed),
    }
}
