//! # Retry Policies for Transient Failures
//!
//! Catalog, search, and LLM bridge calls can fail transiently (a dropped
//! connection, a momentary rate limit). This module provides a small, generic
//! retry helper so those call sites retry once on a transient error rather
//! than each reimplementing the same backoff loop.

use super::OrchestratorError;
use std::future::Future;
use std::time::Duration;

/// Errors that opt in to being retried must say so explicitly — not every
/// `OrchestratorError` variant is safe to retry (a validation error retried
/// twice fails the same way twice).
pub trait RetryableError {
    /// Whether this error represents a transient condition worth retrying.
    fn is_transient(&self) -> bool;
}

impl RetryableError for OrchestratorError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            OrchestratorError::CatalogError { .. }
                | OrchestratorError::SearchError { .. }
                | OrchestratorError::LLMError { .. }
                | OrchestratorError::Timeout { .. }
        )
    }
}

/// Configuration for [`retry_with_policy`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one. `1` means no
    /// retry; a "retry once" policy is `max_attempts: 2`.
    pub max_attempts: u32,
    /// Base delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied to `base_delay` for each subsequent retry.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// The policy used for catalog/search/LLM transport calls per the
    /// retry-once-on-transient-error rule.
    pub fn retry_once() -> Self {
        Self::default()
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scale = self.backoff_factor.powi(attempt as i32 - 1).max(1.0);
        Duration::from_secs_f64(self.base_delay.as_secs_f64() * scale)
    }
}

/// Builder for [`RetryPolicy`], mirroring the fluent style used by
/// [`super::circuit_breaker::CircuitBreakerConfig`].
pub struct RetryBuilder {
    policy: RetryPolicy,
}

impl RetryBuilder {
    /// Start from the default policy.
    pub fn new() -> Self {
        Self { policy: RetryPolicy::default() }
    }

    /// Set the maximum number of attempts.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.policy.max_attempts = max_attempts;
        self
    }

    /// Set the base delay before the first retry.
    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.policy.base_delay = base_delay;
        self
    }

    /// Set the exponential backoff factor.
    pub fn backoff_factor(mut self, backoff_factor: f64) -> Self {
        self.policy.backoff_factor = backoff_factor;
        self
    }

    /// Build the final policy.
    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

impl Default for RetryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `operation` under `policy`, retrying while the returned error is
/// transient and attempts remain. Non-transient errors return immediately.
pub async fn retry_with_policy<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T, OrchestratorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OrchestratorError>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < policy.max_attempts && error.is_transient() => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "transient error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_once_on_transient_error() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::retry_once();

        let result = retry_with_policy(&policy, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(OrchestratorError::llm_error("transient"))
                } else {
                    Ok::<_, OrchestratorError>(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_error() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::retry_once();

        let result: Result<(), _> = retry_with_policy(&policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(OrchestratorError::validation_error("bad edge condition")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_attempts_then_returns_last_error() {
        let attempts = AtomicU32::new(0);
        let policy = RetryBuilder::new()
            .max_attempts(2)
            .base_delay(Duration::from_millis(1))
            .build();

        let result: Result<(), _> = retry_with_policy(&policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(OrchestratorError::catalog_error("still down")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
