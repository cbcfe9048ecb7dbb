//! Guarded calls to external collaborators.

use std::future::Future;

use thiserror::Error;
use tokio::time::{Duration, sleep, timeout};

use crate::breaker::{BreakerConfig, CircuitBreaker};
use crate::config::ResilienceConfig;
use crate::retry::RetryPolicy;

/// Classifies collaborator errors for breaker and retry purposes.
///
/// Transient errors (transport faults, storage unavailability) count as
/// collaborator failures and are retried. Non-transient errors are
/// deterministic business outcomes; the collaborator answered, so they
/// count as successes for the breaker and are returned unchanged.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Error returned from a guarded call.
#[derive(Debug, Error)]
pub enum GuardError<E: std::error::Error> {
    /// The collaborator could not be reached: breaker open, call timeout,
    /// or transient failures exhausted the retry budget.
    #[error("{collaborator} unavailable: {reason}")]
    Unavailable { collaborator: String, reason: String },

    /// A deterministic collaborator error, passed through unchanged.
    #[error(transparent)]
    Inner(E),
}

impl<E: std::error::Error> GuardError<E> {
    /// Returns true for the unavailable variant.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, GuardError::Unavailable { .. })
    }
}

/// Wraps calls to one named collaborator in breaker + timeout + retry.
#[derive(Clone)]
pub struct CollaboratorGuard {
    name: String,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl CollaboratorGuard {
    /// Creates a guard for the named collaborator from shared configuration.
    pub fn new(name: impl Into<String>, config: &ResilienceConfig) -> Self {
        let name = name.into();
        Self {
            breaker: CircuitBreaker::new(name.clone(), config.breaker.clone()),
            retry: config.retry.clone(),
            call_timeout: config.call_timeout,
            name,
        }
    }

    /// Creates a guard from explicit parts.
    pub fn with_parts(
        name: impl Into<String>,
        breaker_config: BreakerConfig,
        retry: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        let name = name.into();
        Self {
            breaker: CircuitBreaker::new(name.clone(), breaker_config),
            retry,
            call_timeout,
            name,
        }
    }

    /// Returns the collaborator name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the breaker guarding this collaborator.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Runs `op` under the breaker with a per-attempt timeout.
    ///
    /// Transient errors and timeouts are recorded as failures and retried
    /// with exponential backoff up to the retry budget; once exhausted the
    /// call surfaces as [`GuardError::Unavailable`]. Non-transient errors
    /// return immediately via [`GuardError::Inner`].
    pub async fn call<T, E, F, Fut>(&self, mut op: F) -> Result<T, GuardError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Transient,
    {
        let mut last_reason = "circuit open".to_string();

        for attempt in 1..=self.retry.max_attempts() {
            if attempt > 1 {
                sleep(self.retry.delay_for(attempt - 1)).await;
            }

            if !self.breaker.try_acquire().await {
                last_reason = "circuit open".to_string();
                continue;
            }

            match timeout(self.call_timeout, op()).await {
                Ok(Ok(value)) => {
                    self.breaker.record_success().await;
                    return Ok(value);
                }
                Ok(Err(e)) if !e.is_transient() => {
                    // The collaborator answered; a business rejection is not
                    // a fault of the collaborator.
                    self.breaker.record_success().await;
                    return Err(GuardError::Inner(e));
                }
                Ok(Err(e)) => {
                    self.breaker.record_failure().await;
                    tracing::warn!(
                        collaborator = %self.name,
                        attempt,
                        error = %e,
                        "transient collaborator failure"
                    );
                    last_reason = e.to_string();
                }
                Err(_) => {
                    self.breaker.record_failure().await;
                    tracing::warn!(
                        collaborator = %self.name,
                        attempt,
                        timeout_ms = self.call_timeout.as_millis() as u64,
                        "collaborator call timed out"
                    );
                    last_reason = format!(
                        "timed out after {}ms",
                        self.call_timeout.as_millis()
                    );
                }
            }
        }

        metrics::counter!("guard_unavailable_total", "collaborator" => self.name.clone())
            .increment(1);
        Err(GuardError::Unavailable {
            collaborator: self.name.clone(),
            reason: last_reason,
        })
    }
}
