//! Resilience layer for calls to external collaborators.
//!
//! Each collaborator gets an independent three-state circuit breaker
//! (Closed / Open / HalfOpen). Calls through the [`CollaboratorGuard`]
//! additionally carry a timeout and a bounded exponential-backoff retry;
//! a timeout counts as a failure for breaker purposes, while deterministic
//! business failures pass through untouched.

pub mod breaker;
pub mod config;
pub mod guard;
pub mod retry;

pub use breaker::{BreakerConfig, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use config::ResilienceConfig;
pub use guard::{CollaboratorGuard, GuardError, Transient};
pub use retry::RetryPolicy;
