//! Resilience configuration loaded from environment variables.

use tokio::time::Duration;

use crate::breaker::BreakerConfig;
use crate::retry::RetryPolicy;

/// Shared resilience tuning with sensible defaults.
///
/// Reads from environment variables:
/// - `BREAKER_FAILURE_RATIO` — window failure ratio that opens the circuit (default: `0.5`)
/// - `BREAKER_MIN_SAMPLES` — minimum window volume before tripping (default: `5`)
/// - `BREAKER_COOL_DOWN_MS` — open-state cool-down in milliseconds (default: `10000`)
/// - `RETRY_MAX_ATTEMPTS` — total attempts per guarded call (default: `3`)
/// - `RETRY_BASE_DELAY_MS` — first backoff delay in milliseconds (default: `50`)
/// - `CALL_TIMEOUT_MS` — per-attempt collaborator timeout in milliseconds (default: `3000`)
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    pub breaker: BreakerConfig,
    pub retry: RetryPolicy,
    pub call_timeout: Duration,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ResilienceConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = BreakerConfig::default();
        let breaker = BreakerConfig {
            failure_ratio: env_parse("BREAKER_FAILURE_RATIO", defaults.failure_ratio),
            min_samples: env_parse("BREAKER_MIN_SAMPLES", defaults.min_samples),
            cool_down: Duration::from_millis(env_parse(
                "BREAKER_COOL_DOWN_MS",
                defaults.cool_down.as_millis() as u64,
            )),
            ..defaults
        };

        let retry = RetryPolicy::new(
            env_parse("RETRY_MAX_ATTEMPTS", 3),
            Duration::from_millis(env_parse("RETRY_BASE_DELAY_MS", 50)),
            Duration::from_secs(2),
        );

        Self {
            breaker,
            retry,
            call_timeout: Duration::from_millis(env_parse("CALL_TIMEOUT_MS", 3_000)),
        }
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            breaker: BreakerConfig::default(),
            retry: RetryPolicy::default(),
            call_timeout: Duration::from_millis(3_000),
        }
    }
}
