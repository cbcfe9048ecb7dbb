//! Three-state circuit breaker with a rolling failure window.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

/// The state of a circuit breaker.
///
/// State transitions:
/// ```text
/// Closed ──failure ratio over threshold──► Open
/// Open ──cool-down elapsed──► HalfOpen
/// HalfOpen ──trial success──► Closed
/// HalfOpen ──trial failure──► Open
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through; failures are counted in a rolling window.
    Closed,

    /// Calls fail immediately without reaching the collaborator.
    Open,

    /// A single trial call is allowed through. A trial whose result never
    /// arrives expires after the cool-down and a new trial is granted.
    HalfOpen,
}

impl CircuitState {
    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Breaker tuning parameters.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Failure ratio in the rolling window at or above which the circuit opens.
    pub failure_ratio: f64,
    /// Minimum number of samples in the window before the ratio is evaluated.
    pub min_samples: usize,
    /// Age beyond which samples fall out of the rolling window.
    pub window: Duration,
    /// Maximum number of samples kept in the window.
    pub window_size: usize,
    /// How long the circuit stays open before allowing a trial call.
    pub cool_down: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_ratio: 0.5,
            min_samples: 5,
            window: Duration::from_secs(30),
            window_size: 64,
            cool_down: Duration::from_secs(10),
        }
    }
}

/// Point-in-time view of a breaker, for health reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub window_samples: usize,
    pub window_failures: usize,
    pub trip_count: u64,
    pub rejected_calls: u64,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    success: bool,
    at: Instant,
}

struct BreakerInner {
    config: BreakerConfig,
    state: CircuitState,
    window: VecDeque<Sample>,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    trial_started_at: Option<Instant>,
    trip_count: u64,
    rejected_calls: u64,
}

impl BreakerInner {
    fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            window: VecDeque::new(),
            opened_at: None,
            trial_in_flight: false,
            trial_started_at: None,
            trip_count: 0,
            rejected_calls: 0,
        }
    }

    fn try_acquire(&mut self) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled = self
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.config.cool_down);
                if cooled {
                    self.to_half_open();
                    self.grant_trial();
                    true
                } else {
                    self.rejected_calls += 1;
                    false
                }
            }
            CircuitState::HalfOpen => {
                // An outstanding trial expires after the cool-down: a caller
                // may drop the guarded call mid-flight and never report a
                // result, and that must not wedge the breaker in HalfOpen.
                let trial_expired = self
                    .trial_started_at
                    .is_some_and(|at| at.elapsed() >= self.config.cool_down);
                if self.trial_in_flight && !trial_expired {
                    self.rejected_calls += 1;
                    false
                } else {
                    self.grant_trial();
                    true
                }
            }
        }
    }

    fn grant_trial(&mut self) {
        self.trial_in_flight = true;
        self.trial_started_at = Some(Instant::now());
    }

    fn record_success(&mut self) {
        self.push_sample(true);
        if self.state == CircuitState::HalfOpen {
            self.to_closed();
        }
    }

    fn record_failure(&mut self) {
        self.push_sample(false);
        match self.state {
            CircuitState::Closed => {
                if self.should_trip() {
                    self.to_open();
                }
            }
            // A failed trial call reopens the circuit.
            CircuitState::HalfOpen => self.to_open(),
            CircuitState::Open => {}
        }
    }

    fn should_trip(&mut self) -> bool {
        self.prune_window();
        let total = self.window.len();
        if total < self.config.min_samples {
            return false;
        }
        let failures = self.window.iter().filter(|s| !s.success).count();
        (failures as f64) / (total as f64) >= self.config.failure_ratio
    }

    fn push_sample(&mut self, success: bool) {
        self.window.push_back(Sample {
            success,
            at: Instant::now(),
        });
        self.prune_window();
    }

    fn prune_window(&mut self) {
        let cutoff = Instant::now() - self.config.window;
        while let Some(oldest) = self.window.front() {
            if oldest.at < cutoff {
                self.window.pop_front();
            } else {
                break;
            }
        }
        while self.window.len() > self.config.window_size {
            self.window.pop_front();
        }
    }

    fn to_open(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.trial_in_flight = false;
        self.trial_started_at = None;
        self.trip_count += 1;
    }

    fn to_half_open(&mut self) {
        self.state = CircuitState::HalfOpen;
        self.trial_in_flight = false;
        self.trial_started_at = None;
    }

    fn to_closed(&mut self) {
        self.state = CircuitState::Closed;
        self.opened_at = None;
        self.trial_in_flight = false;
        self.trial_started_at = None;
        self.window.clear();
    }

    fn snapshot(&mut self) -> BreakerSnapshot {
        self.prune_window();
        BreakerSnapshot {
            state: self.state,
            window_samples: self.window.len(),
            window_failures: self.window.iter().filter(|s| !s.success).count(),
            trip_count: self.trip_count,
            rejected_calls: self.rejected_calls,
        }
    }
}

/// Per-collaborator circuit breaker.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct CircuitBreaker {
    name: String,
    inner: Arc<RwLock<BreakerInner>>,
}

impl CircuitBreaker {
    /// Creates a breaker for the named collaborator.
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(RwLock::new(BreakerInner::new(config))),
        }
    }

    /// Returns the collaborator name this breaker guards.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks whether a call may proceed, advancing Open → HalfOpen after
    /// the cool-down. Returns false when the call must be rejected.
    pub async fn try_acquire(&self) -> bool {
        let mut inner = self.inner.write().await;
        let before = inner.state;
        let allowed = inner.try_acquire();
        if before == CircuitState::Open && inner.state == CircuitState::HalfOpen {
            tracing::info!(collaborator = %self.name, "circuit half-open, allowing trial call");
        }
        allowed
    }

    /// Records a successful call.
    pub async fn record_success(&self) {
        let mut inner = self.inner.write().await;
        let before = inner.state;
        inner.record_success();
        if before == CircuitState::HalfOpen && inner.state == CircuitState::Closed {
            tracing::info!(collaborator = %self.name, "circuit closed");
        }
    }

    /// Records a failed call (including a timeout).
    pub async fn record_failure(&self) {
        let mut inner = self.inner.write().await;
        let before = inner.state;
        inner.record_failure();
        if before != CircuitState::Open && inner.state == CircuitState::Open {
            metrics::counter!("breaker_opened_total", "collaborator" => self.name.clone())
                .increment(1);
            tracing::warn!(collaborator = %self.name, "circuit opened");
        }
    }

    /// Returns the current state.
    pub async fn state(&self) -> CircuitState {
        self.inner.read().await.state
    }

    /// Returns a point-in-time snapshot of breaker counters.
    pub async fn snapshot(&self) -> BreakerSnapshot {
        self.inner.write().await.snapshot()
    }

    /// Manually opens the circuit (testing and maintenance).
    pub async fn trip(&self) {
        self.inner.write().await.to_open();
    }

    /// Manually closes the circuit.
    pub async fn reset(&self) {
        self.inner.write().await.to_closed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> BreakerConfig {
        BreakerConfig {
            failure_ratio: 0.5,
            min_samples: 4,
            window: Duration::from_secs(30),
            window_size: 16,
            cool_down: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn starts_closed() {
        let breaker = CircuitBreaker::new("inventory", test_config());
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert!(breaker.try_acquire().await);
    }

    #[tokio::test]
    async fn does_not_trip_below_minimum_samples() {
        let breaker = CircuitBreaker::new("inventory", test_config());

        // Three failures, but min_samples is four.
        for _ in 0..3 {
            breaker.record_failure().await;
        }
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn trips_on_failure_ratio_over_threshold() {
        let breaker = CircuitBreaker::new("inventory", test_config());

        breaker.record_success().await;
        breaker.record_success().await;
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);

        // 2 failures / 4 samples reaches the 0.5 ratio.
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);
        assert!(!breaker.try_acquire().await);
    }

    #[tokio::test]
    async fn mostly_successful_window_stays_closed() {
        let breaker = CircuitBreaker::new("inventory", test_config());

        for _ in 0..7 {
            breaker.record_success().await;
        }
        breaker.record_failure().await;
        breaker.record_failure().await;
        // 2 failures / 9 samples is under the 0.5 ratio.
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn cool_down_allows_single_trial_call() {
        let breaker = CircuitBreaker::new("inventory", test_config());
        breaker.trip().await;
        assert!(!breaker.try_acquire().await);

        tokio::time::advance(Duration::from_millis(150)).await;

        // First acquire after cool-down is the trial call.
        assert!(breaker.try_acquire().await);
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);

        // No second concurrent trial.
        assert!(!breaker.try_acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn trial_success_closes_circuit() {
        let breaker = CircuitBreaker::new("inventory", test_config());
        breaker.trip().await;
        tokio::time::advance(Duration::from_millis(150)).await;

        assert!(breaker.try_acquire().await);
        breaker.record_success().await;

        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert!(breaker.try_acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn trial_failure_reopens_circuit() {
        let breaker = CircuitBreaker::new("inventory", test_config());
        breaker.trip().await;
        tokio::time::advance(Duration::from_millis(150)).await;

        assert!(breaker.try_acquire().await);
        breaker.record_failure().await;

        assert_eq!(breaker.state().await, CircuitState::Open);
        assert!(!breaker.try_acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_trial_expires_and_a_new_trial_is_granted() {
        let breaker = CircuitBreaker::new("inventory", test_config());
        breaker.trip().await;
        tokio::time::advance(Duration::from_millis(150)).await;

        // Trial handed out but its result never reported (caller dropped
        // the call mid-flight).
        assert!(breaker.try_acquire().await);
        assert!(!breaker.try_acquire().await);

        tokio::time::advance(Duration::from_millis(150)).await;

        // The stale trial has expired; the breaker is not wedged.
        assert!(breaker.try_acquire().await);
        breaker.record_success().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn snapshot_reports_window_and_trips() {
        let breaker = CircuitBreaker::new("payment", test_config());

        breaker.record_success().await;
        breaker.record_failure().await;
        let snapshot = breaker.snapshot().await;
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.window_samples, 2);
        assert_eq!(snapshot.window_failures, 1);
        assert_eq!(snapshot.trip_count, 0);

        breaker.trip().await;
        let snapshot = breaker.snapshot().await;
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.trip_count, 1);
    }

    #[tokio::test]
    async fn reset_closes_and_clears_window() {
        let breaker = CircuitBreaker::new("payment", test_config());
        for _ in 0..4 {
            breaker.record_failure().await;
        }
        assert_eq!(breaker.state().await, CircuitState::Open);

        breaker.reset().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert_eq!(breaker.snapshot().await.window_samples, 0);
    }
}
