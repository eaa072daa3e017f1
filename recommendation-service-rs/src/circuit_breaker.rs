//! Circuit breaker for upstream protection
//!
//! This module implements the circuit breaker pattern that interposes on
//! every outbound call to an upstream service.
//!
//! Features include:
//! - Standard circuit states (Closed, Open, Half-Open)
//! - Consecutive-failure and failure-rate thresholds
//! - Sliding window for outcome tracking
//! - Request timeout enforcement on the wrapped operation
//! - Metrics snapshot reporting

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use metrics::{counter, gauge};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, ServiceError};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CircuitState {
    /// Normal operation, calls admitted
    Closed,
    /// Failing fast, calls rejected
    Open,
    /// Testing recovery, limited probe calls admitted
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for a circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Deadline imposed on every admitted operation
    pub request_timeout: Duration,
    /// Number of recent outcomes retained for rate-based tripping
    pub window_size: usize,
    /// Failure rate over a full window that trips the circuit (0.0 to 1.0)
    pub failure_rate_threshold: f64,
    /// Number of consecutive failures that trips the circuit
    pub consecutive_failure_threshold: usize,
    /// Time to keep the circuit open before probing
    pub open_state_duration: Duration,
    /// Maximum number of probe calls admitted in half-open state
    pub half_open_max_trials: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(2),
            window_size: 10,
            failure_rate_threshold: 0.5,
            consecutive_failure_threshold: 5,
            open_state_duration: Duration::from_secs(30),
            half_open_max_trials: 3,
        }
    }
}

/// Outcome tracking for the sliding window
#[derive(Debug)]
struct OutcomeWindow {
    /// Size of the sliding window
    size: usize,
    /// Outcomes in the window (true = success, false = failure)
    outcomes: VecDeque<bool>,
    /// Failures currently in the window
    failure_count: usize,
}

impl OutcomeWindow {
    fn new(size: usize) -> Self {
        Self {
            size,
            outcomes: VecDeque::with_capacity(size),
            failure_count: 0,
        }
    }

    /// Appends an outcome, evicting the oldest when at capacity
    fn record(&mut self, success: bool) {
        if self.outcomes.len() >= self.size {
            if let Some(evicted) = self.outcomes.pop_front() {
                if !evicted {
                    self.failure_count = self.failure_count.saturating_sub(1);
                }
            }
        }

        self.outcomes.push_back(success);
        if !success {
            self.failure_count += 1;
        }
    }

    /// Current failure rate (0.0 to 1.0); 0.0 when the window is empty
    fn failure_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            0.0
        } else {
            self.failure_count as f64 / self.outcomes.len() as f64
        }
    }

    fn len(&self) -> usize {
        self.outcomes.len()
    }

    fn is_full(&self) -> bool {
        self.outcomes.len() >= self.size
    }

    fn clear(&mut self) {
        self.outcomes.clear();
        self.failure_count = 0;
    }
}

/// Mutable breaker state, guarded by the breaker mutex
#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    window: OutcomeWindow,
    consecutive_failures: usize,
    opened_at: Option<Instant>,
    half_open_trials: usize,
    half_open_successes: usize,
    total_success: u64,
    total_failure: u64,
}

impl BreakerInner {
    fn new(window_size: usize) -> Self {
        Self {
            state: CircuitState::Closed,
            window: OutcomeWindow::new(window_size),
            consecutive_failures: 0,
            opened_at: None,
            half_open_trials: 0,
            half_open_successes: 0,
            total_success: 0,
            total_failure: 0,
        }
    }
}

/// Metrics snapshot of a circuit breaker
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerMetrics {
    /// Current state label
    pub state: String,
    /// Failure percentage over all recorded calls
    pub failure_rate: String,
    /// Total successful calls
    pub successful_calls: u64,
    /// Total failed calls
    pub failed_calls: u64,
    /// Failure percentage over the current window
    pub window_failure_rate: String,
    /// Current consecutive failure count
    pub consecutive_failures: usize,
    /// Probe progress as "{successes}/{max}" while half-open, else "N/A"
    pub half_open_trials: String,
}

/// Per-upstream circuit breaker shared by every in-flight request.
///
/// The mutex guards admission decisions and outcome bookkeeping only; the
/// downstream call itself always runs outside the lock.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker with the given name and configuration
    pub fn new<S: Into<String>>(name: S, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    /// Creates a circuit breaker consulting the supplied clock
    pub fn with_clock<S: Into<String>>(
        name: S,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let window_size = config.window_size;
        Self {
            name: name.into(),
            config,
            clock,
            inner: Mutex::new(BreakerInner::new(window_size)),
        }
    }

    /// Name of this breaker (for logs and metrics)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executes an async operation under the breaker's policy.
    ///
    /// The operation is admitted according to the current state, runs under
    /// `request_timeout`, and has exactly one outcome recorded. Rejected calls
    /// fail with [`ServiceError::RejectedOpen`] without invoking the operation
    /// and without touching the window or counters.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.admit()?;

        // The lock is not held here; expiry of the timer discards the
        // in-flight future so a late result can never be recorded.
        let failure = match tokio::time::timeout(self.config.request_timeout, operation()).await {
            Ok(Ok(value)) => {
                self.record_success();
                return Ok(value);
            }
            Ok(Err(err)) => err,
            Err(_) => ServiceError::timeout(format!(
                "operation exceeded request timeout of {:?}",
                self.config.request_timeout
            )),
        };

        self.record_failure(&failure);
        Err(failure)
    }

    /// Returns the current state, applying any pending time-driven transition
    pub fn current_state(&self) -> CircuitState {
        let mut inner = self.inner.lock().unwrap();
        self.reconsider(&mut inner);
        inner.state
    }

    /// Builds a metrics snapshot reflecting the current wall-clock moment
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let mut inner = self.inner.lock().unwrap();
        self.reconsider(&mut inner);

        let total = inner.total_success + inner.total_failure;
        let failure_rate = if total == 0 {
            0.0
        } else {
            inner.total_failure as f64 / total as f64
        };

        let half_open_trials = if inner.state == CircuitState::HalfOpen {
            format!(
                "{}/{}",
                inner.half_open_successes, self.config.half_open_max_trials
            )
        } else {
            "N/A".to_string()
        };

        CircuitBreakerMetrics {
            state: inner.state.to_string(),
            failure_rate: format_percentage(failure_rate),
            successful_calls: inner.total_success,
            failed_calls: inner.total_failure,
            window_failure_rate: format_percentage(inner.window.failure_rate()),
            consecutive_failures: inner.consecutive_failures,
            half_open_trials,
        }
    }

    /// Forces the breaker back to closed and zeros all counters and windows
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        let previous = inner.state;
        *inner = BreakerInner::new(self.config.window_size);

        info!(
            circuit = %self.name,
            previous_state = %previous,
            "Circuit manually reset to CLOSED state"
        );
        self.emit_state_gauge(CircuitState::Closed);
    }

    /// Admission decision; atomically claims a half-open trial slot
    fn admit(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        self.reconsider(&mut inner);

        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                debug!(circuit = %self.name, "Circuit open, call rejected");
                Err(ServiceError::rejected_open(CircuitState::Open))
            }
            CircuitState::HalfOpen => {
                if inner.half_open_trials < self.config.half_open_max_trials {
                    inner.half_open_trials += 1;
                    Ok(())
                } else {
                    debug!(circuit = %self.name, "Half-open trial limit reached, call rejected");
                    Err(ServiceError::rejected_open(CircuitState::HalfOpen))
                }
            }
        }
    }

    /// Time-driven transition: OPEN moves to HALF_OPEN once the open window
    /// has elapsed. Runs before every admission decision and metrics read.
    fn reconsider(&self, inner: &mut BreakerInner) {
        if inner.state != CircuitState::Open {
            return;
        }

        let opened_at = match inner.opened_at {
            Some(instant) => instant,
            None => return,
        };

        if self.clock.now().duration_since(opened_at) >= self.config.open_state_duration {
            self.to_half_open(inner);
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();

        inner.total_success += 1;
        inner.consecutive_failures = 0;
        inner.window.record(true);
        counter!("circuit_breaker_calls_total", "breaker" => self.name.clone(), "outcome" => "success")
            .increment(1);

        if inner.state == CircuitState::HalfOpen {
            inner.half_open_successes += 1;
            if inner.half_open_successes >= self.config.half_open_max_trials {
                self.close(&mut inner);
            }
        }
    }

    fn record_failure(&self, failure: &ServiceError) {
        let mut inner = self.inner.lock().unwrap();

        inner.total_failure += 1;
        inner.consecutive_failures += 1;
        inner.window.record(false);
        counter!("circuit_breaker_calls_total", "breaker" => self.name.clone(), "outcome" => "failure")
            .increment(1);

        match inner.state {
            CircuitState::Closed => {
                if inner.consecutive_failures >= self.config.consecutive_failure_threshold {
                    warn!(
                        circuit = %self.name,
                        consecutive = %inner.consecutive_failures,
                        threshold = %self.config.consecutive_failure_threshold,
                        error = %failure,
                        "Circuit OPEN: consecutive failure threshold reached"
                    );
                    self.trip(&mut inner);
                } else if inner.window.is_full()
                    && inner.window.failure_rate() >= self.config.failure_rate_threshold
                {
                    warn!(
                        circuit = %self.name,
                        window_failure_rate = %format_percentage(inner.window.failure_rate()),
                        threshold = %format_percentage(self.config.failure_rate_threshold),
                        error = %failure,
                        "Circuit OPEN: window failure rate threshold reached"
                    );
                    self.trip(&mut inner);
                }
            }
            CircuitState::HalfOpen => {
                // Any probe failure re-trips immediately
                warn!(
                    circuit = %self.name,
                    error = %failure,
                    "Circuit REOPENED: probe failed in half-open state"
                );
                self.trip(&mut inner);
            }
            CircuitState::Open => {
                // A call admitted earlier completed after the trip; record the
                // outcome but leave the state alone.
                debug!(circuit = %self.name, "Failure recorded while circuit already open");
            }
        }
    }

    /// Transition to open state
    fn trip(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(self.clock.now());
        inner.half_open_trials = 0;
        inner.half_open_successes = 0;
        self.emit_state_gauge(CircuitState::Open);
    }

    /// Transition to half-open state
    fn to_half_open(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::HalfOpen;
        inner.opened_at = None;
        inner.half_open_trials = 0;
        inner.half_open_successes = 0;

        info!(
            circuit = %self.name,
            max_trials = %self.config.half_open_max_trials,
            "Circuit HALF_OPEN: probing for recovery"
        );
        self.emit_state_gauge(CircuitState::HalfOpen);
    }

    /// Transition to closed state
    fn close(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Closed;
        inner.opened_at = None;
        inner.window.clear();
        inner.consecutive_failures = 0;
        inner.half_open_trials = 0;
        inner.half_open_successes = 0;

        info!(circuit = %self.name, "Circuit CLOSED: upstream recovered");
        self.emit_state_gauge(CircuitState::Closed);
    }

    fn emit_state_gauge(&self, state: CircuitState) {
        let value = match state {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        };
        gauge!("circuit_breaker_state", "breaker" => self.name.clone()).set(value);
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}

/// Formats a 0.0-1.0 rate as a percentage with one decimal
fn format_percentage(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}
