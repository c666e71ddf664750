//! Circuit breaker for a remote dependency such as the classifier service.
//!
//! Consecutive failures beyond a threshold *open* the circuit and callers
//! skip the dependency. After a cooldown the circuit goes *half-open* and
//! requests are allowed again: the next success closes it, the next failure
//! reopens it for another cooldown. Half-open does not limit concurrency.

use std::time::{Duration, Instant};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Healthy: requests allowed.
    Closed,
    /// Tripped: requests blocked until cooldown expires.
    Open,
    /// Cooldown expired: requests allowed until the next outcome is recorded.
    HalfOpen,
}

/// Consecutive-failure circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    trips: u64,
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Time after the last failure before Open → HalfOpen.
    pub cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            consecutive_failures: 0,
            last_failure: None,
            trips: 0,
            failure_threshold: failure_threshold.max(1),
            cooldown,
        }
    }

    /// Record a success: resets the circuit to Closed.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_failure = None;
    }

    /// Record a failure: may trip the circuit to Open, or reopen it from
    /// HalfOpen.
    pub fn record_failure(&mut self) {
        let reopening = self.state() == CircuitState::HalfOpen;
        self.consecutive_failures += 1;
        self.last_failure = Some(Instant::now());
        if reopening || self.consecutive_failures == self.failure_threshold {
            self.trips += 1;
            tracing::warn!(
                failures = self.consecutive_failures,
                cooldown_ms = self.cooldown.as_millis() as u64,
                "circuit opened"
            );
        }
    }

    pub fn state(&self) -> CircuitState {
        if self.consecutive_failures < self.failure_threshold {
            return CircuitState::Closed;
        }
        match self.last_failure {
            Some(at) if at.elapsed() < self.cooldown => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }

    /// Whether a request may be attempted (Closed or HalfOpen).
    pub fn is_available(&self) -> bool {
        !matches!(self.state(), CircuitState::Open)
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }

    /// How many times the circuit has opened.
    pub fn trips(&self) -> u64 {
        self.trips
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(30))
    }
}
