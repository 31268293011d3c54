//! Circuit breaker for resource protection.
//!
//! # States
//! - Closed: normal operation, calls pass through and feed the window
//! - Open: resource assumed unhealthy, calls are blocked
//! - Half-Open: a probe quota of calls tests whether it recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: error or slow ratio >= threshold over the window,
//!                with at least min_request_amount calls and at
//!                least one failed (or slow) call among them
//! Open → Half-Open: after the cool-down (checked on the next decision)
//! Half-Open → Closed: probe_quota consecutive probe successes
//! Half-Open → Open: any probe failure, cool-down restarts
//! ```
//!
//! # Design Decisions
//! - One breaker per bucket (resource, or resource + hotkey value)
//! - Breakers are plain state, mutated under the owning bucket's lock
//! - Each Half-Open cycle has a generation so that outcomes of calls
//!   admitted in an earlier cycle never count as probes

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::resilience::descriptor::ResourceDescriptor;
use crate::resilience::window::WindowCounts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => f.write_str("closed"),
            CircuitState::Open => f.write_str("open"),
            CircuitState::HalfOpen => f.write_str("half_open"),
        }
    }
}

/// Why a circuit left `Closed` or `HalfOpen` for `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripCause {
    ErrorRatio,
    SlowCallRatio,
    ProbeFailed,
}

impl fmt::Display for TripCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripCause::ErrorRatio => f.write_str("error-ratio"),
            TripCause::SlowCallRatio => f.write_str("slow-call-ratio"),
            TripCause::ProbeFailed => f.write_str("probe-failed"),
        }
    }
}

/// A state change, reported to the caller for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
    pub cause: Option<TripCause>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitState,
    retry_at: Option<Instant>,
    generation: u64,
    probes_admitted: u32,
    probe_successes: u32,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            retry_at: None,
            generation: 0,
            probes_admitted: 0,
            probe_successes: 0,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn probes_admitted(&self) -> u32 {
        self.probes_admitted
    }

    /// Move `Open` to `HalfOpen` once the cool-down has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<Transition> {
        match (self.state, self.retry_at) {
            (CircuitState::Open, Some(retry_at)) if now >= retry_at => {
                self.state = CircuitState::HalfOpen;
                self.retry_at = None;
                self.generation += 1;
                self.probes_admitted = 0;
                self.probe_successes = 0;
                Some(Transition {
                    from: CircuitState::Open,
                    to: CircuitState::HalfOpen,
                    cause: None,
                })
            }
            _ => None,
        }
    }

    /// Count an admitted probe. Returns the cycle it belongs to.
    pub fn admit_probe(&mut self) -> u64 {
        self.probes_admitted += 1;
        self.generation
    }

    /// Open the circuit for `cooldown`.
    pub fn trip(&mut self, now: Instant, cooldown: Duration, cause: TripCause) -> Transition {
        let from = self.state;
        self.state = CircuitState::Open;
        self.retry_at = Some(now + cooldown);
        self.probes_admitted = 0;
        self.probe_successes = 0;
        Transition {
            from,
            to: CircuitState::Open,
            cause: Some(cause),
        }
    }

    /// Feed a probe outcome from the current `HalfOpen` cycle.
    pub fn on_probe(
        &mut self,
        now: Instant,
        failed: bool,
        descriptor: &ResourceDescriptor,
    ) -> Option<Transition> {
        if self.state != CircuitState::HalfOpen {
            return None;
        }
        if failed {
            return Some(self.trip(now, descriptor.cooldown, TripCause::ProbeFailed));
        }
        self.probe_successes += 1;
        if self.probe_successes >= descriptor.probe_quota {
            self.state = CircuitState::Closed;
            self.probes_admitted = 0;
            self.probe_successes = 0;
            return Some(Transition {
                from: CircuitState::HalfOpen,
                to: CircuitState::Closed,
                cause: None,
            });
        }
        None
    }
}

/// Decide whether `Closed` statistics warrant opening the circuit.
pub fn should_trip(counts: &WindowCounts, descriptor: &ResourceDescriptor) -> Option<TripCause> {
    if counts.total < u64::from(descriptor.min_request_amount) || counts.total == 0 {
        return None;
    }
    if let Some(threshold) = descriptor.error_ratio_threshold {
        if counts.errors > 0 && counts.error_ratio() >= threshold {
            return Some(TripCause::ErrorRatio);
        }
    }
    if let Some(threshold) = descriptor.slow_call_ratio_threshold {
        if counts.slow > 0 && counts.slow_ratio() >= threshold {
            return Some(TripCause::SlowCallRatio);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor::new("r")
            .error_ratio(0.5, Duration::from_secs(1))
            .min_request_amount(4)
            .probe_quota(2)
            .cooldown(Duration::from_secs(5))
    }

    #[test]
    fn test_should_trip_respects_sample_floor() {
        let d = descriptor();
        let sparse = WindowCounts { total: 3, errors: 3, slow: 0 };
        assert_eq!(should_trip(&sparse, &d), None);

        let busy = WindowCounts { total: 4, errors: 2, slow: 0 };
        assert_eq!(should_trip(&busy, &d), Some(TripCause::ErrorRatio));

        let healthy = WindowCounts { total: 10, errors: 1, slow: 0 };
        assert_eq!(should_trip(&healthy, &d), None);
    }

    #[test]
    fn test_should_trip_on_slow_ratio() {
        let d = ResourceDescriptor::new("r")
            .slow_calls(Duration::from_millis(200), 0.5)
            .min_request_amount(2);
        let counts = WindowCounts { total: 4, errors: 0, slow: 2 };
        assert_eq!(should_trip(&counts, &d), Some(TripCause::SlowCallRatio));
    }

    #[test]
    fn test_zero_threshold_needs_at_least_one_bad_call() {
        let d = ResourceDescriptor::new("r")
            .error_ratio(0.0, Duration::from_secs(10))
            .slow_calls(Duration::from_millis(200), 0.0)
            .min_request_amount(1);
        let clean = WindowCounts { total: 8, errors: 0, slow: 0 };
        assert_eq!(should_trip(&clean, &d), None);

        let one_error = WindowCounts { total: 8, errors: 1, slow: 0 };
        assert_eq!(should_trip(&one_error, &d), Some(TripCause::ErrorRatio));

        let one_slow = WindowCounts { total: 8, errors: 0, slow: 1 };
        assert_eq!(should_trip(&one_slow, &d), Some(TripCause::SlowCallRatio));
    }

    #[test]
    fn test_full_cycle() {
        let d = descriptor();
        let mut breaker = CircuitBreaker::new();
        let start = Instant::now();

        let t = breaker.trip(start, d.cooldown, TripCause::ErrorRatio);
        assert_eq!((t.from, t.to), (CircuitState::Closed, CircuitState::Open));

        assert!(breaker.poll(start + Duration::from_secs(4)).is_none());
        assert_eq!(breaker.state(), CircuitState::Open);

        let t = breaker.poll(start + Duration::from_secs(5)).unwrap();
        assert_eq!(t.to, CircuitState::HalfOpen);
        let generation = breaker.admit_probe();
        assert_eq!(generation, breaker.generation());

        let now = start + Duration::from_secs(5);
        assert!(breaker.on_probe(now, false, &d).is_none());
        let t = breaker.on_probe(now, false, &d).unwrap();
        assert_eq!(t.to, CircuitState::Closed);
    }

    #[test]
    fn test_probe_failure_restarts_cooldown() {
        let d = descriptor();
        let mut breaker = CircuitBreaker::new();
        let start = Instant::now();
        breaker.trip(start, d.cooldown, TripCause::ErrorRatio);
        breaker.poll(start + Duration::from_secs(5));

        let failed_at = start + Duration::from_secs(6);
        let t = breaker.on_probe(failed_at, true, &d).unwrap();
        assert_eq!(t.cause, Some(TripCause::ProbeFailed));

        assert!(breaker.poll(start + Duration::from_secs(10)).is_none());
        assert!(breaker.poll(failed_at + d.cooldown).is_some());
    }
}
