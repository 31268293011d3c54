//! Live state of one guarded bucket.
//!
//! A bucket is either a whole resource or one hotkey value of it. All of its
//! counters sit behind a single mutex, so deciding and incrementing the
//! in-flight count happen in one critical section, and recording an outcome
//! is linearizable with concurrent decisions. Unrelated buckets never share
//! a lock.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::resilience::admission::{evaluate, BlockReason, GuardInput};
use crate::resilience::circuit_breaker::{should_trip, CircuitBreaker, CircuitState, Transition};
use crate::resilience::descriptor::ResourceDescriptor;
use crate::resilience::window::{RateWindow, RollingWindow};

/// What the bucket granted an admitted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Grant {
    /// Half-Open cycle the call probes for, if it is a probe.
    pub probe: Option<u64>,
}

/// Result of settling a call against the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Settlement {
    pub slow: bool,
    pub transition: Option<Transition>,
}

#[derive(Debug)]
struct BucketState {
    breaker: CircuitBreaker,
    window: RollingWindow,
    rate: RateWindow,
    in_flight: u32,
}

#[derive(Debug)]
pub struct Bucket {
    state: Mutex<BucketState>,
}

impl Bucket {
    pub fn new(descriptor: &ResourceDescriptor) -> Self {
        Self {
            state: Mutex::new(BucketState {
                breaker: CircuitBreaker::new(),
                window: RollingWindow::new(descriptor.error_ratio_window),
                rate: RateWindow::default(),
                in_flight: 0,
            }),
        }
    }

    /// Evaluate the guards and, when they all pass, take an in-flight slot.
    pub(crate) fn try_admit(
        &self,
        descriptor: &ResourceDescriptor,
        now: Instant,
    ) -> (Result<Grant, BlockReason>, Option<Transition>) {
        let mut state = self.state.lock();
        let transition = state.breaker.poll(now);

        let recent_admits = if descriptor.qps_limit > 0 {
            state.rate.count(now)
        } else {
            0
        };
        let input = GuardInput {
            circuit: state.breaker.state(),
            probes_admitted: state.breaker.probes_admitted(),
            probe_quota: descriptor.probe_quota,
            in_flight: state.in_flight,
            concurrency_limit: descriptor.concurrency_limit,
            recent_admits,
            qps_limit: descriptor.qps_limit,
        };

        if let Some(reason) = evaluate(&input) {
            return (Err(reason), transition);
        }

        state.in_flight += 1;
        if descriptor.qps_limit > 0 {
            state.rate.push(now);
        }
        let probe = match state.breaker.state() {
            CircuitState::HalfOpen => Some(state.breaker.admit_probe()),
            _ => None,
        };
        (Ok(Grant { probe }), transition)
    }

    /// Release an in-flight slot and feed the outcome into the statistics.
    pub(crate) fn settle(
        &self,
        descriptor: &ResourceDescriptor,
        grant: Grant,
        failed: bool,
        latency: Duration,
        now: Instant,
    ) -> Settlement {
        let slow = descriptor
            .slow_call_threshold
            .is_some_and(|threshold| latency >= threshold);

        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);

        let transition = match (state.breaker.state(), grant.probe) {
            (CircuitState::HalfOpen, Some(generation)) if generation == state.breaker.generation() => {
                let probe_failed = failed || (slow && descriptor.slow_call_ratio_threshold.is_some());
                let transition = state.breaker.on_probe(now, probe_failed, descriptor);
                if matches!(transition, Some(t) if t.to == CircuitState::Closed) {
                    state.window.reset();
                }
                transition
            }
            (CircuitState::Closed, _) => {
                state.window.record(now, failed, slow);
                let counts = state.window.counts(now);
                should_trip(&counts, descriptor)
                    .map(|cause| state.breaker.trip(now, descriptor.cooldown, cause))
            }
            // Outcome of a call admitted in an earlier cycle.
            _ => None,
        };

        Settlement { slow, transition }
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.state.lock().breaker.state()
    }

    pub fn in_flight(&self) -> u32 {
        self.state.lock().in_flight
    }

    /// No calls running and the circuit closed. Only idle buckets may be evicted.
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.in_flight == 0 && state.breaker.state() == CircuitState::Closed
    }
}
