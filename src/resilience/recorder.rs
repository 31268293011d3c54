//! Outcome recording.
//!
//! # Responsibilities
//! - Release the in-flight slot of every admitted call exactly once
//! - Feed success / error / latency into the bucket's rolling window
//! - Classify slow calls (latency >= slow_call_threshold), even successful ones
//! - Log and count blocked attempts and circuit transitions

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::resilience::admission::{BlockReason, Permit};
use crate::resilience::circuit_breaker::Transition;
use crate::resilience::error::Cancelled;

/// Outcome of one call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallOutcome {
    Success,
    Error,
    Blocked,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::Error => "error",
            CallOutcome::Blocked => "blocked",
        }
    }
}

impl fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OutcomeRecorder;

impl OutcomeRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Settle an admitted call.
    ///
    /// `CallOutcome::Blocked` is not a valid outcome for an admitted call and
    /// is counted as an error.
    pub fn record(&self, mut permit: Permit, outcome: CallOutcome, latency: Duration) {
        permit.settled = true;
        let failed = outcome != CallOutcome::Success;
        settle(&permit, failed, latency);
    }

    /// Note a call that admission rejected. In-flight is untouched.
    pub fn record_blocked(&self, resource: &str, hotkey: Option<&str>, reason: BlockReason) {
        tracing::warn!(
            resource = %resource,
            hotkey = ?hotkey,
            reason = %reason,
            outcome = %CallOutcome::Blocked,
            "Call blocked"
        );
        metrics::record_call(resource, CallOutcome::Blocked.as_str(), Duration::ZERO);
    }
}

fn settle(permit: &Permit, failed: bool, latency: Duration) {
    let descriptor = permit.entry.descriptor();
    let settlement = permit
        .bucket
        .settle(descriptor, permit.grant, failed, latency, Instant::now());

    let outcome = if failed {
        CallOutcome::Error
    } else {
        CallOutcome::Success
    };
    tracing::debug!(
        resource = %descriptor.name,
        hotkey = ?permit.hotkey(),
        outcome = %outcome,
        latency_ms = latency.as_millis() as u64,
        slow = settlement.slow,
        "Call recorded"
    );
    metrics::record_call(&descriptor.name, outcome.as_str(), latency);

    if let Some(transition) = settlement.transition {
        report_transition(&descriptor.name, permit.hotkey(), transition);
    }
}

/// Settle a permit that was dropped before its outcome was recorded.
pub(crate) fn settle_cancelled(permit: &Permit) {
    let cause = Cancelled(permit.resource().to_string());
    tracing::warn!(
        resource = %permit.resource(),
        hotkey = ?permit.hotkey(),
        error = %cause,
        "Releasing abandoned call"
    );
    settle(permit, true, permit.elapsed());
}

pub(crate) fn report_transition(resource: &str, hotkey: Option<&str>, transition: Transition) {
    tracing::info!(
        resource = %resource,
        hotkey = ?hotkey,
        from = %transition.from,
        to = %transition.to,
        cause = ?transition.cause.map(|c| c.to_string()),
        "Circuit state changed"
    );
    metrics::record_transition(resource, &transition.to.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::resilience::admission::{AdmissionController, Decision};
    use crate::resilience::circuit_breaker::CircuitState;
    use crate::resilience::descriptor::ResourceDescriptor;
    use crate::resilience::registry::ResourceRegistry;

    fn admit(controller: &AdmissionController, name: &str) -> Permit {
        match controller.decide(name, None).unwrap() {
            Decision::Allow(permit) => permit,
            Decision::Block(reason) => panic!("unexpected block: {reason}"),
        }
    }

    #[test]
    fn test_record_releases_in_flight() {
        let registry = Arc::new(ResourceRegistry::new());
        let entry = registry.register(ResourceDescriptor::new("r")).unwrap();
        let controller = AdmissionController::new(registry);
        let recorder = OutcomeRecorder::new();

        let permit = admit(&controller, "r");
        assert_eq!(entry.snapshot().in_flight, 1);
        recorder.record(permit, CallOutcome::Success, Duration::from_millis(3));
        assert_eq!(entry.snapshot().in_flight, 0);
    }

    #[test]
    fn test_slow_successes_trip_slow_ratio() {
        let registry = Arc::new(ResourceRegistry::new());
        let entry = registry
            .register(
                ResourceDescriptor::new("user-slow")
                    .slow_calls(Duration::from_millis(100), 0.5)
                    .min_request_amount(2),
            )
            .unwrap();
        let controller = AdmissionController::new(registry);
        let recorder = OutcomeRecorder::new();

        for _ in 0..2 {
            let permit = admit(&controller, "user-slow");
            recorder.record(permit, CallOutcome::Success, Duration::from_millis(250));
        }
        assert_eq!(entry.snapshot().circuit, CircuitState::Open);
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let registry = Arc::new(ResourceRegistry::new());
        let entry = registry.register(ResourceDescriptor::new("r")).unwrap();
        let controller = AdmissionController::new(registry);

        let permits: Vec<_> = (0..64).map(|_| admit(&controller, "r")).collect();
        assert_eq!(entry.snapshot().in_flight, 64);

        std::thread::scope(|scope| {
            for permit in permits {
                scope.spawn(move || {
                    OutcomeRecorder::new().record(permit, CallOutcome::Success, Duration::ZERO);
                });
            }
        });
        assert_eq!(entry.snapshot().in_flight, 0);
    }
}
