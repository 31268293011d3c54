//! Admission control.
//!
//! # Decision Order
//! ```text
//! 1. circuit Open, cool-down pending      → BLOCK circuit-open
//! 2. circuit Half-Open, probes exhausted  → BLOCK circuit-probing
//! 3. in-flight >= concurrency_limit       → BLOCK concurrency
//! 4. admits in trailing 1s >= qps_limit   → BLOCK rate
//! 5. otherwise                            → ALLOW (+1 in-flight)
//! ```
//!
//! Each step is an independent predicate over a counters snapshot, run in
//! a fixed list. The first one that blocks wins.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::resilience::bucket::{Bucket, Grant};
use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::error::GuardError;
use crate::resilience::recorder;
use crate::resilience::registry::{ResourceEntry, ResourceRegistry};

/// Why a call was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockReason {
    CircuitOpen,
    CircuitProbing,
    Concurrency,
    Rate,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::CircuitOpen => "circuit-open",
            BlockReason::CircuitProbing => "circuit-probing",
            BlockReason::Concurrency => "concurrency",
            BlockReason::Rate => "rate",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters and limits a guard predicate looks at.
#[derive(Debug, Clone, Copy)]
pub struct GuardInput {
    pub circuit: CircuitState,
    pub probes_admitted: u32,
    pub probe_quota: u32,
    pub in_flight: u32,
    pub concurrency_limit: u32,
    pub recent_admits: usize,
    pub qps_limit: u32,
}

type Guard = fn(&GuardInput) -> Option<BlockReason>;

const GUARDS: [Guard; 4] = [circuit_open, circuit_probing, concurrency, rate];

fn circuit_open(input: &GuardInput) -> Option<BlockReason> {
    (input.circuit == CircuitState::Open).then_some(BlockReason::CircuitOpen)
}

fn circuit_probing(input: &GuardInput) -> Option<BlockReason> {
    (input.circuit == CircuitState::HalfOpen && input.probes_admitted >= input.probe_quota)
        .then_some(BlockReason::CircuitProbing)
}

fn concurrency(input: &GuardInput) -> Option<BlockReason> {
    (input.concurrency_limit > 0 && input.in_flight >= input.concurrency_limit)
        .then_some(BlockReason::Concurrency)
}

fn rate(input: &GuardInput) -> Option<BlockReason> {
    (input.qps_limit > 0 && input.recent_admits >= input.qps_limit as usize).then_some(BlockReason::Rate)
}

/// Run the guards in order and return the first block reason.
pub fn evaluate(input: &GuardInput) -> Option<BlockReason> {
    GUARDS.iter().find_map(|guard| guard(input))
}

/// An admitted call holding one in-flight slot.
///
/// Hand it back through [`OutcomeRecorder::record`](super::recorder::OutcomeRecorder::record).
/// A permit dropped without being recorded settles itself as an error with
/// a cancellation cause, so the slot is never leaked.
pub struct Permit {
    pub(crate) entry: Arc<ResourceEntry>,
    pub(crate) bucket: Arc<Bucket>,
    pub(crate) grant: Grant,
    hotkey: Option<String>,
    started: Instant,
    pub(crate) settled: bool,
}

impl Permit {
    pub fn resource(&self) -> &str {
        &self.entry.descriptor().name
    }

    pub fn hotkey(&self) -> Option<&str> {
        self.hotkey.as_deref()
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// True when this call is a Half-Open recovery probe.
    pub fn is_probe(&self) -> bool {
        self.grant.probe.is_some()
    }
}

impl fmt::Debug for Permit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit")
            .field("resource", &self.resource())
            .field("hotkey", &self.hotkey)
            .field("probe", &self.grant.probe)
            .finish()
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if !self.settled {
            self.settled = true;
            recorder::settle_cancelled(self);
        }
    }
}

/// Outcome of [`AdmissionController::decide`].
#[derive(Debug)]
pub enum Decision {
    Allow(Permit),
    Block(BlockReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }

    pub fn block_reason(&self) -> Option<BlockReason> {
        match self {
            Decision::Block(reason) => Some(*reason),
            Decision::Allow(_) => None,
        }
    }
}

/// Decides ALLOW / BLOCK per call attempt.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    registry: Arc<ResourceRegistry>,
}

impl AdmissionController {
    pub fn new(registry: Arc<ResourceRegistry>) -> Self {
        Self { registry }
    }

    /// Decide whether a call to `resource` may proceed.
    ///
    /// `hotkey` only has an effect when the resource declares a hotkey
    /// dimension.
    pub fn decide(&self, resource: &str, hotkey: Option<&str>) -> Result<Decision, GuardError> {
        let entry = self.registry.lookup(resource)?;
        Ok(self.decide_entry(&entry, hotkey))
    }

    pub(crate) fn decide_entry(&self, entry: &Arc<ResourceEntry>, hotkey: Option<&str>) -> Decision {
        let descriptor = entry.descriptor();
        let hotkey = hotkey.filter(|_| descriptor.hotkey_dimension.is_some());
        let bucket = entry.buckets().bucket(descriptor, hotkey);
        let now = Instant::now();

        let (verdict, transition) = bucket.try_admit(descriptor, now);
        if let Some(transition) = transition {
            recorder::report_transition(&descriptor.name, hotkey, transition);
        }

        match verdict {
            Ok(grant) => {
                tracing::debug!(
                    resource = %descriptor.name,
                    hotkey = ?hotkey,
                    probe = grant.probe.is_some(),
                    "Call admitted"
                );
                Decision::Allow(Permit {
                    entry: entry.clone(),
                    bucket,
                    grant,
                    hotkey: hotkey.map(str::to_owned),
                    started: now,
                    settled: false,
                })
            }
            Err(reason) => {
                metrics::record_blocked(&descriptor.name, reason.as_str());
                Decision::Block(reason)
            }
        }
    }
}
