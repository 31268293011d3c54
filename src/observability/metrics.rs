//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_calls_total` (counter): guarded calls by resource, outcome
//! - `guard_blocked_total` (counter): blocked calls by resource, reason
//! - `guard_call_duration_seconds` (histogram): latency of admitted calls
//! - `guard_circuit_transitions_total` (counter): circuit changes by resource, target state
//! - `gateway_requests_total` (counter): gateway requests by method, status
//! - `gateway_request_duration_seconds` (histogram): gateway latency
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(LATENCY_BUCKETS)?
        .install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_call(resource: &str, outcome: &'static str, latency: Duration) {
    counter!(
        "guard_calls_total",
        "resource" => resource.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    if outcome != "blocked" {
        histogram!("guard_call_duration_seconds", "resource" => resource.to_string())
            .record(latency.as_secs_f64());
    }
}

pub fn record_blocked(resource: &str, reason: &'static str) {
    counter!(
        "guard_blocked_total",
        "resource" => resource.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_transition(resource: &str, to: &str) {
    counter!(
        "guard_circuit_transitions_total",
        "resource" => resource.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

pub fn record_request(method: &str, status: u16, elapsed: Duration) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "method" => method.to_string())
        .record(elapsed.as_secs_f64());
}
