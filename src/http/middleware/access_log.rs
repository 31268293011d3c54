//! One structured record per request, on every exit path.

use crate::http::interceptor::{Completion, Interceptor, Outcome};
use crate::http::request::RequestContext;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLog;

impl AccessLog {
    /// Runs right after the source tag so it observes everything downstream.
    pub const PRIORITY: i32 = -90;
}

impl Interceptor for AccessLog {
    fn name(&self) -> &str {
        "access-log"
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn after(&self, ctx: &RequestContext, completion: &Completion) {
        let remote = ctx
            .remote_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let outcome = match &completion.outcome {
            Outcome::Completed => "completed",
            Outcome::ShortCircuited { .. } => "short_circuited",
            Outcome::Failed => "failed",
            Outcome::Cancelled => "cancelled",
        };

        tracing::info!(
            request_id = %ctx.request_id(),
            method = %ctx.method,
            path = %ctx.path,
            remote = %remote,
            elapsed_ms = completion.elapsed.as_millis() as u64,
            status = completion.status,
            outcome,
            "Request completed"
        );
        metrics::record_request(ctx.method.as_str(), completion.status, completion.elapsed);
    }
}
