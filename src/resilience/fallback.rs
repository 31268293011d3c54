//! Fallback dispatch.
//!
//! Blocked calls go to the resource's block handler (or the generic busy
//! response). Failed calls go to its fallback handler, or the original
//! error is handed back untouched. A handler returning an error becomes a
//! `HandlerFailure`, never a copy of the operation error.

use crate::resilience::admission::BlockReason;
use crate::resilience::descriptor::ResourceDescriptor;
use crate::resilience::error::{HandlerFailure, HandlerPhase};
use crate::resilience::handlers::CallArgs;
use crate::resilience::response::Response;

/// What became of a failed call.
#[derive(Debug)]
pub enum FailureRoute<E> {
    /// The fallback handler produced a degraded response.
    Degraded(serde_json::Value),
    /// No fallback is registered; the cause goes back to the caller.
    Propagate(E),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackDispatcher;

impl FallbackDispatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn on_block<T>(
        &self,
        descriptor: &ResourceDescriptor,
        reason: BlockReason,
        args: &CallArgs,
    ) -> Result<Response<T>, HandlerFailure> {
        let Some(handler) = &descriptor.block_handler else {
            return Ok(Response::busy(reason));
        };

        handler
            .call(args, reason)
            .map(|body| Response::Blocked { reason, body })
            .map_err(|cause| {
                tracing::error!(
                    resource = %descriptor.name,
                    handler = %handler.name(),
                    error = %cause,
                    "Block handler failed"
                );
                HandlerFailure {
                    resource: descriptor.name.clone(),
                    phase: HandlerPhase::Block,
                    cause,
                }
            })
    }

    pub fn on_failure<E>(
        &self,
        descriptor: &ResourceDescriptor,
        cause: E,
        args: &CallArgs,
    ) -> Result<FailureRoute<E>, HandlerFailure>
    where
        E: std::error::Error + 'static,
    {
        let Some(handler) = &descriptor.fallback_handler else {
            return Ok(FailureRoute::Propagate(cause));
        };

        tracing::warn!(
            resource = %descriptor.name,
            handler = %handler.name(),
            error = %cause,
            "Operation failed, serving fallback"
        );
        match handler.call(args, &cause) {
            Ok(body) => Ok(FailureRoute::Degraded(body)),
            Err(handler_error) => {
                tracing::error!(
                    resource = %descriptor.name,
                    handler = %handler.name(),
                    error = %handler_error,
                    original_error = %cause,
                    "Fallback handler failed"
                );
                Err(HandlerFailure {
                    resource: descriptor.name.clone(),
                    phase: HandlerPhase::Fallback,
                    cause: handler_error,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::resilience::handlers::{BlockHandler, FallbackHandler};
    use crate::resilience::response::ResponseStatus;

    #[derive(Debug, thiserror::Error)]
    #[error("database connection lost")]
    struct DbError;

    #[test]
    fn test_block_without_handler_is_busy() {
        let descriptor = ResourceDescriptor::new("r");
        let response: Response<()> = FallbackDispatcher::new()
            .on_block(&descriptor, BlockReason::Rate, &CallArgs::new())
            .unwrap();
        assert_eq!(response.status(), ResponseStatus::Busy);
    }

    #[test]
    fn test_block_handler_receives_args() {
        let descriptor = ResourceDescriptor::new("product-hotkey").block_handler(BlockHandler::new(
            "hotkey",
            |args, reason| Ok(json!(format!("{} blocked by {reason}", args.hotkey(0).unwrap_or_default()))),
        ));
        let args = CallArgs::new().with("42");

        let response: Response<()> = FallbackDispatcher::new()
            .on_block(&descriptor, BlockReason::Rate, &args)
            .unwrap();
        assert_eq!(
            response,
            Response::Blocked {
                reason: BlockReason::Rate,
                body: json!("42 blocked by rate"),
            }
        );
    }

    #[test]
    fn test_failure_without_fallback_propagates_cause() {
        let descriptor = ResourceDescriptor::new("lookup-user");
        let route = FallbackDispatcher::new()
            .on_failure(&descriptor, DbError, &CallArgs::new())
            .unwrap();
        assert!(matches!(route, FailureRoute::Propagate(DbError)));
    }

    #[test]
    fn test_fallback_handler_sees_cause() {
        let descriptor = ResourceDescriptor::new("lookup-user").fallback_handler(FallbackHandler::new(
            "degraded",
            |_, cause| Ok(json!({ "error": cause.to_string() })),
        ));
        let route = FallbackDispatcher::new()
            .on_failure(&descriptor, DbError, &CallArgs::new())
            .unwrap();
        match route {
            FailureRoute::Degraded(body) => assert_eq!(body["error"], "database connection lost"),
            FailureRoute::Propagate(_) => panic!("expected degraded response"),
        }
    }

    #[test]
    fn test_failing_handler_is_reported_separately() {
        let descriptor = ResourceDescriptor::new("lookup-user").fallback_handler(FallbackHandler::new(
            "broken",
            |_, _| Err("cache offline".into()),
        ));
        let failure = FallbackDispatcher::new()
            .on_failure(&descriptor, DbError, &CallArgs::new())
            .unwrap_err();
        assert_eq!(failure.phase, HandlerPhase::Fallback);
        assert_eq!(failure.cause.to_string(), "cache offline");
    }
}
