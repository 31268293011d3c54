//! Resilient invocation wrapper.
//!
//! # Data Flow
//! ```text
//! invoke(resource, hotkey?, args, work)
//!     → registry lookup (NotFound is a hard error)
//!     → admission decision
//!         BLOCK → record_blocked → on_block → Response::Blocked / Busy
//!         ALLOW → work().await (at most once)
//!             → record outcome (exactly once, via the permit)
//!             → Ok  → Response::Success
//!             → Err → on_failure → Response::Degraded / InvokeError::Operation
//! ```
//!
//! The permit is owned by the future. If the caller drops the future while
//! the work is pending, the permit settles itself as a cancelled error.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use crate::resilience::admission::{AdmissionController, Decision};
use crate::resilience::error::InvokeError;
use crate::resilience::fallback::{FailureRoute, FallbackDispatcher};
use crate::resilience::handlers::CallArgs;
use crate::resilience::recorder::{CallOutcome, OutcomeRecorder};
use crate::resilience::registry::ResourceRegistry;
use crate::resilience::response::Response;

#[derive(Debug, Clone)]
pub struct ResilientInvoker {
    registry: Arc<ResourceRegistry>,
    controller: AdmissionController,
    recorder: OutcomeRecorder,
    dispatcher: FallbackDispatcher,
}

impl ResilientInvoker {
    pub fn new(registry: Arc<ResourceRegistry>) -> Self {
        Self {
            controller: AdmissionController::new(registry.clone()),
            registry,
            recorder: OutcomeRecorder::new(),
            dispatcher: FallbackDispatcher::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    pub fn controller(&self) -> &AdmissionController {
        &self.controller
    }

    /// Run `work` under the protection of `resource`.
    ///
    /// When `hotkey` is `None` and the resource declares a hotkey dimension,
    /// the value is taken from `args` at that index.
    pub async fn invoke<T, E, F, Fut>(
        &self,
        resource: &str,
        hotkey: Option<&str>,
        args: CallArgs,
        work: F,
    ) -> Result<Response<T>, InvokeError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        let entry = self.registry.lookup(resource)?;
        let descriptor = entry.descriptor();

        let derived = match (hotkey, descriptor.hotkey_dimension) {
            (Some(key), _) => Some(key.to_string()),
            (None, Some(index)) => args.hotkey(index),
            (None, None) => None,
        };

        let permit = match self.controller.decide_entry(&entry, derived.as_deref()) {
            Decision::Allow(permit) => permit,
            Decision::Block(reason) => {
                self.recorder.record_blocked(resource, derived.as_deref(), reason);
                return Ok(self.dispatcher.on_block(descriptor, reason, &args)?);
            }
        };

        let result = work().await;
        let latency = permit.elapsed();

        match result {
            Ok(value) => {
                self.recorder.record(permit, CallOutcome::Success, latency);
                Ok(Response::success(value))
            }
            Err(cause) => {
                self.recorder.record(permit, CallOutcome::Error, latency);
                match self.dispatcher.on_failure(descriptor, cause, &args)? {
                    FailureRoute::Degraded(body) => Ok(Response::Degraded { body }),
                    FailureRoute::Propagate(cause) => Err(InvokeError::Operation(cause)),
                }
            }
        }
    }

    /// Like [`invoke`](Self::invoke), for work that cannot fail.
    pub async fn invoke_infallible<T, F, Fut>(
        &self,
        resource: &str,
        hotkey: Option<&str>,
        args: CallArgs,
        work: F,
    ) -> Result<Response<T>, InvokeError<Infallible>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.invoke(resource, hotkey, args, || async move {
            Ok::<_, Infallible>(work().await)
        })
        .await
    }
}
