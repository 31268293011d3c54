//! Error taxonomy for the guard.
//!
//! Admission blocks are not errors; they surface as `Response::Blocked`
//! or `Response::Busy`. Only configuration mistakes, handler failures and
//! unhandled operation errors reach the caller as `Err`.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Boxed error used for handler failures and type-erased causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Configuration-time errors, fatal to startup.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("resource `{0}` is already registered with a different descriptor")]
    DuplicateResource(String),

    #[error("resource `{0}` is not registered")]
    NotFound(String),

    #[error("{phase} handler `{handler}` referenced by resource `{resource}` is not registered")]
    UnknownHandler {
        resource: String,
        phase: HandlerPhase,
        handler: String,
    },

    #[error("invalid descriptor for resource `{resource}`: {reason}")]
    InvalidDescriptor { resource: String, reason: String },
}

/// Which degraded-mode path a handler belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerPhase {
    Block,
    Fallback,
}

impl fmt::Display for HandlerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerPhase::Block => f.write_str("block"),
            HandlerPhase::Fallback => f.write_str("fallback"),
        }
    }
}

/// A block or fallback handler itself failed.
///
/// Always propagated, and never merged with the operation error that
/// triggered the fallback.
#[derive(Debug, Error)]
#[error("{phase} handler for resource `{resource}` failed: {cause}")]
pub struct HandlerFailure {
    pub resource: String,
    pub phase: HandlerPhase,
    #[source]
    pub cause: BoxError,
}

/// Cause recorded when a caller abandons an admitted call.
#[derive(Debug, Error)]
#[error("call to resource `{0}` was cancelled before completion")]
pub struct Cancelled(pub String);

/// Errors returned by [`ResilientInvoker::invoke`](super::invoke::ResilientInvoker::invoke).
#[derive(Debug, Error)]
pub enum InvokeError<E> {
    /// The unit of work failed and the resource has no fallback handler.
    #[error(transparent)]
    Operation(E),

    #[error(transparent)]
    Handler(#[from] HandlerFailure),

    #[error(transparent)]
    Guard(#[from] GuardError),
}

impl<E> InvokeError<E> {
    /// Return the original operation error, if that is what this is.
    pub fn into_operation(self) -> Option<E> {
        match self {
            InvokeError::Operation(e) => Some(e),
            _ => None,
        }
    }
}
