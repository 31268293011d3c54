//! Responses produced by the guard.

use serde::Serialize;
use serde_json::Value;

use crate::resilience::admission::BlockReason;

/// Message used when a blocked resource has no block handler.
pub const SERVICE_BUSY: &str = "service busy, please retry later";

/// Result of a guarded call that did not end in a hard error.
///
/// Only `Success` carries the operation's value. Every other variant is a
/// degraded-mode response and is never success-shaped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    /// The unit of work ran and returned a value.
    Success { data: T },
    /// Admission blocked the call and the block handler produced `body`.
    Blocked { reason: BlockReason, body: Value },
    /// Admission blocked the call and no block handler is registered.
    Busy { reason: BlockReason, message: &'static str },
    /// The unit of work failed and the fallback handler produced `body`.
    Degraded { body: Value },
}

/// Stable status of a [`Response`], independent of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Blocked,
    Busy,
    Degraded,
}

impl<T> Response<T> {
    pub fn success(data: T) -> Self {
        Response::Success { data }
    }

    pub fn busy(reason: BlockReason) -> Self {
        Response::Busy {
            reason,
            message: SERVICE_BUSY,
        }
    }

    pub fn status(&self) -> ResponseStatus {
        match self {
            Response::Success { .. } => ResponseStatus::Success,
            Response::Blocked { .. } => ResponseStatus::Blocked,
            Response::Busy { .. } => ResponseStatus::Busy,
            Response::Degraded { .. } => ResponseStatus::Degraded,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success { .. })
    }

    /// The block reason for `Blocked` and `Busy` responses.
    pub fn block_reason(&self) -> Option<BlockReason> {
        match self {
            Response::Blocked { reason, .. } | Response::Busy { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn into_success(self) -> Option<T> {
        match self {
            Response::Success { data } => Some(data),
            _ => None,
        }
    }

    /// Change the success payload type, leaving degraded variants untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Response<U> {
        match self {
            Response::Success { data } => Response::Success { data: f(data) },
            Response::Blocked { reason, body } => Response::Blocked { reason, body },
            Response::Busy { reason, message } => Response::Busy { reason, message },
            Response::Degraded { body } => Response::Degraded { body },
        }
    }
}
