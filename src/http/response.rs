//! Mapping guard results onto HTTP responses.
//!
//! - `Success`  → 200, `{"status":"success","data":…}`
//! - `Blocked`  → 429, block handler body
//! - `Busy`     → 429, generic busy message
//! - `Degraded` → 200 with `x-degraded: true`, fallback body
//!
//! Hard errors become `ApiError` with a JSON `{"error": …}` body.

use std::fmt::Display;

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::resilience::{GuardError, HandlerFailure, InvokeError, Response as GuardResponse};

pub const X_DEGRADED: &str = "x-degraded";

impl<T: Serialize> IntoResponse for GuardResponse<T> {
    fn into_response(self) -> Response {
        let status = match &self {
            GuardResponse::Success { .. } | GuardResponse::Degraded { .. } => StatusCode::OK,
            GuardResponse::Blocked { .. } | GuardResponse::Busy { .. } => StatusCode::TOO_MANY_REQUESTS,
        };
        let degraded = matches!(self, GuardResponse::Degraded { .. });

        let mut response = (status, Json(self)).into_response();
        if degraded {
            response
                .headers_mut()
                .insert(X_DEGRADED, HeaderValue::from_static("true"));
        }
        response
    }
}

/// Hard errors surfaced by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("upstream call failed: {0}")]
    Upstream(String),

    #[error(transparent)]
    Handler(#[from] HandlerFailure),

    #[error(transparent)]
    Guard(#[from] GuardError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Handler(_) | ApiError::Guard(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl<E: Display> From<InvokeError<E>> for ApiError {
    fn from(err: InvokeError<E>) -> Self {
        match err {
            InvokeError::Operation(cause) => ApiError::Upstream(cause.to_string()),
            InvokeError::Handler(failure) => ApiError::Handler(failure),
            InvokeError::Guard(guard) => ApiError::Guard(guard),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
