//! Guarded demo endpoints under `/api/sentinel`.
//!
//! Each endpoint protects one resource named `{service}-{endpoint}` and
//! exercises one guard feature: rate limiting, slow-call breaking,
//! error-ratio breaking, hotkey limiting and concurrency limiting.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::Router;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::resilience::{CallArgs, HandlerTable, Response};
use crate::services::remote::{user_unavailable, USER_UNAVAILABLE};

#[derive(Debug, Error)]
pub enum DemoError {
    #[error("simulated {service} service failure (roll {roll})")]
    Simulated { service: String, roll: u32 },

    #[error("database connection lost")]
    Database,
}

#[derive(Debug, Deserialize)]
pub struct SlowParams {
    #[serde(default = "default_delay")]
    pub delay: u64,
}

fn default_delay() -> u64 {
    1_500
}

#[derive(Debug, Deserialize)]
pub struct ExceptionParams {
    #[serde(default = "default_error_rate", rename = "errorRate")]
    pub error_rate: u32,
}

fn default_error_rate() -> u32 {
    30
}

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

fn title(service: &str) -> String {
    let mut chars = service.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Register the block and fallback handlers the demo resources refer to.
pub fn register_handlers(table: &mut HandlerTable, service: &str) {
    let name = title(service);
    let id_of = |args: &CallArgs| args.hotkey(0).unwrap_or_default();

    let busy = format!("{name} service busy, please retry later");
    table.register_block(&format!("{service}-test-block"), move |_, _| Ok(json!(busy)));

    let slow_blocked = format!("{name} slow call blocked, please retry later");
    table.register_block(&format!("{service}-slow-block"), move |_, _| Ok(json!(slow_blocked)));
    let slow_degraded = format!("{name} slow call degraded - system busy");
    table.register_fallback(&format!("{service}-slow-fallback"), move |_, _| {
        Ok(json!(slow_degraded))
    });

    let exception_blocked = format!("{name} exception endpoint blocked, please retry later");
    table.register_block(&format!("{service}-exception-block"), move |_, _| {
        Ok(json!(exception_blocked))
    });
    let exception_degraded = format!("{name} exception endpoint degraded - temporarily unavailable");
    table.register_fallback(&format!("{service}-exception-fallback"), move |_, _| {
        Ok(json!(exception_degraded))
    });

    let hotkey_name = name.clone();
    table.register_block(&format!("{service}-hotkey-block"), move |args, _| {
        Ok(json!(format!(
            "{hotkey_name} {} requested too often, please retry later",
            id_of(args)
        )))
    });

    table
        .register_block(&format!("{service}-inventory-block"), move |args, _| {
            Ok(json!(format!("Inventory lookup rate limited, id: {}", id_of(args))))
        })
        .register_fallback(&format!("{service}-inventory-fallback"), move |args, _| {
            Ok(json!(format!("Inventory temporarily unavailable, id: {}", id_of(args))))
        })
        .register_fallback(USER_UNAVAILABLE, |_, cause| Ok(user_unavailable(cause)));
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sentinel/test", get(test))
        .route("/api/sentinel/slow", get(slow))
        .route("/api/sentinel/exception", get(exception))
        .route("/api/sentinel/hotkey/{id}", get(hotkey))
        .route("/api/sentinel/inventory/{id}", get(inventory))
        .route("/api/sentinel/status", get(status))
}

fn resource(state: &AppState, endpoint: &str) -> String {
    format!("{}-{endpoint}", state.config.app.service_name)
}

async fn test(State(state): State<AppState>) -> Result<Response<String>, ApiError> {
    let name = title(&state.config.app.service_name);
    let response = state
        .invoker
        .invoke_infallible(&resource(&state, "test"), None, CallArgs::new(), || async move {
            tracing::info!("Test endpoint called");
            format!("{name} service OK - {}", now_ms())
        })
        .await?;
    Ok(response)
}

async fn slow(
    State(state): State<AppState>,
    Query(params): Query<SlowParams>,
) -> Result<Response<String>, ApiError> {
    let name = title(&state.config.app.service_name);
    let delay = params.delay;
    let response = state
        .invoker
        .invoke(
            &resource(&state, "slow"),
            None,
            CallArgs::new().with(delay),
            || async move {
                tracing::info!(delay_ms = delay, "Slow endpoint called");
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok::<_, DemoError>(format!("{name} slow call finished after {delay}ms"))
            },
        )
        .await?;
    Ok(response)
}

async fn exception(
    State(state): State<AppState>,
    Query(params): Query<ExceptionParams>,
) -> Result<Response<String>, ApiError> {
    let service = state.config.app.service_name.clone();
    let error_rate = params.error_rate;
    let response = state
        .invoker
        .invoke(
            &resource(&state, "exception"),
            None,
            CallArgs::new().with(error_rate),
            || async move {
                let roll = rand::thread_rng().gen_range(0..100);
                tracing::info!(error_rate, roll, "Exception endpoint called");
                if roll < error_rate {
                    return Err(DemoError::Simulated { service, roll });
                }
                Ok(format!("{} exception endpoint OK - roll {roll}", title(&service)))
            },
        )
        .await?;
    Ok(response)
}

async fn hotkey(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response<String>, ApiError> {
    let name = title(&state.config.app.service_name);
    let args = CallArgs::new().with(id.clone());
    let response = state
        .invoker
        .invoke_infallible(&resource(&state, "hotkey"), None, args, || async move {
            tracing::info!(id = %id, "Hotkey lookup");
            format!("{name} lookup succeeded - id: {id}")
        })
        .await?;
    Ok(response)
}

async fn inventory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response<String>, ApiError> {
    let args = CallArgs::new().with(id.clone());
    let response = state
        .invoker
        .invoke(&resource(&state, "inventory"), None, args, || async move {
            let (latency, fails, stock) = {
                let mut rng = rand::thread_rng();
                (rng.gen_range(100..500), rng.gen_range(0..100) < 5, rng.gen_range(0..1000))
            };
            tracing::info!(id = %id, latency_ms = latency, "Inventory lookup");
            tokio::time::sleep(Duration::from_millis(latency)).await;
            if fails {
                return Err(DemoError::Database);
            }
            Ok(format!("Inventory: {stock}"))
        })
        .await?;
    Ok(response)
}

async fn status(State(state): State<AppState>) -> String {
    format!(
        "{} service running - {}",
        title(&state.config.app.service_name),
        now_ms()
    )
}
