//! Gateway and configuration endpoints.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct GatewayHealth {
    pub service: String,
    pub status: &'static str,
    pub timestamp: u64,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct GatewayInfo {
    pub name: String,
    pub version: String,
    pub environment: String,
    pub description: &'static str,
    pub bind_address: String,
    pub resources: usize,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/gateway/health", get(health))
        .route("/gateway/info", get(info))
        .route("/config/greeting", get(greeting))
        .route("/config/feature-status", get(feature_status))
}

async fn health(State(state): State<AppState>) -> Json<GatewayHealth> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    Json(GatewayHealth {
        service: state.config.gateway.source_tag.clone(),
        status: "UP",
        timestamp,
        message: "Gateway is running normally",
    })
}

async fn info(State(state): State<AppState>) -> Json<GatewayInfo> {
    let app = &state.config.app;
    Json(GatewayInfo {
        name: app.app_name.clone(),
        version: app.version.clone(),
        environment: app.environment.clone(),
        description: "Unified API entry with request tagging, access logging and resource guards",
        bind_address: state.config.listener.bind_address.clone(),
        resources: state.invoker.registry().len(),
    })
}

async fn greeting(State(state): State<AppState>) -> String {
    state.config.app.greeting.clone()
}

async fn feature_status(State(state): State<AppState>) -> Json<bool> {
    Json(state.config.app.feature_enabled)
}
