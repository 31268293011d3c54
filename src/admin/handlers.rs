use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::resilience::{CircuitState, ResourceSnapshot};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub service: String,
    pub resources: usize,
    pub open_circuits: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let snapshots = state.invoker.registry().snapshot();
    let open_circuits = snapshots
        .iter()
        .filter(|s| s.circuit != CircuitState::Closed || !s.tripped_hotkeys.is_empty())
        .count();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        service: state.config.app.service_name.clone(),
        resources: snapshots.len(),
        open_circuits,
    })
}

pub async fn get_resources(State(state): State<AppState>) -> Json<Vec<ResourceSnapshot>> {
    Json(state.invoker.registry().snapshot())
}
