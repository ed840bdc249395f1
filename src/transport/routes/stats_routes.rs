use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthView {
    pub status: &'static str,
    pub uptime_ms: u64,
    pub rooms: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoView {
    pub version: &'static str,
    pub branch: &'static str,
    pub commit: &'static str,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthView> {
    Json(HealthView {
        status: "ok",
        uptime_ms: state.start_time.elapsed().as_millis() as u64,
        rooms: state.store.room_count(),
    })
}

pub async fn info() -> Json<InfoView> {
    Json(InfoView {
        version: env!("CARGO_PKG_VERSION"),
        branch: option_env!("GIT_BRANCH").unwrap_or("unknown"),
        commit: option_env!("GIT_COMMIT").unwrap_or("unknown"),
    })
}

pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.metrics.export()
}
