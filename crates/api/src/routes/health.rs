use axum::{Json, extract::State};
use scribe_services::{SystemStats, system};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub cpu_cores_available: usize,
    pub model_loaded: bool,
    pub model_size: Option<String>,
    pub jobs_in_memory: usize,
    pub cache_entries: usize,
}

pub async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": format!("Welcome to {}", state.settings.app.name),
        "docs": "/health",
    }))
}

/// Liveness plus engine status. Never waits on an in-flight decode.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let active = state.engine.active_config();
    Json(HealthResponse {
        status: if active.is_some() { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        cpu_cores_available: system::cpu_cores(),
        model_loaded: active.is_some(),
        model_size: active.map(|config| config.model_size),
        jobs_in_memory: state.dispatcher.jobs().len(),
        cache_entries: state.dispatcher.cache().len(),
    })
}

/// Resource usage and job counts, sampled on request.
pub async fn stats(State(state): State<AppState>) -> Json<SystemStats> {
    Json(state.dispatcher.stats().await)
}
