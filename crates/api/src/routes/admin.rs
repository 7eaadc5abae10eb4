use axum::{Json, extract::State};
use scribe_transcription::{EngineConfig, LoadOutcome};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{error::ApiError, state::{AppState, engine_config}};

/// Fields left out fall back to the configured engine settings.
#[derive(Debug, Deserialize)]
pub struct LoadModelRequest {
    pub model_size: String,
    pub device: Option<String>,
    pub compute_type: Option<String>,
    pub cpu_threads: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LoadModelResponse {
    pub status: &'static str,
    pub model_size: String,
    pub load_time_secs: f64,
}

/// Hot-swaps the active model. Waits for in-flight inference to finish.
pub async fn load_model(
    State(state): State<AppState>,
    Json(req): Json<LoadModelRequest>,
) -> Result<Json<LoadModelResponse>, ApiError> {
    let model_size = req.model_size.trim().to_string();
    if model_size.is_empty() {
        return Err(ApiError::BadRequest("model_size must not be empty".to_string()));
    }
    let allowed = &state.settings.engine.allowed_models;
    if !allowed.is_empty() && !allowed.contains(&model_size) {
        return Err(ApiError::BadRequest(format!(
            "Model '{}' is not allowed. Options: {}",
            model_size,
            allowed.join(", ")
        )));
    }

    let defaults = engine_config(&state.settings.engine);
    let config = EngineConfig {
        model_size: model_size.clone(),
        device: req.device.unwrap_or(defaults.device),
        compute_type: req.compute_type.unwrap_or(defaults.compute_type),
        cpu_threads: req.cpu_threads.unwrap_or(defaults.cpu_threads),
        model_dir: defaults.model_dir,
    };

    info!(model = %model_size, "Model swap requested");
    let (status, load_time_secs) = match state.engine.load(config).await? {
        LoadOutcome::Unchanged => ("unchanged", 0.0),
        LoadOutcome::Loaded { elapsed } => ("loaded", elapsed.as_secs_f64()),
    };

    Ok(Json(LoadModelResponse {
        status,
        model_size,
        load_time_secs,
    }))
}
