use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use scribe_transcription::Job;
use serde::Serialize;
use uuid::Uuid;

use super::{TranscribeParams, read_uploads};
use crate::{error::ApiError, state::AppState};

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub job_ids: Vec<Uuid>,
    pub count: usize,
}

/// Accepts one or more `files` parts and queues a job for each.
pub async fn submit_batch(
    State(state): State<AppState>,
    Query(params): Query<TranscribeParams>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<BatchResponse>), ApiError> {
    let files = read_uploads(multipart, "files").await?;
    let options = params.decode_options()?;

    let job_ids = state
        .dispatcher
        .submit_batch(files, params.language.as_deref(), options)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchResponse {
            count: job_ids.len(),
            job_ids,
        }),
    ))
}

pub async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let id = Uuid::parse_str(&job_id)
        .map_err(|_| ApiError::BadRequest("Invalid job_id".to_string()))?;

    state
        .dispatcher
        .get_status(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))
}
