use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::TranscriptionOutput;
use crate::cache::ResultCache;
use crate::engine::{EngineError, EngineRuntime};
use crate::fingerprint::Fingerprint;
use crate::jobs::{JobRegistry, JobUpdate};
use crate::normalize::{AudioNormalizer, NormalizeError};
use crate::options::DecodeOptions;

/// Why a job failed. The Display text is what lands in `Job.error`.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("audio normalization failed: {0}")]
    Normalization(#[from] NormalizeError),
    #[error("could not fingerprint upload: {0}")]
    Fingerprint(#[source] std::io::Error),
    #[error("transcription failed: {0}")]
    Engine(#[from] EngineError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared collaborators every worker runs against.
#[derive(Clone)]
pub struct WorkerContext {
    pub jobs: Arc<JobRegistry>,
    pub cache: Arc<ResultCache>,
    pub engine: Arc<EngineRuntime>,
    pub normalizer: Arc<dyn AudioNormalizer>,
}

/// Everything needed to transcribe one staged upload.
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    /// Original upload on disk. Owned by the request: it is deleted once
    /// processing ends.
    pub upload: PathBuf,
    /// `None` requests auto-detection.
    pub language: Option<String>,
    pub options: DecodeOptions,
}

/// Runs one job through normalize -> fingerprint -> cache -> engine and
/// records the outcome in the registry.
pub struct TranscriptionWorker {
    job_id: Uuid,
    request: TranscriptionRequest,
    ctx: WorkerContext,
}

impl TranscriptionWorker {
    pub fn new(job_id: Uuid, request: TranscriptionRequest, ctx: WorkerContext) -> Self {
        Self {
            job_id,
            request,
            ctx,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Drives the job to a terminal state. Never fails: errors are captured
    /// into the job record.
    pub async fn run(self) {
        let Self {
            job_id,
            request,
            ctx,
        } = self;

        ctx.jobs.update(&job_id, JobUpdate::Processing);
        info!(
            job_id = %job_id,
            upload = %request.upload.display(),
            language = request.language.as_deref().unwrap_or("auto"),
            "Job started"
        );

        let start = Instant::now();
        match process(&ctx, &request).await {
            Ok(output) => {
                info!(
                    job_id = %job_id,
                    cached = output.cached,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Job completed"
                );
                ctx.jobs.update(&job_id, JobUpdate::Completed(output));
            }
            Err(e) => {
                error!(job_id = %job_id, "Job failed: {}", e);
                ctx.jobs.update(&job_id, JobUpdate::Failed(e.to_string()));
            }
        }
    }
}

/// The job-less part of the pipeline, shared with synchronous callers.
///
/// The upload and any normalized artifact are removed on every exit path.
pub async fn process(
    ctx: &WorkerContext,
    request: &TranscriptionRequest,
) -> Result<TranscriptionOutput, JobError> {
    let mut normalized = None;
    let result = run_pipeline(ctx, request, &mut normalized).await;

    remove_artifact(&request.upload).await;
    if let Some(path) = normalized {
        remove_artifact(&path).await;
    }

    result
}

async fn run_pipeline(
    ctx: &WorkerContext,
    request: &TranscriptionRequest,
    normalized: &mut Option<PathBuf>,
) -> Result<TranscriptionOutput, JobError> {
    let audio = ctx.normalizer.normalize(&request.upload).await?;
    *normalized = Some(audio.clone());

    let fingerprint = Fingerprint::of_file(&request.upload, request.language.as_deref())
        .await
        .map_err(JobError::Fingerprint)?;

    if let Some(hit) = ctx.cache.get(&fingerprint) {
        return Ok(hit.served_from_cache());
    }

    // Identical content already being decoded by another job lands in the
    // cache before this claim is granted.
    let _claim = ctx.cache.claim(&fingerprint).await;
    if let Some(hit) = ctx.cache.get(&fingerprint) {
        return Ok(hit.served_from_cache());
    }

    let transcript = ctx
        .engine
        .transcribe(&audio, request.language.as_deref(), &request.options)
        .await?;

    let output = TranscriptionOutput::fresh(transcript);
    ctx.cache.put(fingerprint, Arc::new(output.clone()));
    Ok(output)
}

/// Best-effort delete; a file that is already gone is fine.
pub async fn remove_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed temp file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "Failed to remove temp file: {}", e),
    }
}
