use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use scribe_config::JobSettings;
use scribe_transcription::options::normalize_language;
use scribe_transcription::worker::{process, remove_artifact};
use scribe_transcription::{
    DecodeOptions, EngineRuntime, Fingerprint, Job, JobError, JobRegistry, ResultCache, StreamEvent,
    TranscriptionOutput, TranscriptionRequest, TranscriptionWorker, WorkerContext,
};
use serde::Serialize;
use tokio::sync::{Semaphore, mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DispatchError, DispatchResult};
use crate::system;
use crate::uploads::{Upload, UploadStore};

const STREAM_BUFFER: usize = 16;

/// Snapshot produced by each maintenance tick.
#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceReport {
    pub removed_jobs: usize,
    pub jobs_in_memory: usize,
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cache_entries: usize,
    pub memory_used_mb: f64,
}

/// On-demand view of resource usage and pipeline load.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    #[serde(flatten)]
    pub usage: system::ResourceUsage,
    pub total_jobs_in_memory: usize,
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cache_entries: usize,
    pub model_loaded: bool,
}

/// Front door of the pipeline: stages uploads, creates jobs and schedules a
/// worker per job on a bounded pool.
pub struct Dispatcher {
    ctx: WorkerContext,
    uploads: UploadStore,
    permits: Arc<Semaphore>,
    retention: Duration,
}

impl Dispatcher {
    pub fn new(ctx: WorkerContext, uploads: UploadStore, settings: &JobSettings) -> Self {
        let max_concurrent = settings.max_concurrent.max(1);
        info!(
            max_concurrent,
            retention_secs = settings.retention_secs,
            uploads = %uploads.dir().display(),
            "Dispatcher ready"
        );
        Self {
            ctx,
            uploads,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            retention: Duration::from_secs(settings.retention_secs),
        }
    }

    pub fn jobs(&self) -> &Arc<JobRegistry> {
        &self.ctx.jobs
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.ctx.cache
    }

    pub fn engine(&self) -> &Arc<EngineRuntime> {
        &self.ctx.engine
    }

    /// Stages every file, creates one QUEUED job per file and schedules its
    /// worker. Returns the job ids without waiting for any of them.
    ///
    /// The submission is refused as a whole when the engine is not loaded,
    /// the batch is empty or any file has an unsupported type.
    pub async fn submit_batch(
        &self,
        files: Vec<Upload>,
        language: Option<&str>,
        options: DecodeOptions,
    ) -> DispatchResult<Vec<Uuid>> {
        self.ensure_ready()?;
        if files.is_empty() {
            return Err(DispatchError::EmptyBatch);
        }
        for file in &files {
            self.uploads.validate(&file.filename)?;
        }
        let language = normalize_language(language);

        let mut staged: Vec<(String, PathBuf)> = Vec::with_capacity(files.len());
        for file in &files {
            match self.uploads.save(file).await {
                Ok(path) => staged.push((file.filename.clone(), path)),
                Err(e) => {
                    for (_, path) in &staged {
                        remove_artifact(path).await;
                    }
                    return Err(e);
                }
            }
        }

        // Repeated content in one batch runs after its first occurrence, so
        // the later jobs are answered from the cache in submission order.
        let mut first_seen: HashMap<Fingerprint, watch::Receiver<()>> = HashMap::new();
        let mut job_ids = Vec::with_capacity(staged.len());
        for (file, (source_name, upload)) in files.iter().zip(staged) {
            let job_id = self.ctx.jobs.create(source_name);
            let request = TranscriptionRequest {
                upload,
                language: language.clone(),
                options: options.clone(),
            };

            let fingerprint = Fingerprint::from_bytes(&file.bytes, language.as_deref());
            let (done, after) = match first_seen.get(&fingerprint) {
                Some(earlier) => {
                    debug!(job_id = %job_id, hash = %fingerprint.short(), "Duplicate upload in batch");
                    (None, Some(earlier.clone()))
                }
                None => {
                    let (done, finished) = watch::channel(());
                    first_seen.insert(fingerprint, finished);
                    (Some(done), None)
                }
            };

            let worker = TranscriptionWorker::new(job_id, request, self.ctx.clone());
            self.spawn_worker(worker, after, done);
            job_ids.push(job_id);
        }

        info!(
            jobs = job_ids.len(),
            language = language.as_deref().unwrap_or("auto"),
            "Batch submitted"
        );
        Ok(job_ids)
    }

    pub fn get_status(&self, job_id: &Uuid) -> Option<Job> {
        self.ctx.jobs.get(job_id)
    }

    /// Reclaims expired jobs and reports pipeline health.
    pub async fn maintenance_tick(&self) -> MaintenanceReport {
        let removed_jobs = self.ctx.jobs.garbage_collect(self.retention);
        let counts = self.ctx.jobs.counts();
        let memory_used_mb = tokio::task::spawn_blocking(system::process_memory_mb)
            .await
            .unwrap_or_default();

        let report = MaintenanceReport {
            removed_jobs,
            jobs_in_memory: counts.total(),
            queued: counts.queued,
            processing: counts.processing,
            completed: counts.completed,
            failed: counts.failed,
            cache_entries: self.ctx.cache.len(),
            memory_used_mb,
        };
        info!(
            removed_jobs = report.removed_jobs,
            jobs_in_memory = report.jobs_in_memory,
            cache_entries = report.cache_entries,
            memory_mb = format!("{:.2}", report.memory_used_mb),
            "Maintenance tick"
        );
        report
    }

    /// Samples resource usage and job counts without collecting anything.
    pub async fn stats(&self) -> SystemStats {
        let usage = tokio::task::spawn_blocking(system::resource_usage)
            .await
            .unwrap_or_default();
        let counts = self.ctx.jobs.counts();
        SystemStats {
            usage,
            total_jobs_in_memory: counts.total(),
            queued: counts.queued,
            processing: counts.processing,
            completed: counts.completed,
            failed: counts.failed,
            cache_entries: self.ctx.cache.len(),
            model_loaded: self.ctx.engine.is_ready(),
        }
    }

    /// Runs the full pipeline for a single file and waits for the result.
    /// No job record is created.
    pub async fn transcribe_now(
        &self,
        file: Upload,
        language: Option<&str>,
        options: DecodeOptions,
    ) -> DispatchResult<TranscriptionOutput> {
        self.ensure_ready()?;
        let upload = self.uploads.save(&file).await?;
        let request = TranscriptionRequest {
            upload,
            language: normalize_language(language),
            options,
        };

        let _permit = Arc::clone(&self.permits).acquire_owned().await.ok();
        let output = process(&self.ctx, &request).await?;
        info!(source = %file.filename, cached = output.cached, "Synchronous transcription finished");
        Ok(output)
    }

    /// Normalizes a single file and streams its transcription.
    ///
    /// Temp files are removed once the stream ends or the receiver is
    /// dropped; dropping the receiver also stops decoding.
    pub async fn open_stream(
        &self,
        file: Upload,
        language: Option<&str>,
        options: DecodeOptions,
    ) -> DispatchResult<mpsc::Receiver<StreamEvent>> {
        self.ensure_ready()?;
        let upload = self.uploads.save(&file).await?;

        let normalized = match self.ctx.normalizer.normalize(&upload).await {
            Ok(path) => path,
            Err(e) => {
                remove_artifact(&upload).await;
                return Err(JobError::from(e).into());
            }
        };

        let mut events = match self
            .ctx
            .engine
            .stream(normalized.clone(), normalize_language(language), options)
            .await
        {
            Ok(events) => events,
            Err(e) => {
                remove_artifact(&upload).await;
                remove_artifact(&normalized).await;
                return Err(e.into());
            }
        };

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let source = file.filename;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Some(event) => {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    _ = tx.closed() => {
                        debug!(source = %source, "Stream client disconnected");
                        break;
                    }
                }
            }
            drop(events);
            remove_artifact(&upload).await;
            remove_artifact(&normalized).await;
        });

        Ok(rx)
    }

    fn ensure_ready(&self) -> DispatchResult<()> {
        if self.ctx.engine.is_ready() {
            Ok(())
        } else {
            warn!("Submission refused: engine not loaded");
            Err(DispatchError::EngineUnavailable)
        }
    }

    /// Runs `worker` once a permit is free. With `after` set, first waits
    /// until that job's `done` sender is dropped.
    fn spawn_worker(
        &self,
        worker: TranscriptionWorker,
        after: Option<watch::Receiver<()>>,
        done: Option<watch::Sender<()>>,
    ) {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            if let Some(mut earlier) = after {
                // Only ever resolves with Err, once the sender is gone.
                let _ = earlier.changed().await;
            }
            let _permit = permits.acquire_owned().await.ok();
            worker.run().await;
            drop(done);
        });
    }
}
