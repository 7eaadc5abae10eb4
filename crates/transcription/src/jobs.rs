use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::TranscriptionOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// QUEUED -> PROCESSING -> {COMPLETED | FAILED}; nothing else.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

/// One submitted transcription unit.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    /// Original filename, for display only.
    pub source_name: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    /// Set exactly once, when the job reaches a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<TranscriptionOutput>,
    pub error: Option<String>,
}

/// A state transition. Results and errors only travel with their terminal
/// status, which keeps `result` and `error` mutually exclusive.
#[derive(Debug, Clone)]
pub enum JobUpdate {
    Processing,
    Completed(TranscriptionOutput),
    Failed(String),
}

impl JobUpdate {
    pub fn status(&self) -> JobStatus {
        match self {
            JobUpdate::Processing => JobStatus::Processing,
            JobUpdate::Completed(_) => JobStatus::Completed,
            JobUpdate::Failed(_) => JobStatus::Failed,
        }
    }
}

/// Job totals by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl JobCounts {
    pub fn total(&self) -> usize {
        self.queued + self.processing + self.completed + self.failed
    }
}

/// In-memory job table. Nothing is persisted; a restart forgets every job.
#[derive(Default)]
pub struct JobRegistry {
    jobs: DashMap<Uuid, Job>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a QUEUED job and returns its id.
    pub fn create(&self, source_name: impl Into<String>) -> Uuid {
        let id = Uuid::new_v4();
        let job = Job {
            id,
            source_name: source_name.into(),
            status: JobStatus::Queued,
            created_at: Utc::now(),
            completed_at: None,
            result: None,
            error: None,
        };
        debug!(job_id = %id, source = %job.source_name, "Job created");
        self.jobs.insert(id, job);
        id
    }

    /// Snapshot of a job.
    pub fn get(&self, id: &Uuid) -> Option<Job> {
        self.jobs.get(id).map(|job| job.clone())
    }

    /// Applies a transition atomically. Unknown ids and illegal transitions
    /// are logged and ignored; returns whether the job changed.
    pub fn update(&self, id: &Uuid, update: JobUpdate) -> bool {
        let Some(mut job) = self.jobs.get_mut(id) else {
            warn!(job_id = %id, "Update for unknown job ignored (already collected?)");
            return false;
        };

        let next = update.status();
        if !job.status.can_transition_to(next) {
            warn!(job_id = %id, from = ?job.status, to = ?next, "Illegal job transition ignored");
            return false;
        }

        job.status = next;
        match update {
            JobUpdate::Processing => {}
            JobUpdate::Completed(result) => {
                job.result = Some(result);
                job.completed_at = Some(Utc::now());
            }
            JobUpdate::Failed(error) => {
                job.error = Some(error);
                job.completed_at = Some(Utc::now());
            }
        }
        true
    }

    /// Removes terminal jobs that finished at least `max_age` ago. Jobs
    /// still queued or processing are never touched.
    pub fn garbage_collect(&self, max_age: Duration) -> usize {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();
        let before = self.jobs.len();

        self.jobs.retain(|_, job| match job.completed_at {
            Some(done) if job.status.is_terminal() => now.signed_duration_since(done) < max_age,
            _ => true,
        });

        let removed = before.saturating_sub(self.jobs.len());
        if removed > 0 {
            info!(removed, "Garbage collector removed finished jobs");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn counts(&self) -> JobCounts {
        let mut counts = JobCounts::default();
        for job in self.jobs.iter() {
            match job.status {
                JobStatus::Queued => counts.queued += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}
