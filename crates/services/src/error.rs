use scribe_transcription::{EngineError, JobError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Transcription engine unavailable: no model loaded")]
    EngineUnavailable,
    #[error("No files were submitted")]
    EmptyBatch,
    #[error("Unsupported file type '{extension}'. Supported: {supported}")]
    UnsupportedFileType { extension: String, supported: String },
    #[error("Failed to store upload: {0}")]
    Storage(#[source] std::io::Error),
    #[error(transparent)]
    Job(#[from] JobError),
}

impl DispatchError {
    /// Whether the failure comes from a missing engine, however deep it
    /// was raised.
    pub fn is_engine_unavailable(&self) -> bool {
        matches!(
            self,
            DispatchError::EngineUnavailable
                | DispatchError::Job(JobError::Engine(EngineError::NotReady))
        )
    }
}

impl From<EngineError> for DispatchError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NotReady => DispatchError::EngineUnavailable,
            other => DispatchError::Job(JobError::Engine(other)),
        }
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
