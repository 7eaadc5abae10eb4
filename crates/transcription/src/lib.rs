pub mod asr;
pub mod cache;
pub mod config;
pub mod engine;
pub mod fingerprint;
pub mod jobs;
pub mod normalize;
pub mod options;
pub mod worker;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use asr::{AudioInfo, Decoding, ModelLoader, Segment, SpeechModel};
pub use cache::ResultCache;
pub use config::EngineConfig;
pub use engine::{EngineError, EngineRuntime, LoadOutcome, StreamEvent};
pub use fingerprint::Fingerprint;
pub use jobs::{Job, JobRegistry, JobStatus, JobUpdate};
pub use normalize::{AudioNormalizer, FfmpegNormalizer, NormalizeError};
pub use options::{DecodeOptions, DecodeProfile};
pub use worker::{JobError, TranscriptionRequest, TranscriptionWorker, WorkerContext};

use serde::{Deserialize, Serialize};

/// Output of one engine run over a whole file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub segments: Vec<Segment>,
    /// Forced or detected language tag.
    pub language: String,
    pub language_probability: Option<f32>,
    /// Audio duration in seconds.
    pub duration: f64,
    /// Model size of the engine that produced this transcript.
    pub model_used: String,
    /// Wall-clock inference time in seconds.
    pub inference_time: f64,
}

/// Result attached to a completed job and stored in the result cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionOutput {
    #[serde(flatten)]
    pub transcript: Transcript,
    /// True when this result was served from the result cache.
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_warning: Option<SystemWarning>,
}

/// Advisory attached to results produced under known-poor conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemWarning {
    pub code: String,
    pub message: String,
}

/// Model sizes too small to transcribe anything but English reliably.
const LOW_ACCURACY_MODELS: &[&str] = &["tiny", "base"];

impl TranscriptionOutput {
    /// Wraps a transcript produced by a fresh engine run.
    pub fn fresh(transcript: Transcript) -> Self {
        let system_warning = quality_warning(&transcript.model_used, &transcript.language);
        Self {
            transcript,
            cached: false,
            system_warning,
        }
    }

    /// Copy of a cached entry, flagged as served from cache.
    pub fn served_from_cache(&self) -> Self {
        Self {
            cached: true,
            ..self.clone()
        }
    }
}

/// Warns when a non-English language is transcribed on a small model.
pub fn quality_warning(model_size: &str, language: &str) -> Option<SystemWarning> {
    let language = language.trim().to_ascii_lowercase();
    if language.is_empty() || language == "en" {
        return None;
    }

    let family = model_size.split('.').next().unwrap_or(model_size);
    if !LOW_ACCURACY_MODELS.contains(&family) {
        return None;
    }

    Some(SystemWarning {
        code: "low_accuracy_model".to_string(),
        message: format!(
            "Language '{}' on the '{}' model may yield poor results. Load a larger model for better accuracy.",
            language, model_size
        ),
    })
}
