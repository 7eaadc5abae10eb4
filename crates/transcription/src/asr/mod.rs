#[cfg(feature = "local-whisper")]
pub mod local_whisper;

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::options::DecodeOptions;

/// One recognized span of speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: usize,
    /// Seconds from the start of the audio.
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// What the engine learned about the input before decoding segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioInfo {
    pub language: String,
    pub language_probability: Option<f32>,
    pub duration: f64,
}

/// A decode in progress: metadata up front, segments produced lazily in
/// increasing time order.
pub struct Decoding<'a> {
    pub info: AudioInfo,
    pub segments: Box<dyn Iterator<Item = anyhow::Result<Segment>> + Send + 'a>,
}

/// A loaded speech-to-text model.
///
/// Calls are CPU-bound and blocking; the runtime drives them from the
/// blocking thread pool.
pub trait SpeechModel: Send + Sync + 'static {
    /// Starts decoding a normalized audio file. `language = None` asks the
    /// model to detect the language itself.
    fn decode<'a>(
        &'a self,
        audio: &Path,
        language: Option<&str>,
        options: &DecodeOptions,
    ) -> anyhow::Result<Decoding<'a>>;

    /// Human-readable backend name.
    fn name(&self) -> &str;
}

/// Builds a [`SpeechModel`] for a given engine configuration.
pub trait ModelLoader: Send + Sync + 'static {
    fn load(&self, config: &EngineConfig) -> anyhow::Result<Box<dyn SpeechModel>>;

    fn name(&self) -> &str;
}

/// Loader for a backend that is not compiled into this build.
pub struct UnavailableLoader {
    backend: String,
}

impl UnavailableLoader {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
        }
    }
}

impl ModelLoader for UnavailableLoader {
    fn load(&self, _config: &EngineConfig) -> anyhow::Result<Box<dyn SpeechModel>> {
        anyhow::bail!(
            "ASR backend '{}' is not available in this build",
            self.backend
        )
    }

    fn name(&self) -> &str {
        &self.backend
    }
}

/// Resolves a backend name from configuration to a loader.
pub fn loader_for(backend: &str) -> Arc<dyn ModelLoader> {
    match backend {
        #[cfg(feature = "local-whisper")]
        "local_whisper" => Arc::new(local_whisper::WhisperLoader),
        other => {
            tracing::warn!(backend = %other, "ASR backend not compiled in, engine will stay unavailable");
            Arc::new(UnavailableLoader::new(other))
        }
    }
}
