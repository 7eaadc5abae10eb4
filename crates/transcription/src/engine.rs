use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use crate::Transcript;
use crate::asr::{AudioInfo, ModelLoader, Segment, SpeechModel};
use crate::config::EngineConfig;
use crate::options::DecodeOptions;

/// Buffered stream events between the decoder thread and the consumer.
const STREAM_BUFFER: usize = 16;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Transcription engine not ready: no model loaded")]
    NotReady,
    #[error("Failed to load model: {0}")]
    Load(#[source] anyhow::Error),
    #[error(transparent)]
    Inference(anyhow::Error),
    #[error("Inference task failed: {0}")]
    Join(String),
}

/// Result of [`EngineRuntime::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The requested config was already active.
    Unchanged,
    Loaded { elapsed: Duration },
}

/// One item of a streaming transcription.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Metadata {
        language: String,
        language_probability: Option<f32>,
        duration: f64,
        model: String,
    },
    Segment(Segment),
    Error {
        message: String,
    },
    /// End-of-stream marker, always the last event.
    Done,
}

struct LoadedEngine {
    config: EngineConfig,
    model: Box<dyn SpeechModel>,
}

/// Owner of the single active inference engine.
///
/// One async mutex guards the engine slot and is held across `load`,
/// `transcribe` and the whole of `stream`. Inference is therefore
/// serialized: a known single-engine bottleneck, acceptable because each
/// decode already saturates the CPU threads it is given. A swap waits for
/// the in-flight call to finish, then releases the old model before
/// building the new one, so no caller ever sees a half-built engine.
///
/// The active config is mirrored outside the mutex so health checks and
/// admission control never queue behind a long decode.
pub struct EngineRuntime {
    loader: Arc<dyn ModelLoader>,
    slot: Arc<Mutex<Option<LoadedEngine>>>,
    active: RwLock<Option<EngineConfig>>,
    loads: AtomicU64,
}

impl EngineRuntime {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        info!(backend = %loader.name(), "Engine runtime created");
        Self {
            loader,
            slot: Arc::new(Mutex::new(None)),
            active: RwLock::new(None),
            loads: AtomicU64::new(0),
        }
    }

    /// Activates `config`, retiring whatever engine is currently loaded.
    ///
    /// A no-op when `config` is already active. While a swap is in progress
    /// the runtime keeps reporting the previous config as active: callers
    /// queue on the slot and run against the new engine. If building the new
    /// engine fails the runtime is left without an engine.
    pub async fn load(&self, config: EngineConfig) -> Result<LoadOutcome, EngineError> {
        let mut slot = self.slot.lock().await;

        if slot.as_ref().is_some_and(|engine| engine.config == config) {
            info!(model = %config.model_size, "Model already loaded");
            return Ok(LoadOutcome::Unchanged);
        }

        let start = Instant::now();
        let model = match self.rebuild(slot.take(), &config).await {
            Ok(model) => model,
            Err(e) => {
                *self.active.write() = None;
                return Err(e);
            }
        };

        let elapsed = start.elapsed();
        info!(
            model = %config.model_size,
            elapsed_secs = format!("{:.2}", elapsed.as_secs_f64()),
            "Model loaded"
        );

        *self.active.write() = Some(config.clone());
        *slot = Some(LoadedEngine { config, model });
        self.loads.fetch_add(1, Ordering::Relaxed);

        Ok(LoadOutcome::Loaded { elapsed })
    }

    /// Releases `previous` and builds `config`, both off the async runtime.
    async fn rebuild(
        &self,
        previous: Option<LoadedEngine>,
        config: &EngineConfig,
    ) -> Result<Box<dyn SpeechModel>, EngineError> {
        if let Some(previous) = previous {
            info!(model = %previous.config.model_size, "Releasing previous model");
            tokio::task::spawn_blocking(move || drop(previous))
                .await
                .map_err(|e| EngineError::Join(e.to_string()))?;
        }

        info!(
            model = %config.model_size,
            device = %config.device,
            compute_type = %config.compute_type,
            "Loading model"
        );
        let loader = Arc::clone(&self.loader);
        let requested = config.clone();
        tokio::task::spawn_blocking(move || loader.load(&requested))
            .await
            .map_err(|e| EngineError::Join(e.to_string()))?
            .map_err(|e| {
                error!(model = %config.model_size, "Failed to load model: {:#}", e);
                EngineError::Load(e)
            })
    }

    /// Drops the active engine, if any.
    pub async fn unload(&self) {
        let mut slot = self.slot.lock().await;
        *self.active.write() = None;
        if let Some(previous) = slot.take() {
            info!(model = %previous.config.model_size, "Unloading model");
            if let Err(e) = tokio::task::spawn_blocking(move || drop(previous)).await {
                warn!("Model release task failed: {}", e);
            }
        }
    }

    /// Whether a model is loaded or being swapped in. Never blocks behind
    /// inference.
    pub fn is_ready(&self) -> bool {
        self.active.read().is_some()
    }

    pub fn active_config(&self) -> Option<EngineConfig> {
        self.active.read().clone()
    }

    /// Number of successful (non no-op) loads since startup.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    /// Transcribes a normalized audio file with the active engine.
    pub async fn transcribe(
        &self,
        audio: &Path,
        language: Option<&str>,
        options: &DecodeOptions,
    ) -> Result<Transcript, EngineError> {
        let guard = Arc::clone(&self.slot).lock_owned().await;
        if guard.is_none() {
            return Err(EngineError::NotReady);
        }

        let audio = audio.to_path_buf();
        let language = language.map(str::to_owned);
        let options = options.clone();

        tokio::task::spawn_blocking(move || {
            let engine = guard.as_ref().ok_or(EngineError::NotReady)?;
            engine.transcribe(&audio, language.as_deref(), &options)
        })
        .await
        .map_err(|e| EngineError::Join(e.to_string()))?
    }

    /// Streams metadata, then segments, then [`StreamEvent::Done`].
    ///
    /// The engine stays locked until the stream finishes. Dropping the
    /// receiver stops decoding before the next segment is emitted.
    pub async fn stream(
        &self,
        audio: PathBuf,
        language: Option<String>,
        options: DecodeOptions,
    ) -> Result<mpsc::Receiver<StreamEvent>, EngineError> {
        let guard = Arc::clone(&self.slot).lock_owned().await;
        if guard.is_none() {
            return Err(EngineError::NotReady);
        }

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::task::spawn_blocking(move || {
            if let Some(engine) = guard.as_ref() {
                engine.stream(&audio, language.as_deref(), &options, &tx);
            }
        });

        Ok(rx)
    }
}

impl LoadedEngine {
    fn transcribe(
        &self,
        audio: &Path,
        language: Option<&str>,
        options: &DecodeOptions,
    ) -> Result<Transcript, EngineError> {
        let start = Instant::now();
        let decoding = self
            .model
            .decode(audio, language, options)
            .map_err(EngineError::Inference)?;
        let segments = decoding
            .segments
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(EngineError::Inference)?;

        let text = segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let inference_time = start.elapsed().as_secs_f64();

        debug!(
            model = %self.config.model_size,
            segments = segments.len(),
            inference_secs = format!("{:.2}", inference_time),
            "Transcription finished"
        );

        Ok(Transcript {
            text,
            segments,
            language: decoding.info.language,
            language_probability: decoding.info.language_probability,
            duration: decoding.info.duration,
            model_used: self.config.model_size.clone(),
            inference_time,
        })
    }

    fn stream(
        &self,
        audio: &Path,
        language: Option<&str>,
        options: &DecodeOptions,
        tx: &mpsc::Sender<StreamEvent>,
    ) {
        let decoding = match self.model.decode(audio, language, options) {
            Ok(decoding) => decoding,
            Err(e) => {
                warn!("Streaming decode failed: {:#}", e);
                let _ = tx.blocking_send(StreamEvent::Error {
                    message: e.to_string(),
                });
                let _ = tx.blocking_send(StreamEvent::Done);
                return;
            }
        };

        if tx.blocking_send(self.metadata(&decoding.info)).is_err() {
            debug!("Stream consumer gone before metadata");
            return;
        }

        let mut emitted = 0usize;
        for segment in decoding.segments {
            let event = match segment {
                Ok(segment) => StreamEvent::Segment(segment),
                Err(e) => {
                    warn!(emitted, "Streaming decode failed mid-stream: {:#}", e);
                    let _ = tx.blocking_send(StreamEvent::Error {
                        message: e.to_string(),
                    });
                    let _ = tx.blocking_send(StreamEvent::Done);
                    return;
                }
            };
            if tx.blocking_send(event).is_err() {
                debug!(emitted, "Stream consumer disconnected, stopping decode");
                return;
            }
            emitted += 1;
        }

        debug!(emitted, "Stream complete");
        let _ = tx.blocking_send(StreamEvent::Done);
    }

    fn metadata(&self, info: &AudioInfo) -> StreamEvent {
        StreamEvent::Metadata {
            language: info.language.clone(),
            language_probability: info.language_probability,
            duration: info.duration,
            model: self.config.model_size.clone(),
        }
    }
}
