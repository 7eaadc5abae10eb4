use std::sync::Arc;
use std::time::Instant;

use scribe_config::{EngineSettings, Settings};
use scribe_services::{Dispatcher, UploadStore};
use scribe_transcription::asr::loader_for;
use scribe_transcription::{
    AudioNormalizer, EngineConfig, EngineError, EngineRuntime, FfmpegNormalizer, JobRegistry,
    LoadOutcome, ModelLoader, ResultCache, WorkerContext,
};

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub dispatcher: Arc<Dispatcher>,
    pub engine: Arc<EngineRuntime>,
    pub started_at: Instant,
}

impl AppState {
    /// Wires the pipeline around an explicit loader and normalizer.
    pub fn new(
        settings: Settings,
        loader: Arc<dyn ModelLoader>,
        normalizer: Arc<dyn AudioNormalizer>,
    ) -> Self {
        let engine = Arc::new(EngineRuntime::new(loader));
        let ctx = WorkerContext {
            jobs: Arc::new(JobRegistry::new()),
            cache: Arc::new(ResultCache::new(settings.cache.capacity)),
            engine: Arc::clone(&engine),
            normalizer,
        };
        let uploads = UploadStore::new(&settings.uploads.dir, &settings.uploads.supported_extensions);
        let dispatcher = Arc::new(Dispatcher::new(ctx, uploads, &settings.jobs));

        Self {
            settings,
            dispatcher,
            engine,
            started_at: Instant::now(),
        }
    }

    /// Production wiring: the configured ASR backend and an ffmpeg normalizer.
    pub fn from_settings(settings: Settings) -> Self {
        let loader = loader_for(&settings.engine.backend);
        let normalizer = Arc::new(FfmpegNormalizer::new(
            settings.normalizer.ffmpeg_path.clone(),
            settings.normalizer.sample_rate,
            settings.normalizer.channels,
        ));
        Self::new(settings, loader, normalizer)
    }

    /// Loads the model named in the settings.
    pub async fn load_configured_engine(&self) -> Result<LoadOutcome, EngineError> {
        self.engine.load(engine_config(&self.settings.engine)).await
    }
}

pub fn engine_config(settings: &EngineSettings) -> EngineConfig {
    EngineConfig {
        model_size: settings.model_size.clone(),
        device: settings.device.clone(),
        compute_type: settings.compute_type.clone(),
        cpu_threads: settings.cpu_threads,
        model_dir: settings.model_dir.clone(),
    }
}
