use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub engine: EngineSettings,
    pub cache: CacheSettings,
    pub jobs: JobSettings,
    pub uploads: UploadSettings,
    pub normalizer: NormalizerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

/// Which model to load and how to run it.
#[derive(Debug, Deserialize, Clone)]
pub struct EngineSettings {
    /// Model loader to use: "local_whisper".
    pub backend: String,
    /// Model size, e.g. "tiny", "base", "small", "large-v3".
    pub model_size: String,
    pub device: String,
    pub compute_type: String,
    pub cpu_threads: usize,
    /// Directory holding model weights.
    pub model_dir: String,
    /// Model sizes the admin swap endpoint accepts. Empty allows any.
    pub allowed_models: Vec<String>,
    /// Load the engine before the listener starts accepting requests.
    pub load_on_startup: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    pub capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JobSettings {
    /// How long a finished job stays pollable.
    pub retention_secs: u64,
    pub maintenance_interval_secs: u64,
    /// Upper bound on workers running at the same time.
    pub max_concurrent: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadSettings {
    pub dir: String,
    /// Accepted file extensions, without the leading dot.
    pub supported_extensions: Vec<String>,
    /// Request body limit for upload routes.
    pub max_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NormalizerSettings {
    pub ffmpeg_path: String,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("SCRIBE")
                    .list_separator(",")
                    .with_list_parse_key("uploads.supported_extensions")
                    .with_list_parse_key("app.cors_origins")
                    .with_list_parse_key("engine.allowed_models")
                    .try_parsing(true),
            )
            .set_default("app.name", "Scribe Transcription API")?
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 8000)?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("engine.backend", "local_whisper")?
            .set_default("engine.model_size", "base")?
            .set_default("engine.device", "cpu")?
            .set_default("engine.compute_type", "int8")?
            .set_default("engine.cpu_threads", 1)?
            .set_default("engine.model_dir", "models")?
            .set_default(
                "engine.allowed_models",
                vec!["tiny", "base", "small", "medium", "large-v3"],
            )?
            .set_default("engine.load_on_startup", true)?
            .set_default("cache.capacity", 100)?
            .set_default("jobs.retention_secs", 3600)?
            .set_default("jobs.maintenance_interval_secs", 60)?
            .set_default("jobs.max_concurrent", 4)?
            .set_default("uploads.dir", "/tmp/scribe-uploads")?
            .set_default("uploads.supported_extensions", vec!["wav", "mp3"])?
            .set_default("uploads.max_bytes", 100 * 1024 * 1024)?
            .set_default("normalizer.ffmpeg_path", "ffmpeg")?
            .set_default("normalizer.sample_rate", 16000)?
            .set_default("normalizer.channels", 1)?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::load().expect("Failed to load default settings")
    }
}
