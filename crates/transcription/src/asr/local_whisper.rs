use std::path::Path;

use anyhow::Context;
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::{AudioInfo, Decoding, ModelLoader, Segment, SpeechModel};
use crate::config::EngineConfig;
use crate::options::DecodeOptions;

/// Sample rate of normalized input.
const SAMPLE_RATE: u32 = 16_000;

/// Loads GGML Whisper models from `model_dir`.
pub struct WhisperLoader;

impl ModelLoader for WhisperLoader {
    fn load(&self, config: &EngineConfig) -> anyhow::Result<Box<dyn SpeechModel>> {
        let path = config.model_path();
        let model = LocalWhisperModel::new(&path, config.cpu_threads)?;
        Ok(Box::new(model))
    }

    fn name(&self) -> &str {
        "local_whisper"
    }
}

/// Local Whisper model using whisper.cpp via whisper-rs.
pub struct LocalWhisperModel {
    ctx: WhisperContext,
    threads: i32,
}

impl LocalWhisperModel {
    /// Loads the model from disk.
    ///
    /// `model_path` should point to a GGML Whisper model file (e.g. ggml-base.bin).
    pub fn new(model_path: &Path, threads: usize) -> anyhow::Result<Self> {
        let display = model_path.display().to_string();
        info!(model_path = %display, "Loading Whisper model");
        let ctx = WhisperContext::new_with_params(&display, WhisperContextParameters::default())
            .map_err(|e| anyhow::anyhow!("Failed to load Whisper model '{}': {}", display, e))?;
        info!("Whisper model loaded");
        Ok(Self {
            ctx,
            threads: i32::try_from(threads.max(1)).unwrap_or(1),
        })
    }
}

impl SpeechModel for LocalWhisperModel {
    fn decode<'a>(
        &'a self,
        audio: &Path,
        language: Option<&str>,
        options: &DecodeOptions,
    ) -> anyhow::Result<Decoding<'a>> {
        let samples = read_pcm(audio)?;
        let duration = samples.len() as f64 / f64::from(SAMPLE_RATE);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| anyhow::anyhow!("Failed to create Whisper state: {}", e))?;

        let mut params = FullParams::new(sampling_strategy(options));
        params.set_n_threads(self.threads);
        params.set_language(Some(language.unwrap_or("auto")));
        if let Some(prompt) = options.initial_prompt.as_deref() {
            params.set_initial_prompt(prompt);
        }
        // whisper.cpp walks a fixed increment rather than an explicit list.
        match options.temperatures.as_slice() {
            [] => {}
            [only] => {
                params.set_temperature(*only);
                params.set_temperature_inc(0.0);
            }
            [first, second, ..] => {
                params.set_temperature(*first);
                params.set_temperature_inc(second - first);
            }
        }
        params.set_no_context(!options.condition_on_previous_text);

        // Suppress non-speech output
        params.set_print_progress(false);
        params.set_print_special(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, &samples)
            .map_err(|e| anyhow::anyhow!("Whisper transcription failed: {}", e))?;

        let (language, language_probability) = match language {
            Some(lang) => (lang.to_string(), Some(1.0)),
            None => {
                let detected = state
                    .full_lang_id_from_state()
                    .ok()
                    .and_then(whisper_rs::get_lang_str)
                    .unwrap_or("en");
                (detected.to_string(), None)
            }
        };

        let n_segments = state.full_n_segments();
        let mut segments = Vec::new();
        for i in 0..n_segments {
            if let Some(segment) = state.get_segment(i) {
                let text = segment
                    .to_str()
                    .map_err(|e| anyhow::anyhow!("Invalid segment text: {}", e))?
                    .trim()
                    .to_string();
                segments.push(Segment {
                    id: segments.len(),
                    start: segment.start_timestamp() as f64 / 100.0,
                    end: segment.end_timestamp() as f64 / 100.0,
                    text,
                });
            }
        }
        debug!(segments = segments.len(), %language, "Whisper decode complete");

        Ok(Decoding {
            info: AudioInfo {
                language,
                language_probability,
                duration,
            },
            segments: Box::new(segments.into_iter().map(Ok)),
        })
    }

    fn name(&self) -> &str {
        "local_whisper"
    }
}

/// Reads 16kHz mono 16-bit PCM into normalized f32 samples.
fn sampling_strategy(options: &DecodeOptions) -> SamplingStrategy {
    if options.beam_size <= 1 {
        return SamplingStrategy::Greedy {
            best_of: options.best_of.max(1) as i32,
        };
    }
    // whisper.cpp beam search has no best_of.
    if options.best_of > 1 {
        debug!(
            beam_size = options.beam_size,
            best_of = options.best_of,
            "best_of not passed to beam search decoder"
        );
    }
    SamplingStrategy::BeamSearch {
        beam_size: options.beam_size as i32,
        patience: options.patience,
    }
}

fn read_pcm(path: &Path) -> anyhow::Result<Vec<f32>> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels != 1 || spec.sample_rate != SAMPLE_RATE {
        anyhow::bail!(
            "Expected {} Hz mono audio, got {} Hz with {} channel(s)",
            SAMPLE_RATE,
            spec.sample_rate,
            spec.channels
        );
    }

    reader
        .into_samples::<i16>()
        .map(|s| s.map(|v| f32::from(v) / f32::from(i16::MAX)))
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read PCM samples")
}
