//! In-process fakes for the engine and normalizer, so tests run without
//! model weights or ffmpeg.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::Transcript;
use crate::asr::{AudioInfo, Decoding, ModelLoader, Segment, SpeechModel};
use crate::config::EngineConfig;
use crate::normalize::{AudioNormalizer, FfmpegNormalizer, NormalizeError};
use crate::options::DecodeOptions;

/// Sample rate of the WAV files produced by [`wav_bytes`].
pub const SAMPLE_RATE: u32 = 16_000;
const HEADER_LEN: usize = 44;

/// File contents that make [`FakeModel`] fail inference.
pub const POISON: &[u8] = b"RIFF-poison-decoder-input";
pub const POISON_MESSAGE: &str = "decoder rejected input";

/// Loader that builds [`FakeModel`]s and records load/drop order.
#[derive(Clone, Default)]
pub struct FakeLoader {
    events: Arc<Mutex<Vec<String>>>,
    loads: Arc<AtomicUsize>,
    delay: Duration,
    load_delay: Duration,
    fail_on: Option<String>,
}

impl FakeLoader {
    /// Per-decode delay, to make inference measurably slower than a cache hit.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Delay before each load completes, to hold a swap open.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Loading this model size fails.
    pub fn failing_on(mut self, model_size: &str) -> Self {
        self.fail_on = Some(model_size.to_string());
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl ModelLoader for FakeLoader {
    fn load(&self, config: &EngineConfig) -> anyhow::Result<Box<dyn SpeechModel>> {
        if !self.load_delay.is_zero() {
            std::thread::sleep(self.load_delay);
        }
        if self.fail_on.as_deref() == Some(config.model_size.as_str()) {
            anyhow::bail!("weights for '{}' are corrupt", config.model_size);
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.events.lock().push(format!("load {}", config.model_size));
        Ok(Box::new(FakeModel {
            model_size: config.model_size.clone(),
            delay: self.delay,
            events: Arc::clone(&self.events),
        }))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Emits one segment per started second of audio.
pub struct FakeModel {
    model_size: String,
    delay: Duration,
    events: Arc<Mutex<Vec<String>>>,
}

impl SpeechModel for FakeModel {
    fn decode<'a>(
        &'a self,
        audio: &Path,
        language: Option<&str>,
        _options: &DecodeOptions,
    ) -> anyhow::Result<Decoding<'a>> {
        let bytes = std::fs::read(audio)?;
        if bytes.starts_with(POISON) {
            anyhow::bail!(POISON_MESSAGE);
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let samples = bytes.len().saturating_sub(HEADER_LEN) / 2;
        let duration = samples as f64 / f64::from(SAMPLE_RATE);
        let count = (duration.ceil() as usize).max(1);
        let segments = (0..count).map(move |i| {
            Ok(Segment {
                id: i,
                start: i as f64,
                end: ((i + 1) as f64).min(duration.max(1.0)),
                text: format!("segment {}", i),
            })
        });

        Ok(Decoding {
            info: AudioInfo {
                language: language.unwrap_or("en").to_string(),
                language_probability: Some(if language.is_some() { 1.0 } else { 0.9 }),
                duration,
            },
            segments: Box::new(segments),
        })
    }

    fn name(&self) -> &str {
        "fake"
    }
}

impl Drop for FakeModel {
    fn drop(&mut self) {
        self.events.lock().push(format!("drop {}", self.model_size));
    }
}

/// Accepts anything with a RIFF header and copies it next to the input.
#[derive(Clone, Default)]
pub struct FakeNormalizer {
    calls: Arc<AtomicUsize>,
}

impl FakeNormalizer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioNormalizer for FakeNormalizer {
    async fn normalize(&self, input: &Path) -> Result<PathBuf, NormalizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let bytes = tokio::fs::read(input)
            .await
            .map_err(|_| NormalizeError::MissingInput(input.to_path_buf()))?;
        if !bytes.starts_with(b"RIFF") {
            return Err(NormalizeError::Failed {
                status: "exit status: 1".to_string(),
                stderr: "Invalid data found when processing input".to_string(),
            });
        }

        let output = FfmpegNormalizer::output_path(input);
        tokio::fs::write(&output, &bytes)
            .await
            .map_err(NormalizeError::Io)?;
        Ok(output)
    }
}

/// Silent 16kHz mono 16-bit PCM WAV of the given length.
pub fn wav_bytes(seconds: f64) -> Vec<u8> {
    let samples = (seconds * f64::from(SAMPLE_RATE)) as u32;
    let data_len = samples * 2;

    let mut out = Vec::with_capacity(HEADER_LEN + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    out.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(HEADER_LEN + data_len as usize, 0);
    out
}

/// Writes [`wav_bytes`] into `dir/name`.
pub fn write_wav(dir: &Path, name: &str, seconds: f64) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, wav_bytes(seconds)).expect("write test wav");
    path
}

/// Minimal transcript with a single segment.
pub fn transcript(text: &str) -> Transcript {
    Transcript {
        text: text.to_string(),
        segments: vec![Segment {
            id: 0,
            start: 0.0,
            end: 1.0,
            text: text.to_string(),
        }],
        language: "en".to_string(),
        language_probability: Some(0.99),
        duration: 1.0,
        model_used: "base".to_string(),
        inference_time: 0.1,
    }
}
