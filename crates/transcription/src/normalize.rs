use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("input file missing: {}", .0.display())]
    MissingInput(PathBuf),
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("converter exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),
}

/// Converts an arbitrary audio upload into the format the engine expects.
///
/// Must write a new file and leave the input untouched: the input's bytes
/// are the content identity used for caching.
#[async_trait]
pub trait AudioNormalizer: Send + Sync + 'static {
    async fn normalize(&self, input: &Path) -> Result<PathBuf, NormalizeError>;
}

/// Resamples and downmixes via an `ffmpeg` subprocess into 16-bit PCM WAV.
pub struct FfmpegNormalizer {
    program: String,
    sample_rate: u32,
    channels: u16,
}

impl FfmpegNormalizer {
    pub fn new(program: impl Into<String>, sample_rate: u32, channels: u16) -> Self {
        Self {
            program: program.into(),
            sample_rate,
            channels,
        }
    }

    /// `<dir>/<stem>.normalized.wav` next to the input.
    pub fn output_path(input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        input.with_file_name(format!("{}.normalized.wav", stem))
    }
}

impl Default for FfmpegNormalizer {
    fn default() -> Self {
        Self::new("ffmpeg", 16_000, 1)
    }
}

#[async_trait]
impl AudioNormalizer for FfmpegNormalizer {
    async fn normalize(&self, input: &Path) -> Result<PathBuf, NormalizeError> {
        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(NormalizeError::MissingInput(input.to_path_buf()));
        }

        let output = Self::output_path(input);
        let result = Command::new(&self.program)
            .args(["-nostdin", "-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(input)
            .arg("-ar")
            .arg(self.sample_rate.to_string())
            .arg("-ac")
            .arg(self.channels.to_string())
            .args(["-c:a", "pcm_s16le"])
            .arg(&output)
            .output()
            .await
            .map_err(|source| NormalizeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !result.status.success() {
            let _ = tokio::fs::remove_file(&output).await;
            let stderr = String::from_utf8_lossy(&result.stderr);
            let stderr = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("no diagnostic output")
                .trim()
                .to_string();
            warn!(input = %input.display(), %stderr, "Audio normalization failed");
            return Err(NormalizeError::Failed {
                status: result.status.to_string(),
                stderr,
            });
        }

        debug!(input = %input.display(), output = %output.display(), "Audio normalized");
        Ok(output)
    }
}
