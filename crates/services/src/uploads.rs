use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use crate::error::{DispatchError, DispatchResult};

/// One file received from a client.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-supplied filename. Only its extension is trusted.
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Stages uploads as uniquely named temp files.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    supported: Vec<String>,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, supported: &[String]) -> Self {
        let supported = supported
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self {
            dir: dir.into(),
            supported,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lower-cased extension of `filename`, if it has one.
    pub fn extension_of(filename: &str) -> Option<String> {
        Path::new(filename)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }

    /// Returns the accepted extension or an error listing the supported ones.
    pub fn validate(&self, filename: &str) -> DispatchResult<String> {
        let extension = Self::extension_of(filename).unwrap_or_default();
        if self.supported.iter().any(|ext| *ext == extension) {
            return Ok(extension);
        }
        Err(DispatchError::UnsupportedFileType {
            extension: if extension.is_empty() {
                "(none)".to_string()
            } else {
                format!(".{}", extension)
            },
            supported: self
                .supported
                .iter()
                .map(|ext| format!(".{}", ext))
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// Writes the upload to `<dir>/<uuid>.<ext>` and returns the path.
    pub async fn save(&self, upload: &Upload) -> DispatchResult<PathBuf> {
        let extension = self.validate(&upload.filename)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(DispatchError::Storage)?;

        let path = self.dir.join(format!("{}.{}", Uuid::new_v4(), extension));
        tokio::fs::write(&path, &upload.bytes)
            .await
            .map_err(DispatchError::Storage)?;

        debug!(
            source = %upload.filename,
            path = %path.display(),
            bytes = upload.bytes.len(),
            "Upload staged"
        );
        Ok(path)
    }
}
