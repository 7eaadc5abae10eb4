use std::fmt;
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

const READ_CHUNK: usize = 64 * 1024;

/// Language component used when the language is auto-detected.
pub const AUTO_LANGUAGE: &str = "auto";

/// Content identity of an upload: SHA-256 of the original bytes plus the
/// requested language, so one file asked for in two languages maps to two
/// cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Fingerprint {
    digest: String,
    language: String,
}

impl Fingerprint {
    pub fn new(digest: impl Into<String>, language: Option<&str>) -> Self {
        Self {
            digest: digest.into(),
            language: language.unwrap_or(AUTO_LANGUAGE).to_string(),
        }
    }

    pub fn from_bytes(bytes: &[u8], language: Option<&str>) -> Self {
        Self::new(hex::encode(Sha256::digest(bytes)), language)
    }

    /// Hashes a file in chunks without loading it whole.
    pub async fn of_file(path: &Path, language: Option<&str>) -> std::io::Result<Self> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Self::new(hex::encode(hasher.finalize()), language))
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Leading 8 hex chars, for logs.
    pub fn short(&self) -> &str {
        &self.digest[..self.digest.len().min(8)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.digest, self.language)
    }
}
