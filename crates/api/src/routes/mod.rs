pub mod admin;
pub mod health;
pub mod jobs;
pub mod transcribe;

use axum::extract::Multipart;
use scribe_services::Upload;
use scribe_transcription::{DecodeOptions, DecodeProfile};
use serde::Deserialize;

use crate::error::ApiError;

/// Query parameters shared by every transcription route.
#[derive(Debug, Default, Deserialize)]
pub struct TranscribeParams {
    /// Language tag; missing, empty or "auto" means auto-detect.
    pub language: Option<String>,
    /// Decode profile: fast, balanced or accurate.
    pub profile: Option<String>,
    /// Comma-separated glossary terms.
    pub keywords: Option<String>,
}

impl TranscribeParams {
    pub fn decode_options(&self) -> Result<DecodeOptions, ApiError> {
        let profile = match self.profile.as_deref().map(str::trim) {
            None | Some("") => DecodeProfile::default(),
            Some(name) => name.parse::<DecodeProfile>().map_err(ApiError::BadRequest)?,
        };
        let options = profile.options();
        Ok(match self.keywords.as_deref() {
            Some(keywords) => options.with_glossary(keywords),
            None => options,
        })
    }
}

/// Collects every file part named `field` from a multipart body.
pub async fn read_uploads(mut multipart: Multipart, field: &str) -> Result<Vec<Upload>, ApiError> {
    let mut uploads = Vec::new();

    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if part.name() != Some(field) {
            continue;
        }
        let filename = part.file_name().unwrap_or("unnamed").to_string();
        let bytes = part
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
        uploads.push(Upload::new(filename, bytes.to_vec()));
    }

    Ok(uploads)
}

/// Like [`read_uploads`] but requires exactly one file.
pub async fn read_single_upload(multipart: Multipart, field: &str) -> Result<Upload, ApiError> {
    read_uploads(multipart, field)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::BadRequest(format!("Missing '{}' field", field)))
}
