use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

use crate::models::{strip_data_url, GeneratedImage};
use crate::session::GenerationSession;

pub fn download_filename(image: &GeneratedImage) -> String {
    format!("figure_{}.png", image.created_at.timestamp_millis())
}

/// Decoded PNG bytes of a generated image.
pub fn image_bytes(image: &GeneratedImage) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(strip_data_url(&image.base64))
}

/// Which results a bulk download covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadScope {
    Selected,
    All,
}

pub fn download_set(session: &GenerationSession, scope: DownloadScope) -> Vec<&GeneratedImage> {
    match scope {
        DownloadScope::Selected => session.selected().collect(),
        DownloadScope::All => session.results.iter().collect(),
    }
}
