use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::ImageFormat;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{generate_id, strip_data_url, UploadedImage};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("画像ファイルのみアップロードできます")]
    NotAnImage,
    #[error("画像の読み込みに失敗しました")]
    Unreadable,
    #[error("最大{0}枚までアップロードできます")]
    LimitReached(usize),
}

/// Upload payload as sent by a client: a file name, its MIME type and the file
/// content as base64 or as a data URL.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadInput {
    pub name: String,
    pub mime_type: String,
    pub data: String,
}

fn format_mime(format: ImageFormat) -> &'static str {
    format.to_mime_type()
}

impl UploadedImage {
    /// Validates and normalises an upload into a data-URL-backed record.
    pub fn from_input(input: &UploadInput) -> Result<Self, UploadError> {
        if !input.mime_type.starts_with("image/") {
            return Err(UploadError::NotAnImage);
        }

        let payload = strip_data_url(input.data.trim());
        let bytes = STANDARD.decode(payload).map_err(|_| UploadError::Unreadable)?;
        if bytes.is_empty() {
            return Err(UploadError::Unreadable);
        }

        // Trust the sniffed format over the declared one when it is recognisable.
        let mime_type = match image::guess_format(&bytes) {
            Ok(format) if format_mime(format) != input.mime_type => {
                warn!("⚠️ Upload '{}' declared {} but looks like {}", input.name, input.mime_type, format_mime(format));
                format_mime(format).to_string()
            }
            _ => input.mime_type.clone(),
        };

        Ok(Self {
            id: generate_id("img"),
            name: input.name.clone(),
            base64: format!("data:{};base64,{}", mime_type, payload),
            mime_type,
            size_bytes: bytes.len() as u64,
        })
    }
}

/// The reference images of one session, bounded by `max_images`.
#[derive(Debug, Clone)]
pub struct UploadList {
    images: Vec<UploadedImage>,
    max_images: usize,
}

impl UploadList {
    pub fn new(max_images: usize) -> Self {
        Self { images: Vec::new(), max_images }
    }

    pub fn images(&self) -> &[UploadedImage] {
        &self.images
    }

    pub fn can_add_more(&self) -> bool {
        self.images.len() < self.max_images
    }

    pub fn add(&mut self, image: UploadedImage) -> Result<&UploadedImage, UploadError> {
        if !self.can_add_more() {
            return Err(UploadError::LimitReached(self.max_images));
        }
        info!("📎 Upload accepted: {} ({} bytes)", image.name, image.size_bytes);
        self.images.push(image);
        Ok(&self.images[self.images.len() - 1])
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.images.len();
        self.images.retain(|img| img.id != id);
        self.images.len() != before
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent PNG
    const PNG_1X1: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    fn input(mime: &str, data: &str) -> UploadInput {
        UploadInput { name: "ref.png".into(), mime_type: mime.into(), data: data.into() }
    }

    #[test]
    fn accepts_raw_base64_and_builds_data_url() {
        let img = UploadedImage::from_input(&input("image/png", PNG_1X1)).unwrap();
        assert_eq!(img.mime_type, "image/png");
        assert_eq!(img.base64, format!("data:image/png;base64,{PNG_1X1}"));
        assert!(img.size_bytes > 0);
        assert!(img.id.starts_with("img-"));
    }

    #[test]
    fn accepts_data_url_input() {
        let data = format!("data:image/png;base64,{PNG_1X1}");
        let img = UploadedImage::from_input(&input("image/png", &data)).unwrap();
        assert_eq!(strip_data_url(&img.base64), PNG_1X1);
    }

    #[test]
    fn sniffed_format_overrides_declared_type() {
        let img = UploadedImage::from_input(&input("image/jpeg", PNG_1X1)).unwrap();
        assert_eq!(img.mime_type, "image/png");
    }

    #[test]
    fn rejects_non_images_and_garbage() {
        assert_eq!(UploadedImage::from_input(&input("text/plain", PNG_1X1)), Err(UploadError::NotAnImage));
        assert_eq!(UploadedImage::from_input(&input("image/png", "%%%not base64%%%")), Err(UploadError::Unreadable));
        assert_eq!(UploadedImage::from_input(&input("image/png", "")), Err(UploadError::Unreadable));
    }

    #[test]
    fn list_is_bounded_and_removable() {
        let mut list = UploadList::new(2);
        let a = list.add(UploadedImage::from_input(&input("image/png", PNG_1X1)).unwrap()).unwrap().id.clone();
        list.add(UploadedImage::from_input(&input("image/png", PNG_1X1)).unwrap()).unwrap();
        let third = list.add(UploadedImage::from_input(&input("image/png", PNG_1X1)).unwrap());
        assert_eq!(third.unwrap_err(), UploadError::LimitReached(2));

        assert!(list.remove(&a));
        assert!(!list.remove(&a));
        assert_eq!(list.images().len(), 1);
        list.clear();
        assert!(list.images().is_empty());
    }
}
