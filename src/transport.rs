//! The network boundary seen by the orchestrator.
//!
//! Two implementations: [`HttpTransport`] speaks the JSON endpoint format to a
//! remote `figure_studio` server, and [`GeminiClient`] answers in-process.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{info, warn};

use crate::gemini::GeminiClient;
use crate::models::{GenerateImageRequest, GenerateImageResponse};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("invalid response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// One batch unit. Non-success responses come back as `Ok` with `success = false`;
    /// `Err` is reserved for failures below the endpoint (connection, decoding).
    async fn generate(&self, request: &GenerateImageRequest) -> Result<GenerateImageResponse, TransportError>;
}

#[async_trait]
impl<T: ImageGenerator + ?Sized> ImageGenerator for Arc<T> {
    async fn generate(&self, request: &GenerateImageRequest) -> Result<GenerateImageResponse, TransportError> {
        (**self).generate(request).await
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate(&self, request: &GenerateImageRequest) -> Result<GenerateImageResponse, TransportError> {
        let (status, response) = self.respond_generate_image(request).await;
        if status != 200 {
            warn!("⚠️ In-process generation failed with status {}", status);
        }
        Ok(response)
    }
}

/// Client for a remote `/api/generate-image` endpoint.
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: Client::new(), base_url: base_url.into().trim_end_matches('/').to_string() }
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<(reqwest::StatusCode, R), TransportError>
    where
        B: serde::Serialize + Sync + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        info!("🔗 POST {}", url);
        let response = self.client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| TransportError::Http(e.to_string()))?;
        let parsed = serde_json::from_str(&text)
            .map_err(|e| TransportError::Decode(format!("status={} {}", status, e)))?;
        Ok((status, parsed))
    }
}

#[async_trait]
impl ImageGenerator for HttpTransport {
    async fn generate(&self, request: &GenerateImageRequest) -> Result<GenerateImageResponse, TransportError> {
        let (status, mut body): (_, GenerateImageResponse) = self.post("/api/generate-image", request).await?;
        if !status.is_success() {
            body.success = false;
        }
        Ok(body)
    }
}
