use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

use crate::storage::CredentialError;
use crate::upload::UploadError;

/// Errors surfaced by the session and credential routes.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("session not found")]
    SessionNotFound,
    #[error("image not found")]
    ImageNotFound,
    #[error("生成中です。完了までお待ちください")]
    AlreadyGenerating,
    #[error("生成枚数は{min}〜{max}枚で指定してください")]
    InvalidCount { min: u32, max: u32 },
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("Other: {0}")]
    Other(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::SessionNotFound | AppError::ImageNotFound => StatusCode::NOT_FOUND,
            AppError::AlreadyGenerating => StatusCode::CONFLICT,
            AppError::InvalidCount { .. } | AppError::Upload(_) | AppError::Credential(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("❌ {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
