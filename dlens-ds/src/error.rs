//! Error types for dlens-ds
//!
//! Every error leaves the service as `{"error": "<message>"}` with a status
//! code chosen by kind.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::exporter::ExportError;
use crate::services::image_source::FetchError;
use crate::services::object_store::ObjectStoreError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] ObjectStoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// dlens-common error
    #[error(transparent)]
    Common(#[from] dlens_common::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Export(ExportError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Export(ExportError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Fetch(FetchError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Common(dlens_common::Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, "{}", message);
        } else {
            tracing::debug!(status = %status, "{}", message);
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
