//! Error types for the HTTP surface

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use scholar_common::Error as CommonError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::import::ImportError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload could not be turned into an importable table (400)
    #[error("Import failed: {0}")]
    Import(#[from] ImportError),

    /// Multipart body could not be decoded (400)
    #[error("Invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    /// Storage, domain and auth failures from the shared layer
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) | ApiError::Multipart(_) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST")
            }
            ApiError::Import(ImportError::Common(err)) | ApiError::Common(err) => common_parts(err),
            ApiError::Import(_) => (StatusCode::BAD_REQUEST, "IMPORT_UNREADABLE"),
        }
    }
}

fn common_parts(err: &CommonError) -> (StatusCode, &'static str) {
    match err {
        CommonError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        CommonError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        CommonError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        CommonError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        CommonError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
        CommonError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
        CommonError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        CommonError::Config(_) | CommonError::Internal(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.parts();

        // Internal details are logged, not returned
        let message = if status.is_server_error() {
            error!("{}", self);
            "Internal server error".to_string()
        } else {
            match &self {
                ApiError::Common(inner) | ApiError::Import(ImportError::Common(inner)) => {
                    inner_message(inner)
                }
                ApiError::Import(inner) => inner.to_string(),
                other => other.to_string(),
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

fn inner_message(err: &CommonError) -> String {
    match err {
        CommonError::Validation(msg)
        | CommonError::NotFound(msg)
        | CommonError::Forbidden(msg)
        | CommonError::Conflict(msg)
        | CommonError::Unauthenticated(msg) => msg.clone(),
        other => other.to_string(),
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
