//! HTTP error mapping.

use crate::input::InputError;
use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing request fields (400)
    #[error("{0}")]
    Validation(String),

    /// Decoded payload above the upload limit (413)
    #[error("{0}")]
    TooLarge(String),

    /// Decodable but disallowed encoding (415)
    #[error("{0}")]
    UnsupportedFormat(String),

    /// Unexpected fault (500). The detail is logged, never returned.
    #[error("internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "ValidationError"),
            ApiError::TooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "FileTooLargeError"),
            ApiError::UnsupportedFormat(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UnsupportedFileTypeError")
            }
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        }
    }
}

impl From<InputError> for ApiError {
    fn from(err: InputError) -> Self {
        match err {
            InputError::TooLarge { .. } => ApiError::TooLarge(err.to_string()),
            InputError::UnsupportedFormat(_) => ApiError::UnsupportedFormat(err.to_string()),
            InputError::Empty | InputError::InvalidBase64(_) | InputError::Decode(_) => {
                ApiError::Validation(err.to_string())
            }
        }
    }
}

impl ApiError {
    /// Body extraction failures keep axum's 413 for bodies over the request limit.
    fn from_rejection(status: StatusCode, message: String) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::TooLarge(message)
        } else {
            ApiError::Validation(message)
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::from_rejection(err.status(), err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.parts();
        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "internal error");
                "An internal error occurred".to_string()
            }
            other => {
                tracing::warn!(error_type, message = %other, "request rejected");
                other.to_string()
            }
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "type": error_type,
                "message": message,
                "status_code": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
