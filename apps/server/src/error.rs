use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use pocketplan_core::plans::PlanValidationError;
use pocketplan_core::Error as CoreError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    /// Retryable storage failure. Details are logged, not returned.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e @ PlanValidationError::TooLarge { .. }) => {
                Self::PayloadTooLarge(e.to_string())
            }
            CoreError::Validation(e) => Self::BadRequest(e.to_string()),
            CoreError::Unauthorized(message) => Self::Unauthorized(message),
            CoreError::Unsupported(message) => Self::BadRequest(message),
            err if err.is_retryable() => Self::StorageUnavailable(err.to_string()),
            err => Self::Internal(err.to_string()),
        }
    }
}

/// Body buffering failures, most often the transport size limit, surface with the
/// same JSON shape as every other error.
impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(
                "Plan payload too large: request body exceeds the transport limit".to_string(),
            )
        } else {
            Self::BadRequest(rejection.body_text())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::StorageUnavailable(detail) => {
                tracing::warn!("[Api] {}", detail);
                "Storage is temporarily unavailable, retry shortly".to_string()
            }
            Self::Internal(detail) => {
                tracing::error!("[Api] {}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            code: self.code(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
