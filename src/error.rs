use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Failures surfaced by the service layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The storage backend failed while serving the operation.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// No storage backend is installed right now.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// The request payload failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The operation does not apply to the target's current status.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The addressed game or question set does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

/// REST-facing error, one variant per response status.
#[derive(Debug, Error)]
pub enum AppError {
    /// 400.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// 404.
    #[error("not found: {0}")]
    NotFound(String),
    /// 409.
    #[error("conflict: {0}")]
    Conflict(String),
    /// 503, including degraded mode.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorMessage {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorMessage {
            message: self.to_string(),
        });
        (self.status(), body).into_response()
    }
}
