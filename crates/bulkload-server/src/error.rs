//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::response::ErrorResponse;
use crate::db::DbError;
use crate::ingest::IngestError;

/// Result type alias for HTTP handlers
pub type ApiResult<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Conflict(_) => "CONFLICT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Database(_) | AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        if err.is_validation() {
            return AppError::Validation(err.to_string());
        }
        if err.is_conflict() {
            return AppError::Conflict(err.to_string());
        }
        match err {
            IngestError::NotFound(_) => AppError::NotFound(err.to_string()),
            IngestError::Database(e) => AppError::Database(e),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                "A database error occurred".to_string()
            },
            AppError::Internal(message) => {
                tracing::error!(error = %message, "Internal error");
                message.clone()
            },
            AppError::Validation(message)
            | AppError::Conflict(message)
            | AppError::NotFound(message) => message.clone(),
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}
