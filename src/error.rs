//! Error handling for the application

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::commercial::errors::{CommercialError, PersistenceError};
use crate::commercial::responses::ErrorResponse;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Commercial record not found")]
    NotFound,

    #[error(transparent)]
    Commercial(#[from] CommercialError),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, Option<serde_json::Value>) {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "not_found", None),
            AppError::Commercial(CommercialError::Validation(e)) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                Some(serde_json::json!({ "field": e.field() })),
            ),
            AppError::Commercial(CommercialError::SaveInProgress(_)) => {
                (StatusCode::CONFLICT, "save_in_progress", None)
            }
            AppError::Commercial(CommercialError::Persistence(e)) => match e {
                PersistenceError::Rejected { field_errors, .. } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "rejected",
                    (!field_errors.is_empty()).then(|| serde_json::json!(field_errors)),
                ),
                PersistenceError::Conflict {
                    expected, actual, ..
                } => (
                    StatusCode::CONFLICT,
                    "conflict",
                    Some(serde_json::json!({
                        "expectedVersion": expected,
                        "currentVersion": actual,
                    })),
                ),
                PersistenceError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout", None),
                PersistenceError::Database(_) => {
                    tracing::error!("Persistence error: {}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "persistence_error", None)
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, details) = self.parts();
        let message = match &self {
            AppError::NotFound => self.to_string(),
            AppError::Commercial(e) => e.user_message(),
        };

        let body = ErrorResponse {
            error_type: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
