use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::store::StoreError;

/// Application-level error type shared by services and HTTP handlers.
///
/// Every variant renders as `{ "success": false, "code": ..., "message": ... }`
/// through [`IntoResponse`].
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing or malformed input. No state was changed.
    #[error("{0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// A duplicate of something that must be unique.
    #[error("{0}")]
    Conflict(String),

    /// Payment was already recorded for this fee.
    #[error("Fee is already paid")]
    AlreadyPaid,

    /// No active fee structure matched a generation request.
    #[error("{0}")]
    NoFeeStructure(String),

    #[error("{0}")]
    Unauthorized(String),

    /// A failure reported by the backing store.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for service and handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(entity: &'static str) -> Self {
        AppError::NotFound { entity }
    }

    /// Status code and machine-readable code for this error.
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Conflict(_) => (StatusCode::BAD_REQUEST, "CONFLICT"),
            AppError::AlreadyPaid => (StatusCode::BAD_REQUEST, "ALREADY_PAID"),
            AppError::NoFeeStructure(_) => (StatusCode::BAD_REQUEST, "NO_FEE_STRUCTURE"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Store(StoreError::Conflict { .. }) => (StatusCode::BAD_REQUEST, "CONFLICT"),
            AppError::Store(StoreError::Database(_)) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(format!("Invalid query string: {}", rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed with an internal error");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = json!({
            "success": false,
            "code": code,
            "message": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Validation("x".into()).status().0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::not_found("Fee").status().0, StatusCode::NOT_FOUND);
        assert_eq!(AppError::AlreadyPaid.status().1, "ALREADY_PAID");
        assert_eq!(
            AppError::Unauthorized("no".into()).status().0,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Store(StoreError::Conflict {
                constraint: "uq_students_roll_number".into()
            })
            .status(),
            (StatusCode::BAD_REQUEST, "CONFLICT")
        );
        assert_eq!(
            AppError::Internal("boom".into()).status().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages_are_human_readable() {
        assert_eq!(AppError::not_found("Student").to_string(), "Student not found");
        assert_eq!(AppError::AlreadyPaid.to_string(), "Fee is already paid");
    }

    #[test]
    fn test_internal_error_response_hides_details() {
        let response = AppError::Internal("connection refused".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
