use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// An optimistic transition lost a race. Surfaced to clients as
    /// "no longer available", not as a hard failure.
    #[error("State conflict: {0}")]
    StateConflict(String),

    /// The attempted transition is not an edge of the booking lifecycle.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Driver tried to act on a booking outside its vehicle types, or while
    /// unavailable or unapproved.
    #[error("Not eligible: {0}")]
    NotEligible(String),

    #[error("Booking already rated")]
    AlreadyRated,

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::NotEligible(_) => (StatusCode::FORBIDDEN, "not_eligible"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::StateConflict(_) => (StatusCode::CONFLICT, "state_conflict"),
            AppError::AlreadyRated => (StatusCode::CONFLICT, "already_rated"),
            AppError::InvalidTransition { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_transition")
            }
            AppError::Database(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        // Internal details stay out of client responses.
        let message = match &self {
            AppError::Database(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_conflict_maps_to_conflict() {
        let resp = AppError::StateConflict("taken".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = AppError::InvalidTransition {
            from: "COMPLETED".to_string(),
            to: "CANCELLED".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid transition from COMPLETED to CANCELLED");
    }

    #[test]
    fn test_database_error_hides_details() {
        let resp = AppError::Internal("secret detail".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
