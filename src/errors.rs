use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;
use crate::workflow::WorkflowError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("approver role required")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error("insufficient stock: {available} available")]
    InsufficientStock { available: f64 },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Workflow(WorkflowError::from(err))
    }
}

impl AppError {
    /// Status, error type, code and client-facing message.
    fn parts(&self) -> (StatusCode, &'static str, &'static str, String) {
        match self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "invalid_token",
                "invalid or missing token".to_string(),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "permission_error",
                "approver_required",
                "this action requires an admin or super-admin account".to_string(),
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "bad_request",
                msg.clone(),
            ),
            AppError::InsufficientStock { available } => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "insufficient_stock",
                format!("insufficient stock: only {} available", available),
            ),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                "not_found",
                format!("{} not found", what),
            ),
            AppError::Workflow(e) => workflow_parts(e),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                internal()
            }
        }
    }
}

fn internal() -> (StatusCode, &'static str, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal_server_error",
        "internal server error".to_string(),
    )
}

fn workflow_parts(e: &WorkflowError) -> (StatusCode, &'static str, &'static str, String) {
    match e {
        WorkflowError::Validation { .. } => (
            StatusCode::BAD_REQUEST,
            "invalid_request_error",
            "validation_failed",
            e.to_string(),
        ),
        // every link failure reads the same
        WorkflowError::Verification(_) | WorkflowError::ActionMismatch => (
            StatusCode::BAD_REQUEST,
            "invalid_request_error",
            "invalid_link",
            "invalid or expired link".to_string(),
        ),
        WorkflowError::StaleTransition { .. } | WorkflowError::AlreadyResolved { .. } => (
            StatusCode::CONFLICT,
            "conflict_error",
            "already_processed",
            e.to_string(),
        ),
        WorkflowError::NotFound(_) => (
            StatusCode::NOT_FOUND,
            "not_found_error",
            "not_found",
            e.to_string(),
        ),
        WorkflowError::Duplicate(_) => (
            StatusCode::CONFLICT,
            "conflict_error",
            "duplicate",
            e.to_string(),
        ),
        WorkflowError::Storage(inner) => {
            tracing::error!("Storage error: {}", inner);
            internal()
        }
        WorkflowError::Signing(inner) => {
            tracing::error!("Token signing error: {}", inner);
            internal()
        }
        WorkflowError::Hashing(inner) => {
            tracing::error!("Password hashing error: {}", inner);
            internal()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = self.parts();

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::VerificationError;

    #[test]
    fn test_link_failures_share_one_message() {
        let expired = AppError::from(WorkflowError::Verification(VerificationError::Expired));
        let mismatch = AppError::from(WorkflowError::ActionMismatch);
        assert_eq!(expired.parts(), mismatch.parts());
        assert_eq!(expired.parts().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_storage_failure_is_opaque() {
        let err = AppError::from(StoreError::Unavailable);
        let (status, _, code, msg) = err.parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "internal_server_error");
        assert!(!msg.contains("unavailable"));
    }

    #[test]
    fn test_duplicate_store_error_maps_to_conflict() {
        let err = AppError::from(StoreError::Duplicate("email".into()));
        assert_eq!(err.parts().0, StatusCode::CONFLICT);
    }
}
