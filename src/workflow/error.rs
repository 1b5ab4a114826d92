use thiserror::Error;
use uuid::Uuid;

use crate::auth::jwt::{SigningError, VerificationError};
use crate::auth::password::HashError;
use crate::models::approval::RequestStatus;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("missing or invalid fields: {}", fields.join(", "))]
    Validation { fields: Vec<String> },

    #[error("link rejected: {0}")]
    Verification(VerificationError),

    #[error("link does not match this action")]
    ActionMismatch,

    #[error("request {request_id} is {actual}, expected {expected}")]
    StaleTransition {
        request_id: Uuid,
        expected: RequestStatus,
        actual: RequestStatus,
    },

    #[error("request {request_id} was already {status}")]
    AlreadyResolved {
        request_id: Uuid,
        status: RequestStatus,
    },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    Duplicate(String),

    #[error(transparent)]
    Storage(StoreError),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Hashing(#[from] HashError),
}

impl WorkflowError {
    /// True when the link was valid but the request had already moved on.
    pub fn is_noop(&self) -> bool {
        matches!(
            self,
            WorkflowError::StaleTransition { .. } | WorkflowError::AlreadyResolved { .. }
        )
    }

    /// Short label for the rejected-link counter.
    pub fn rejection_reason(&self) -> &'static str {
        match self {
            WorkflowError::Verification(e) => e.as_str(),
            WorkflowError::ActionMismatch => "mismatch",
            WorkflowError::StaleTransition { .. } => "stale",
            WorkflowError::AlreadyResolved { .. } => "already_resolved",
            WorkflowError::NotFound(_) => "not_found",
            WorkflowError::Validation { .. } => "validation",
            WorkflowError::Duplicate(_) => "duplicate",
            WorkflowError::Storage(_) => "storage",
            WorkflowError::Signing(_) => "signing",
            WorkflowError::Hashing(_) => "hashing",
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(what) => WorkflowError::Duplicate(what),
            other => WorkflowError::Storage(other),
        }
    }
}
