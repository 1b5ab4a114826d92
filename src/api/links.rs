//! HTML pages for the emailed approve/deny links.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use crate::models::approval::RequestStatus;
use crate::workflow::messages::escape_html;
use crate::workflow::token::Decision;
use crate::workflow::{Intent, TransitionResult, WorkflowError};
use crate::AppState;

pub async fn resolve_link(state: Arc<AppState>, token: String, intent: Intent) -> Response {
    match state.engine.resolve(&token, intent).await {
        Ok(result) => page(StatusCode::OK, "Done", &success_text(&result, intent)),
        Err(e) => error_page(&e),
    }
}

fn success_text(result: &TransitionResult, intent: Intent) -> String {
    let label = result.kind.label();
    match (intent.decision, result.to) {
        (Decision::Deny, _) => format!("The {} has been denied.", label),
        (Decision::Approve, RequestStatus::Approved) => {
            format!("The {} has been approved.", label)
        }
        (Decision::Approve, _) => format!(
            "The {} has been approved at the {} stage and forwarded for final approval.",
            label, intent.tier
        ),
    }
}

fn error_page(err: &WorkflowError) -> Response {
    match err {
        WorkflowError::AlreadyResolved { status, .. } => page(
            StatusCode::OK,
            "Already processed",
            &format!("This request has already been {}.", status),
        ),
        WorkflowError::StaleTransition { .. } => page(
            StatusCode::OK,
            "Already processed",
            "This request has already been processed at this stage.",
        ),
        WorkflowError::NotFound(_) => page(
            StatusCode::NOT_FOUND,
            "Not found",
            "The request this link refers to no longer exists.",
        ),
        WorkflowError::Storage(_)
        | WorkflowError::Signing(_)
        | WorkflowError::Hashing(_) => page(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Something went wrong",
            "The request could not be processed. Please try the link again later.",
        ),
        _ => page(
            StatusCode::BAD_REQUEST,
            "Invalid link",
            "This link is invalid or has expired.",
        ),
    }
}

fn page(status: StatusCode, title: &str, body: &str) -> Response {
    let html = format!(
        r#"<!DOCTYPE html><html><head><meta charset="utf-8"><title>{title}</title></head><body style="font-family: Arial, sans-serif; color: #333; margin: 40px;"><h2 style="color: #2c3e50;">{title}</h2><p>{body}</p></body></html>"#,
        title = escape_html(title),
        body = escape_html(body),
    );
    (status, Html(html)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::VerificationError;
    use uuid::Uuid;

    #[test]
    fn test_already_resolved_is_not_an_error_page() {
        let resp = error_page(&WorkflowError::AlreadyResolved {
            request_id: Uuid::new_v4(),
            status: RequestStatus::Denied,
        });
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn test_link_failures_are_bad_request() {
        for err in [
            WorkflowError::Verification(VerificationError::Expired),
            WorkflowError::Verification(VerificationError::BadSignature),
            WorkflowError::ActionMismatch,
        ] {
            assert_eq!(error_page(&err).status(), StatusCode::BAD_REQUEST);
        }
    }
}
