//! HTTP endpoint modules.
//!
//! Shared error body and the `AgentError` → status mapping live here.

pub mod agent;
pub mod doc;
pub mod health;
pub mod remix_agent;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use relay_agent::AgentError;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<Json<T>, ApiError>;

fn error_body(status: StatusCode, error: impl Into<String>, details: Option<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            details,
        }),
    )
}

pub(crate) fn bad_request(message: impl Into<String>) -> ApiError {
    error_body(StatusCode::BAD_REQUEST, message, None)
}

fn budget_label(secs: u64) -> String {
    if secs < 60 {
        format!("{secs} seconds")
    } else {
        format!("{} minutes", secs / 60)
    }
}

/// Map a relay failure onto the HTTP status and body the dashboard expects.
pub(crate) fn agent_error(err: AgentError) -> ApiError {
    match &err {
        AgentError::Config(_) => error_body(StatusCode::INTERNAL_SERVER_ERROR, err.to_string(), None),
        AgentError::InvalidRequest(message) => bad_request(message.clone()),
        AgentError::UpstreamBusy { message, .. } => error_body(
            StatusCode::CONFLICT,
            "Agent is busy, please try again shortly",
            Some(message.clone()),
        ),
        AgentError::Upstream { status, message } => error_body(
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
            message.clone(),
            None,
        ),
        AgentError::ProcessingFailed { .. } => error_body(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Agent failed to process the request",
            None,
        ),
        AgentError::Timeout { budget_secs, .. } => error_body(
            StatusCode::REQUEST_TIMEOUT,
            format!("Agent did not complete response within {}", budget_label(*budget_secs)),
            Some(err.to_string()),
        ),
        AgentError::Http(_) | AgentError::Decode(_) => {
            tracing::error!(error = %err, "agent service call failed");
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to reach agent service",
                Some(err.to_string()),
            )
        }
    }
}
