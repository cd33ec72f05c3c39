//! Mapping of workflow errors to HTTP statuses and stable error codes.
//!
//! Server-side failures never echo store or mail details to the caller; they
//! are logged and answered with a generic message.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use orders::{OrderError, RepositoryError, RetryPolicy};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use workflow::WorkflowError;

/// Errors returned by HTTP handlers, rendered as `{"error", "message"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or invalid admin token")]
    Unauthorized,

    /// Malformed path, query or body.
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl ApiError {
    /// HTTP status and stable machine-readable code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Workflow(err) => workflow_status(err),
        }
    }
}

fn workflow_status(err: &WorkflowError) -> (StatusCode, &'static str) {
    match err {
        WorkflowError::NotFound(_) => (StatusCode::NOT_FOUND, "order_not_found"),
        WorkflowError::UnknownInfoRequest => (StatusCode::NOT_FOUND, "unknown_info_request"),
        WorkflowError::Rule(rule) => match rule {
            OrderError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
            OrderError::InfoRequestExpired { .. } => (StatusCode::GONE, "info_request_expired"),
            OrderError::ChannelConflict => (StatusCode::UNPROCESSABLE_ENTITY, "channel_conflict"),
            OrderError::MarginRateTooHigh { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "margin_rate_too_high")
            }
            OrderError::MissingRejectionReason => {
                (StatusCode::UNPROCESSABLE_ENTITY, "missing_rejection_reason")
            }
            OrderError::NoFieldsRequested => (StatusCode::UNPROCESSABLE_ENTITY, "no_fields_requested"),
            OrderError::IncompleteSubmission { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "incomplete_submission")
            }
            OrderError::InvalidFieldValue { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_field_value")
            }
            OrderError::EmptyOrder => (StatusCode::UNPROCESSABLE_ENTITY, "empty_order"),
            OrderError::AmountOutOfRange => {
                (StatusCode::UNPROCESSABLE_ENTITY, "amount_out_of_range")
            }
            OrderError::QuantityTooLarge { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "quantity_too_large")
            }
        },
        WorkflowError::Repository(repo) => match repo {
            RepositoryError::Duplicate(_) => (StatusCode::CONFLICT, "duplicate_order"),
            RepositoryError::Conflict { .. } => (StatusCode::CONFLICT, "concurrent_update"),
            RepositoryError::NotFound(_) => (StatusCode::NOT_FOUND, "order_not_found"),
            RepositoryError::Backend(_) => (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable"),
            RepositoryError::Corrupt(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = if status.is_server_error() {
            error!(error = %self, code, "request failed");
            // Store details stay in the logs.
            match status {
                StatusCode::SERVICE_UNAVAILABLE => "order store unavailable, retry later".to_string(),
                _ => "internal error".to_string(),
            }
        } else {
            self.to_string()
        };

        let retry = match &self {
            Self::Workflow(err) => err.retry_policy(),
            _ => RetryPolicy::NonRetryable,
        };
        let mut resp = (status, Json(ErrorBody { error: code, message })).into_response();
        if retry.is_retryable() {
            resp.headers_mut()
                .insert("retry-after", HeaderValue::from_static("1"));
        }
        resp
    }
}
