//! Errors returned by [`crate::ApprovalService`].
//!
//! Domain rule violations pass through unchanged as [`WorkflowError::Rule`] so
//! callers can map each one to a precise response.

use orders::{OrderError, OrderId, RepositoryError, RetryPolicy};
use thiserror::Error;

/// Errors returned by [`crate::ApprovalService`].
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// No order with this id.
    #[error("order {0} not found")]
    NotFound(OrderId),

    /// The public token is malformed, unknown, or its request was already
    /// answered.
    #[error("unknown or closed info request")]
    UnknownInfoRequest,

    /// The request breaks a business rule.
    #[error(transparent)]
    Rule(#[from] OrderError),

    /// The repository failed.
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for WorkflowError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => Self::NotFound(id),
            other => Self::Repository(other),
        }
    }
}

impl WorkflowError {
    /// Retry guidance for callers.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Repository(err) => err.retry_policy(),
            _ => RetryPolicy::NonRetryable,
        }
    }
}
