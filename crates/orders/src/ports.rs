//! Port traits implemented by infrastructure crates.
//!
//! | Port | Implemented by |
//! |------|----------------|
//! | [`OrderRepository`] | `store` (Postgres, in-memory) |
//! | [`Notifier`] | `mailer` (mail API, log sink) |
//! | [`Clock`] | [`SystemClock`] here; fixed clocks in tests |

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    ApprovalStatus, ChannelKind, Notification, Order, OrderId, RetryPolicy, StatusChange,
    Timestamp, TokenHash,
};

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Criteria for listing orders. `None` fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilter {
    pub status: Option<ApprovalStatus>,
    pub channel: Option<ChannelKind>,
    /// Maximum number of orders returned, newest first.
    pub limit: Option<u32>,
}

impl OrderFilter {
    /// Default page size when [`OrderFilter::limit`] is unset.
    pub const DEFAULT_LIMIT: u32 = 100;

    /// Effective limit, capped at 500.
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, 500)
    }

    /// Returns `true` if `order` satisfies the status and channel criteria.
    ///
    /// Orders whose channel cannot be derived never match a channel filter.
    pub fn matches(&self, order: &Order) -> bool {
        if self.status.is_some_and(|s| s != order.status) {
            return false;
        }
        match self.channel {
            None => true,
            Some(kind) => order.channel().is_ok_and(|c| c.kind() == kind),
        }
    }
}

/// Failures reported by an [`OrderRepository`].
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// An order with the same id or reference already exists.
    #[error("order {0} already exists")]
    Duplicate(String),

    /// The order does not exist.
    #[error("order {0} not found")]
    NotFound(OrderId),

    /// The stored status no longer matches the transition's `from` status;
    /// someone else acted on the order first.
    #[error("order {order_id} is no longer in status {expected}")]
    Conflict {
        order_id: OrderId,
        expected: ApprovalStatus,
    },

    /// A stored row could not be mapped back to the domain.
    #[error("corrupt order data: {0}")]
    Corrupt(String),

    /// The backing store is unreachable or failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl RepositoryError {
    /// Retry guidance for this error.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Backend(_) => RetryPolicy::Retryable { after: None },
            _ => RetryPolicy::NonRetryable,
        }
    }
}

/// Persistence for orders and their approval history.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Stores a new order.
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError>;

    /// Loads an order with its lines.
    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Lists orders matching `filter`, newest first.
    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError>;

    /// Finds the order whose open info request has this token hash.
    async fn find_by_info_token(&self, hash: &TokenHash) -> Result<Option<Order>, RepositoryError>;

    /// Persists `updated` and appends `change` to the history, atomically, but
    /// only if the stored status still equals `change.from`.
    ///
    /// `updated` carries the order's new status, details, info request and
    /// rejection reason. Lines are not rewritten.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Conflict`] if the stored status differs, and
    /// [`RepositoryError::NotFound`] if the order does not exist.
    async fn record_transition(
        &self,
        change: &StatusChange,
        updated: &Order,
    ) -> Result<(), RepositoryError>;

    /// Returns the order's transitions, oldest first.
    async fn history(&self, id: OrderId) -> Result<Vec<StatusChange>, RepositoryError>;
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Failures reported by a [`Notifier`].
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The mail service answered with a non-success status.
    #[error("mail service returned HTTP {status}: {body}")]
    Rejected {
        status: u16,
        body: String,
        /// Parsed `Retry-After`, when present.
        retry_after: Option<Duration>,
    },

    /// The request never got an answer (DNS, TLS, timeout).
    #[error("mail transport error: {0}")]
    Transport(String),

    /// The notifier is misconfigured (e.g. missing API key).
    #[error("notifier configuration error: {0}")]
    Configuration(String),
}

impl NotifyError {
    /// Retry guidance: transport failures, rate limits and server errors are
    /// retryable; other rejections and configuration errors are not.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Transport(_) => RetryPolicy::Retryable { after: None },
            Self::Rejected {
                status,
                retry_after,
                ..
            } if *status == 429 || *status >= 500 => RetryPolicy::Retryable {
                after: *retry_after,
            },
            _ => RetryPolicy::NonRetryable,
        }
    }
}

/// Delivers notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}
