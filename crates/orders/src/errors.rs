//! Domain error and retry-policy types for the order domain.
//!
//! [`OrderError`] covers every rule violation the domain can detect on its own:
//! inconsistent channel keys, impossible pricing inputs, illegal workflow
//! transitions and invalid info-request submissions. Infrastructure failures
//! (database, mail API) are defined next to their ports in [`crate::ports`].
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in retry decisions must be able to produce a [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ApprovalAction, ApprovalStatus, InfoField, Timestamp};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by infrastructure error types to let callers decide whether to
/// re-invoke an operation.
///
/// - `Retryable` errors: connection resets, mail API timeouts, rate limits.
/// - `NonRetryable` errors: conflicts, rejected payloads, corrupt rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    ///
    /// `after` optionally specifies the minimum delay before retrying (e.g.
    /// derived from a `Retry-After` response header).
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetryPolicy::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Domain errors
// ---------------------------------------------------------------------------

/// Business-rule violations detected by the order domain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    /// Both the affiliate key and the selection key are set on one order.
    ///
    /// The two keys are mutually exclusive; at most one may identify the
    /// channel.
    #[error("order has both an affiliate and a public selection; the channel is ambiguous")]
    ChannelConflict,

    /// A margin rate of 100 % or more makes the affiliate price undefined.
    #[error("margin rate {margin} leaves no room for a selling price (must be below 100 %)")]
    MarginRateTooHigh {
        /// The offending margin rate, as a percentage.
        margin: String,
    },

    /// The requested action is not allowed from the order's current status.
    #[error("cannot {action} an order in status {from}")]
    InvalidTransition {
        /// Status the order was in.
        from: ApprovalStatus,
        /// Action that was attempted.
        action: ApprovalAction,
    },

    /// A rejection was attempted without a reason.
    #[error("a rejection reason is required")]
    MissingRejectionReason,

    /// An info request was attempted without any field to complete.
    #[error("an info request must name at least one field")]
    NoFieldsRequested,

    /// The submission left requested fields blank.
    #[error("missing values for requested fields: {}", format_fields(.fields))]
    IncompleteSubmission {
        /// Requested fields that received no (or a blank) value.
        fields: Vec<InfoField>,
    },

    /// A submitted field value could not be parsed.
    #[error("invalid value for {field}: {reason}")]
    InvalidFieldValue {
        /// The field whose value is invalid.
        field: InfoField,
        /// Why the value was rejected.
        reason: String,
    },

    /// The info-request link has expired.
    #[error("the info request expired at {expired_at}")]
    InfoRequestExpired {
        /// When the link stopped being valid.
        expired_at: Timestamp,
    },

    /// The order has no line items.
    #[error("an order must have at least one line")]
    EmptyOrder,

    /// A price, total or sum does not fit in a decimal amount.
    #[error("amount out of range")]
    AmountOutOfRange,

    /// A line orders more units than an order may carry.
    #[error("quantity {quantity} exceeds the maximum of {max} units per line")]
    QuantityTooLarge {
        /// Units requested on the line.
        quantity: u32,
        /// Largest quantity accepted on one line.
        max: u32,
    },
}

fn format_fields(fields: &[InfoField]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
