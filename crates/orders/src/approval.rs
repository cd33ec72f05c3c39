//! LinkMe order approval state machine.
//!
//! ```text
//!                       approve
//!   pending_admin_validation ───────────▶ approved
//!      │   ▲         │ reject
//!      │   │         └──────────────────▶ rejected
//!      │   │ submit_info                    ▲
//!      │   │                                │ reject
//!      ▼   │                                │
//!   info_requested ─────────────────────────┘
//!      (request_info from pending)
//! ```
//!
//! `approved` and `rejected` are terminal. Every applied transition is recorded
//! as a [`StatusChange`] for the order's audit trail.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ActorId, OrderError, OrderId, Timestamp};

/// Approval status of a LinkMe order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Waiting for a back-office decision.
    PendingAdminValidation,
    /// Accepted; the order proceeds to fulfilment.
    Approved,
    /// Refused; a reason was given to the requester.
    Rejected,
    /// Waiting for the requester to complete missing details.
    InfoRequested,
}

impl ApprovalStatus {
    /// Every status, in workflow order.
    pub const ALL: [ApprovalStatus; 4] = [
        Self::PendingAdminValidation,
        Self::InfoRequested,
        Self::Approved,
        Self::Rejected,
    ];

    /// Database / wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingAdminValidation => "pending_admin_validation",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::InfoRequested => "info_requested",
        }
    }

    /// Returns `true` if no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Returns the status reached by applying `action`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] if `action` is not allowed
    /// from this status.
    pub fn apply(self, action: ApprovalAction) -> Result<ApprovalStatus, OrderError> {
        use ApprovalAction as A;
        use ApprovalStatus as S;

        match (self, action) {
            (S::PendingAdminValidation, A::Approve) => Ok(S::Approved),
            (S::PendingAdminValidation, A::Reject) => Ok(S::Rejected),
            (S::PendingAdminValidation, A::RequestInfo) => Ok(S::InfoRequested),
            (S::InfoRequested, A::SubmitInfo) => Ok(S::PendingAdminValidation),
            (S::InfoRequested, A::Reject) => Ok(S::Rejected),
            (from, action) => Err(OrderError::InvalidTransition { from, action }),
        }
    }

    /// Returns `true` if `action` is allowed from this status.
    pub fn allows(self, action: ApprovalAction) -> bool {
        self.apply(action).is_ok()
    }
}

impl FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown approval status: {s}"))
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action that moves an order through the approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    /// Staff accept the order.
    Approve,
    /// Staff refuse the order, with a reason.
    Reject,
    /// Staff ask the requester for missing details.
    RequestInfo,
    /// Performed by the requester through the public link, not by staff.
    SubmitInfo,
}

impl ApprovalAction {
    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::RequestInfo => "request_info",
            Self::SubmitInfo => "submit_info",
        }
    }
}

impl std::fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Audit trail
// ---------------------------------------------------------------------------

/// One applied transition, as stored in the order's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Order the transition applies to.
    pub order_id: OrderId,
    /// Status before the transition. Repositories only apply the change if
    /// the stored status still equals this value.
    pub from: ApprovalStatus,
    /// Status after the transition.
    pub to: ApprovalStatus,
    /// Action that caused it.
    pub action: ApprovalAction,
    /// Staff member, or `None` when the requester acted through the public link.
    pub actor: Option<ActorId>,
    /// Free-text note: rejection reason, message sent with an info request.
    pub note: Option<String>,
    /// When the transition was applied.
    pub at: Timestamp,
}

impl StatusChange {
    /// Validates `action` against `from` and builds the audit record.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] if `action` is not allowed.
    pub fn new(
        order_id: OrderId,
        from: ApprovalStatus,
        action: ApprovalAction,
        actor: Option<ActorId>,
        note: Option<String>,
        at: Timestamp,
    ) -> Result<Self, OrderError> {
        let to = from.apply(action)?;
        Ok(Self {
            order_id,
            from,
            to,
            action,
            actor,
            note,
            at,
        })
    }
}
