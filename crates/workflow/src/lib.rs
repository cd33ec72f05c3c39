//! LinkMe order approval workflow.
//!
//! This crate provides [`ApprovalService`], which drives an order through the
//! approval state machine defined in [`orders::approval`]: it loads the order,
//! applies the domain rule, persists the transition through
//! [`orders::OrderRepository`] and sends the matching
//! [`orders::Notification`].
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** The service sequences calls between business logic
//! in the [`orders`] crate and infrastructure traits (repository, notifier,
//! clock). It contains no domain rules of its own.
//!
//! ## Failure semantics
//!
//! A transition is committed before its notification is sent. Notification
//! failures are logged and never undo a committed transition; staff can see
//! the order's new status regardless of mail delivery.

mod error;
mod service;
mod settings;
mod views;

pub use error::WorkflowError;
pub use service::ApprovalService;
pub use settings::WorkflowSettings;
pub use views::{
    FieldPrompt, InfoRequestIssued, NewOrder, NewOrderLine, OrderView, PublicInfoRequest, Quote,
    QuoteLine, QuoteRequest,
};
