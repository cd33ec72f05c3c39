//! Order domain for the LinkMe back-office.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, pricing formula and approval rule used throughout the workspace.
//! Infrastructure crates implement the traits defined in [`ports`]; they never
//! add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`OrderId`, `AffiliateId`, etc.) |
//! | [`types`] | Shared value types (`Money`, `Rate`, `Quantity`, `Timestamp`, etc.) |
//! | [`errors`] | Domain error and retry-policy types |
//! | [`channel`] | Channel derivation from the order's two nullable keys |
//! | [`pricing`] | Selling price, retrocession and per-step rounded totals |
//! | [`approval`] | Approval status state machine and audit records |
//! | [`details`] | LinkMe requester/delivery/billing details |
//! | [`info_request`] | Tokenized requests for missing details |
//! | [`order`] | The order aggregate and its lines |
//! | [`notification`] | E-mail notifications produced by workflow steps |
//! | [`ports`] | Repository, notifier and clock traits |

pub mod approval;
pub mod channel;
pub mod details;
pub mod errors;
pub mod identifiers;
pub mod info_request;
pub mod notification;
pub mod order;
pub mod ports;
pub mod pricing;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use approval::{ApprovalAction, ApprovalStatus, StatusChange};
pub use channel::{ChannelKind, OrderChannel};
pub use details::{InfoField, LinkMeDetails};
pub use errors::{OrderError, RetryPolicy};
pub use identifiers::{
    ActorId, AffiliateId, OrderId, OrderReference, OrganisationId, ProductId, SelectionId,
};
pub use info_request::{InfoRequest, InfoRequestToken, InfoSubmission, TokenHash};
pub use notification::{Notification, NotificationKind};
pub use order::{Order, OrderLine};
pub use ports::{
    Clock, Notifier, NotifyError, OrderFilter, OrderRepository, RepositoryError, SystemClock,
};
pub use pricing::{LinePricing, OrderTotals, PriceDrift};
pub use types::{EmailAddress, Money, Quantity, Rate, Timestamp};
