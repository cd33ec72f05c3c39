//! LinkMe notification infrastructure adapters.
//!
//! Implements the [`orders::Notifier`] trait twice:
//!
//! - [`MailClient`] posts each notification to a transactional mail HTTP API.
//! - [`LogNotifier`] only logs it, for local runs where mail is disabled.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, request formatting, `Retry-After`
//! handling and exponential back-off live here. The [`orders`] and
//! `workflow` crates see only [`orders::Notifier`].

mod client;
mod log;

pub use client::{MailClient, MailSettings};
pub use log::LogNotifier;
