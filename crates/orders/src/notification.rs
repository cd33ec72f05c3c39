//! E-mail notifications produced by workflow steps.
//!
//! Content is built here so every transport (mail API, log sink) sends the same
//! text. Values typed by users (rejection reasons, staff messages) are escaped
//! before they reach the HTML body.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::{EmailAddress, InfoRequest, Order};

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderApproved,
    OrderRejected,
    InfoRequested,
    InfoSubmitted,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OrderApproved => "order_approved",
            Self::OrderRejected => "order_rejected",
            Self::InfoRequested => "info_requested",
            Self::InfoSubmitted => "info_submitted",
        }
    }
}

/// A rendered e-mail ready to hand to a [`crate::Notifier`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub to: EmailAddress,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl Notification {
    /// Tells the requester their order was approved.
    pub fn order_approved(order: &Order, to: EmailAddress) -> Self {
        let reference = order.reference.as_str();
        let text = format!(
            "Hello,\n\nYour order {reference} has been approved and is now being prepared.\n"
        );
        let html = format!(
            "<p>Hello,</p><p>Your order <strong>{}</strong> has been approved and is now being prepared.</p>",
            escape_html(reference)
        );
        Self {
            kind: NotificationKind::OrderApproved,
            to,
            subject: format!("Order {reference} approved"),
            text,
            html,
        }
    }

    /// Tells the requester their order was rejected, with the reason.
    pub fn order_rejected(order: &Order, to: EmailAddress, reason: &str) -> Self {
        let reference = order.reference.as_str();
        let text = format!(
            "Hello,\n\nYour order {reference} could not be accepted.\n\nReason: {reason}\n"
        );
        let html = format!(
            "<p>Hello,</p><p>Your order <strong>{}</strong> could not be accepted.</p><p>Reason: {}</p>",
            escape_html(reference),
            escape_html(reason)
        );
        Self {
            kind: NotificationKind::OrderRejected,
            to,
            subject: format!("Order {reference} rejected"),
            text,
            html,
        }
    }

    /// Asks the requester to complete missing details through `link`.
    pub fn info_requested(order: &Order, to: EmailAddress, link: &str, request: &InfoRequest) -> Self {
        let reference = order.reference.as_str();
        let expires = request.expires_at.as_datetime().format("%Y-%m-%d %H:%M UTC");

        let mut text = format!(
            "Hello,\n\nWe need a few more details before we can validate order {reference}:\n\n"
        );
        let mut items = String::new();
        for field in &request.fields {
            let _ = writeln!(text, "- {}", field.label());
            let _ = write!(items, "<li>{}</li>", field.label());
        }
        let mut html = format!(
            "<p>Hello,</p><p>We need a few more details before we can validate order <strong>{}</strong>:</p><ul>{items}</ul>",
            escape_html(reference)
        );
        if let Some(message) = &request.message {
            let _ = write!(text, "\n{message}\n");
            let _ = write!(html, "<p>{}</p>", escape_html(message));
        }
        let _ = write!(text, "\nComplete your order here: {link}\nThis link expires on {expires}.\n");
        let _ = write!(
            html,
            "<p><a href=\"{}\">Complete my order</a></p><p>This link expires on {expires}.</p>",
            escape_html(link)
        );

        Self {
            kind: NotificationKind::InfoRequested,
            to,
            subject: format!("Order {reference}: information needed"),
            text,
            html,
        }
    }

    /// Tells staff the requester completed the details; the order is back in
    /// the validation queue.
    pub fn info_submitted(order: &Order, to: EmailAddress) -> Self {
        let reference = order.reference.as_str();
        Self {
            kind: NotificationKind::InfoSubmitted,
            to,
            subject: format!("Order {reference}: details completed"),
            text: format!(
                "The requester completed the missing details of order {reference}. It is waiting for validation again.\n"
            ),
            html: format!(
                "<p>The requester completed the missing details of order <strong>{}</strong>. It is waiting for validation again.</p>",
                escape_html(reference)
            ),
        }
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
