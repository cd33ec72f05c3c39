//! Tunables of the approval workflow.

use orders::{EmailAddress, InfoRequestToken, Rate};
use rust_decimal::Decimal;

/// Tunables of the approval workflow, filled from the application config.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Base URL of the public site hosting the info-completion form.
    pub public_base_url: String,
    /// How long an info-request link stays valid.
    pub info_request_ttl: chrono::Duration,
    /// Where "details completed" notifications go. `None` disables them.
    pub staff_email: Option<EmailAddress>,
    /// VAT applied to orders and quotes that do not specify one.
    pub default_vat_rate: Rate,
    /// Platform commission for lines that do not specify one.
    pub default_commission_rate: Rate,
}

impl WorkflowSettings {
    /// Public link the requester follows to complete an order.
    pub fn info_link(&self, token: &InfoRequestToken) -> String {
        format!(
            "{}/linkme/complete/{}",
            self.public_base_url.trim_end_matches('/'),
            token.as_str()
        )
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:3000".to_string(),
            info_request_ttl: chrono::Duration::days(30),
            staff_email: None,
            default_vat_rate: Rate::new(Decimal::new(20, 2)).unwrap_or(Rate::ZERO),
            default_commission_rate: Rate::ZERO,
        }
    }
}
