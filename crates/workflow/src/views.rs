//! Inputs and outputs of [`crate::ApprovalService`] operations.

use orders::{
    AffiliateId, ApprovalAction, InfoField, LinePricing, LinkMeDetails, Money, Order,
    OrderChannel, OrderReference, OrderTotals, OrganisationId, PriceDrift, ProductId, Quantity,
    Rate, SelectionId, Timestamp,
};
use serde::{Deserialize, Serialize};

/// An order to create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub reference: OrderReference,
    #[serde(default)]
    pub organisation_id: Option<OrganisationId>,
    #[serde(default)]
    pub created_by_affiliate_id: Option<AffiliateId>,
    #[serde(default)]
    pub linkme_selection_id: Option<SelectionId>,
    pub lines: Vec<NewOrderLine>,
    #[serde(default)]
    pub shipping_cost_ht: Option<Money>,
    #[serde(default)]
    pub vat_rate: Option<Rate>,
    #[serde(default)]
    pub details: LinkMeDetails,
}

/// A line of a [`NewOrder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderLine {
    #[serde(default)]
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub quantity: Quantity,
    pub base_price: Money,
    pub margin_rate: Rate,
    /// Defaults to the configured platform commission.
    #[serde(default)]
    pub commission_rate: Option<Rate>,
    /// Price agreed with the customer. Defaults to the pricing rule.
    #[serde(default)]
    pub unit_price: Option<Money>,
}

/// Everything the admin order screen shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderView {
    pub order: Order,
    /// `None` when the channel keys conflict; see `anomalies`.
    pub channel: Option<OrderChannel>,
    pub channel_label: Option<String>,
    pub totals: Option<OrderTotals>,
    pub price_drifts: Vec<PriceDrift>,
    pub missing_fields: Vec<InfoField>,
    /// Staff actions allowed from the current status.
    pub allowed_actions: Vec<ApprovalAction>,
    /// Data problems staff should fix before approving.
    pub anomalies: Vec<String>,
}

/// Result of opening an info request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoRequestIssued {
    /// Public link sent to the requester.
    pub link: String,
    pub fields: Vec<InfoField>,
    pub expires_at: Timestamp,
    /// Whether the requester e-mail was sent.
    pub notified: bool,
}

/// A field to fill on the public form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPrompt {
    pub field: InfoField,
    pub label: String,
}

/// What the public completion form displays. Carries no existing details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicInfoRequest {
    pub order_reference: OrderReference,
    pub fields: Vec<FieldPrompt>,
    pub message: Option<String>,
    pub expires_at: Timestamp,
}

/// A line to price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteLine {
    pub quantity: Quantity,
    pub base_price: Money,
    pub margin_rate: Rate,
    #[serde(default)]
    pub commission_rate: Option<Rate>,
}

/// A pricing simulation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub lines: Vec<QuoteLine>,
    #[serde(default)]
    pub shipping_cost_ht: Option<Money>,
    #[serde(default)]
    pub vat_rate: Option<Rate>,
}

/// Priced lines and totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub lines: Vec<LinePricing>,
    pub totals: OrderTotals,
}
