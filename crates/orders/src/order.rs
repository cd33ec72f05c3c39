//! The LinkMe order aggregate.

use serde::{Deserialize, Serialize};

use crate::pricing::{self, LinePricing, OrderTotals, PriceDrift};
use crate::{
    AffiliateId, ApprovalStatus, InfoRequest, LinkMeDetails, Money, OrderChannel, OrderError,
    OrderId, OrderReference, OrganisationId, ProductId, Quantity, Rate, SelectionId, Timestamp,
};

/// One product line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub quantity: Quantity,
    /// Unit price HT charged to the customer.
    pub unit_price: Money,
    /// Catalog price HT before the affiliate margin.
    pub base_price: Money,
    /// Affiliate markup.
    pub margin_rate: Rate,
    /// Platform cut.
    pub commission_rate: Rate,
}

impl OrderLine {
    /// Prices the line at its stored unit price.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::MarginRateTooHigh`] for a margin of 100 %.
    pub fn pricing(&self) -> Result<LinePricing, OrderError> {
        LinePricing::compute(
            self.quantity,
            self.base_price,
            self.margin_rate,
            self.commission_rate,
            Some(self.unit_price),
        )
    }

    /// Unit price the pricing rule gives for this line's base price and rates.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::MarginRateTooHigh`] for a margin of 100 %.
    pub fn expected_unit_price(&self) -> Result<Money, OrderError> {
        pricing::selling_price(self.base_price, self.margin_rate, self.commission_rate)
    }
}

/// A LinkMe order with its lines, details and approval state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub reference: OrderReference,
    /// Customer organisation, when known.
    pub organisation_id: Option<OrganisationId>,
    pub created_by_affiliate_id: Option<AffiliateId>,
    pub linkme_selection_id: Option<SelectionId>,
    pub status: ApprovalStatus,
    pub lines: Vec<OrderLine>,
    pub shipping_cost_ht: Money,
    pub vat_rate: Rate,
    pub details: LinkMeDetails,
    /// Open request for missing details; set only in `info_requested`.
    pub info_request: Option<InfoRequest>,
    pub rejection_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Order {
    /// Derives the order's channel from its two nullable keys.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::ChannelConflict`] if both keys are set.
    pub fn channel(&self) -> Result<OrderChannel, OrderError> {
        OrderChannel::derive(self.created_by_affiliate_id, self.linkme_selection_id)
    }

    /// Prices every line at its stored unit price.
    ///
    /// # Errors
    ///
    /// Returns the first line's pricing error.
    pub fn priced_lines(&self) -> Result<Vec<LinePricing>, OrderError> {
        self.lines.iter().map(OrderLine::pricing).collect()
    }

    /// Aggregated totals with per-step rounding.
    ///
    /// # Errors
    ///
    /// Returns the first line's pricing error.
    pub fn totals(&self) -> Result<OrderTotals, OrderError> {
        let lines = self.priced_lines()?;
        OrderTotals::aggregate(&lines, self.shipping_cost_ht, self.vat_rate)
    }

    /// Lines whose stored unit price differs from the pricing rule.
    ///
    /// # Errors
    ///
    /// Returns the first line's pricing error.
    pub fn price_drifts(&self) -> Result<Vec<PriceDrift>, OrderError> {
        let mut drifts = Vec::new();
        for (line_index, line) in self.lines.iter().enumerate() {
            let expected = line.expected_unit_price()?;
            if expected != line.unit_price {
                drifts.push(PriceDrift {
                    line_index,
                    stored: line.unit_price,
                    expected,
                });
            }
        }
        Ok(drifts)
    }
}
