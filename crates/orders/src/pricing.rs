//! Affiliate pricing, retrocession and order totals.
//!
//! For a line with base price `b`, affiliate margin rate `m`, platform
//! commission rate `c` and quantity `q`:
//!
//! | Quantity | Formula |
//! |----------|---------|
//! | affiliate price `p` | `round2(b / (1 − m))` |
//! | unit selling price `u` | `round2(p × (1 + c))` |
//! | line total HT | `round2(u × q)` |
//! | retrocession | `round2(q × b × m)` |
//! | platform commission | `round2(line total − round2(p × q))` |
//!
//! Every intermediate value and every running sum is rounded to cents. Legacy
//! accounting rounds at each aggregation step, so rounding once at the end
//! drifts by cents on multi-line orders. Midpoints round away from zero.
//!
//! All arithmetic is checked: an amount that leaves the [`Decimal`] range is
//! [`OrderError::AmountOutOfRange`], never a panic.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{Money, OrderError, Quantity, Rate};

/// Rounds a decimal to cents, midpoints away from zero.
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn mul(a: Decimal, b: Decimal) -> Result<Decimal, OrderError> {
    a.checked_mul(b).ok_or(OrderError::AmountOutOfRange)
}

fn add(a: Decimal, b: Decimal) -> Result<Decimal, OrderError> {
    a.checked_add(b).ok_or(OrderError::AmountOutOfRange)
}

/// Price the affiliate sells at before the platform commission:
/// `round2(base / (1 − margin))`.
///
/// # Errors
///
/// Returns [`OrderError::MarginRateTooHigh`] for a margin of 100 % and
/// [`OrderError::AmountOutOfRange`] when the price overflows.
pub fn affiliate_price(base_price: Money, margin_rate: Rate) -> Result<Money, OrderError> {
    let divisor = Decimal::ONE - margin_rate.as_fraction();
    if divisor.is_zero() {
        return Err(OrderError::MarginRateTooHigh {
            margin: margin_rate.to_string(),
        });
    }
    let raw = base_price
        .as_decimal()
        .checked_div(divisor)
        .ok_or(OrderError::AmountOutOfRange)?;
    Ok(Money::saturating(round_cents(raw)))
}

/// Unit selling price HT: `round2(round2(base / (1 − margin)) × (1 + commission))`.
///
/// # Errors
///
/// Same as [`affiliate_price`].
pub fn selling_price(
    base_price: Money,
    margin_rate: Rate,
    commission_rate: Rate,
) -> Result<Money, OrderError> {
    let p = affiliate_price(base_price, margin_rate)?;
    let u = mul(p.as_decimal(), Decimal::ONE + commission_rate.as_fraction())?;
    Ok(Money::saturating(round_cents(u)))
}

/// Retrocession owed to the affiliate: `round2(quantity × base × margin)`.
///
/// # Errors
///
/// Returns [`OrderError::AmountOutOfRange`] when the product overflows.
pub fn retrocession(
    quantity: Quantity,
    base_price: Money,
    margin_rate: Rate,
) -> Result<Money, OrderError> {
    let raw = mul(
        mul(quantity.as_decimal(), base_price.as_decimal())?,
        margin_rate.as_fraction(),
    )?;
    Ok(Money::saturating(round_cents(raw)))
}

// ---------------------------------------------------------------------------
// Per-line pricing
// ---------------------------------------------------------------------------

/// The priced breakdown of one order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePricing {
    /// `round2(base / (1 − margin))`.
    pub affiliate_price: Money,
    /// Unit price HT charged to the customer.
    pub unit_price: Money,
    /// `round2(unit_price × quantity)`.
    pub total_ht: Money,
    /// Amount owed back to the affiliate.
    pub retrocession: Money,
    /// Platform cut on top of the affiliate price.
    pub platform_commission: Money,
}

impl LinePricing {
    /// Prices a line.
    ///
    /// `charged_unit_price` is the unit price already agreed with the customer
    /// (for stored orders). When `None`, the unit price is derived from the
    /// pricing rule.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::MarginRateTooHigh`] for a margin of 100 % and
    /// [`OrderError::AmountOutOfRange`] when an amount overflows.
    pub fn compute(
        quantity: Quantity,
        base_price: Money,
        margin_rate: Rate,
        commission_rate: Rate,
        charged_unit_price: Option<Money>,
    ) -> Result<Self, OrderError> {
        let affiliate_price = affiliate_price(base_price, margin_rate)?;
        let unit_price = match charged_unit_price {
            Some(price) => price,
            None => selling_price(base_price, margin_rate, commission_rate)?,
        };
        let q = quantity.as_decimal();
        let total_ht = round_cents(mul(unit_price.as_decimal(), q)?);
        let affiliate_total = round_cents(mul(affiliate_price.as_decimal(), q)?);
        let commission = total_ht
            .checked_sub(affiliate_total)
            .ok_or(OrderError::AmountOutOfRange)?;

        Ok(Self {
            affiliate_price,
            unit_price,
            total_ht: Money::saturating(total_ht),
            retrocession: retrocession(quantity, base_price, margin_rate)?,
            platform_commission: Money::saturating(round_cents(commission)),
        })
    }
}

/// A line whose stored unit price no longer matches the pricing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceDrift {
    /// Zero-based position of the line in the order.
    pub line_index: usize,
    /// Unit price stored on the line.
    pub stored: Money,
    /// Unit price the pricing rule produces today.
    pub expected: Money,
}

// ---------------------------------------------------------------------------
// Order totals
// ---------------------------------------------------------------------------

/// Aggregated amounts of an order. Every field is rounded to cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    /// Sum of line totals HT.
    pub products_ht: Money,
    /// Shipping cost HT.
    pub shipping_ht: Money,
    /// Products plus shipping, HT.
    pub total_ht: Money,
    /// VAT on `total_ht`.
    pub vat: Money,
    /// `total_ht + vat`.
    pub total_ttc: Money,
    /// Sum of line retrocessions.
    pub total_retrocession: Money,
    /// Sum of line platform commissions.
    pub total_commission: Money,
}

impl OrderTotals {
    /// Aggregates priced lines, rounding each running sum to cents.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::AmountOutOfRange`] when a sum overflows.
    pub fn aggregate<'a>(
        lines: impl IntoIterator<Item = &'a LinePricing>,
        shipping_ht: Money,
        vat_rate: Rate,
    ) -> Result<Self, OrderError> {
        let mut products = Decimal::ZERO;
        let mut retro = Decimal::ZERO;
        let mut commission = Decimal::ZERO;
        for line in lines {
            products = round_cents(add(products, line.total_ht.as_decimal())?);
            retro = round_cents(add(retro, line.retrocession.as_decimal())?);
            commission = round_cents(add(commission, line.platform_commission.as_decimal())?);
        }

        let total_ht = round_cents(add(products, shipping_ht.as_decimal())?);
        let vat = round_cents(mul(total_ht, vat_rate.as_fraction())?);
        let total_ttc = round_cents(add(total_ht, vat)?);

        Ok(Self {
            products_ht: Money::saturating(products),
            shipping_ht: Money::saturating(round_cents(shipping_ht.as_decimal())),
            total_ht: Money::saturating(total_ht),
            vat: Money::saturating(vat),
            total_ttc: Money::saturating(total_ttc),
            total_retrocession: Money::saturating(retro),
            total_commission: Money::saturating(commission),
        })
    }
}
