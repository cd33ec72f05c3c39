//! Shared value types for the order domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (amounts are non-negative, rates are in
//! `[0, 1]`, quantities are strictly positive) and participate in domain
//! computations.
//!
//! Amounts are always [`Decimal`]; a float never touches money.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// A non-negative amount in euros.
///
/// Arithmetic never rounds implicitly. Rounding to cents is an explicit step
/// performed by [`crate::pricing`], because where it happens changes the
/// totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Zero euros.
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Creates a [`Money`] amount.
    ///
    /// Returns `None` if `value` is negative.
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Creates an amount, clamping negative values to zero.
    pub(crate) fn saturating(value: Decimal) -> Self {
        if value.is_sign_negative() {
            Self::ZERO
        } else {
            Self(value)
        }
    }

    /// Creates an amount from a whole number of cents.
    pub fn from_cents(cents: u64) -> Self {
        Self(Decimal::new(cents as i64, 2))
    }

    /// Returns the underlying decimal value.
    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    /// Returns `true` if this amount is zero.
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }
}

impl TryFrom<Decimal> for Money {
    type Error = String;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("amount must not be negative, got {value}"))
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Decimal {
        value.0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} €", self.0)
    }
}

// ---------------------------------------------------------------------------
// Rates
// ---------------------------------------------------------------------------

/// A rate expressed as a fraction in `[0, 1]` (`0.15` means 15 %).
///
/// Used for the affiliate margin rate, the platform commission rate and the
/// VAT rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Rate(Decimal);

impl Rate {
    /// The zero rate.
    pub const ZERO: Rate = Rate(Decimal::ZERO);

    /// Creates a [`Rate`] from a fraction, returning `None` if it is outside
    /// `[0, 1]`.
    #[must_use]
    pub fn new(fraction: Decimal) -> Option<Self> {
        if fraction >= Decimal::ZERO && fraction <= Decimal::ONE {
            Some(Self(fraction))
        } else {
            None
        }
    }

    /// Creates a [`Rate`] from a percentage (`15` means 15 %).
    #[must_use]
    pub fn from_percent(percent: Decimal) -> Option<Self> {
        Self::new(percent / Decimal::ONE_HUNDRED)
    }

    /// Returns the rate as a fraction.
    pub fn as_fraction(self) -> Decimal {
        self.0
    }

    /// Returns the rate as a percentage.
    pub fn as_percent(self) -> Decimal {
        self.0 * Decimal::ONE_HUNDRED
    }
}

impl TryFrom<Decimal> for Rate {
    type Error = String;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("rate must be a fraction in [0, 1], got {value}"))
    }
}

impl From<Rate> for Decimal {
    fn from(value: Rate) -> Decimal {
        value.0
    }
}

impl std::fmt::Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} %", self.as_percent().normalize())
    }
}

// ---------------------------------------------------------------------------
// Quantity
// ---------------------------------------------------------------------------

/// Number of units ordered on a line. Always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// Largest quantity an order line may carry; order lines are stored in a
    /// signed 32-bit column.
    pub const MAX_PER_LINE: u32 = i32::MAX as u32;

    /// Creates a [`Quantity`], returning `None` for zero.
    #[must_use]
    pub fn new(units: u32) -> Option<Self> {
        if units == 0 {
            None
        } else {
            Some(Self(units))
        }
    }

    /// Returns the number of units.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the quantity as a decimal for price arithmetic.
    pub fn as_decimal(self) -> Decimal {
        Decimal::from(self.0)
    }
}

impl TryFrom<u32> for Quantity {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| "quantity must be at least 1".to_string())
    }
}

impl From<Quantity> for u32 {
    fn from(value: Quantity) -> u32 {
        value.0
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// E-mail
// ---------------------------------------------------------------------------

/// An e-mail address that passed a minimal shape check (`local@domain.tld`,
/// no whitespace).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Parses an address, returning `None` if it does not look like one.
    pub fn parse(value: impl AsRef<str>) -> Option<Self> {
        let v = value.as_ref().trim();
        if v.chars().any(char::is_whitespace) {
            return None;
        }
        let (local, domain) = v.split_once('@')?;
        if local.is_empty() || domain.contains('@') {
            return None;
        }
        let (host, tld) = domain.rsplit_once('.')?;
        if host.is_empty() || tld.is_empty() {
            return None;
        }
        Some(Self(v.to_string()))
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid e-mail address: {value}"))
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> String {
        value.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Returns this timestamp shifted forward by `duration`.
    pub fn plus(self, duration: chrono::Duration) -> Self {
        Self(self.0 + duration)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
