//! Non-negative prices using decimal arithmetic.
//!
//! Catalog prices arrive from loosely typed documents: sometimes a JSON
//! number, sometimes the text a seller typed into a form, sometimes nothing
//! at all. Every entry point here collapses anything unusable to zero, and
//! arithmetic saturates at [`Price::MAX`], so a single bad product cannot
//! break a cart total.

use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A non-negative price in the store's single currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Largest representable price; totals saturate here.
    pub const MAX: Self = Self(Decimal::MAX);

    /// Create a price, rejecting negative amounts.
    #[must_use]
    pub fn new(amount: Decimal) -> Option<Self> {
        (!amount.is_sign_negative() || amount.is_zero()).then_some(Self(amount.normalize()))
    }

    /// Create a price from an amount in cents.
    ///
    /// Negative values clamp to zero.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self::new(Decimal::new(cents, 2)).unwrap_or(Self::ZERO)
    }

    /// Parse user- or document-supplied text, falling back to zero.
    ///
    /// Blank text, text that is not a plain decimal number, and negative
    /// values all yield [`Price::ZERO`].
    ///
    /// ```
    /// use pocket_store_core::Price;
    ///
    /// assert_eq!(Price::parse_lenient(" 12.50 ").display(), "$12.50");
    /// assert_eq!(Price::parse_lenient("twelve"), Price::ZERO);
    /// assert_eq!(Price::parse_lenient("-3"), Price::ZERO);
    /// ```
    #[must_use]
    pub fn parse_lenient(text: &str) -> Self {
        Decimal::from_str(text.trim())
            .ok()
            .and_then(Self::new)
            .unwrap_or(Self::ZERO)
    }

    /// Read a price from a loosely typed JSON value.
    ///
    /// Numbers and numeric strings are accepted; anything else is zero.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(n) => Self::parse_lenient(&n.to_string()),
            serde_json::Value::String(s) => Self::parse_lenient(s),
            _ => Self::ZERO,
        }
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units, saturating at [`Price::MAX`].
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        self.0
            .checked_mul(Decimal::from(quantity))
            .map_or(Self::MAX, Self)
    }

    /// Whether the price is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Format for display, rounded half away from zero to cents (e.g. `"$25.50"`).
    #[must_use]
    pub fn display(&self) -> String {
        let rounded = self
            .0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        format!("${rounded:.2}")
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        self.0.checked_add(rhs.0).map_or(Self::MAX, Self)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl core::fmt::Display for Price {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.display())
    }
}
