// 1.0: all the primitives live here. nothing in the simulation works without these types.
// asset keys, trader IDs, ticks, quantities, prices. each is a newtype so the compiler catches mixups.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

/// Opaque asset key (e.g. "A", "BTC"). fixed per market at configuration time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetId(pub String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for AssetId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for AssetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TraderId(pub u64);

impl fmt::Display for TraderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trader-{}", self.0)
    }
}

// 1.1: discrete simulated time. every series is indexed by tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// None at tick 0.
    pub fn prev(&self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

// buy = positive quantity, sell = negative quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

// 1.2: signed quantity: positive = long/buy, negative = short/sell.
// exact decimal so that positions are the exact sum of the orders applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Quantity(Decimal);

impl Quantity {
    /// Orders smaller than this are not worth submitting.
    pub const DUST: Decimal = dec!(0.000000001);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_dust(&self) -> bool {
        self.0.abs() < Self::DUST
    }

    pub fn side(&self) -> Option<Side> {
        if self.0 > Decimal::ZERO {
            Some(Side::Buy)
        } else if self.0 < Decimal::ZERO {
            Some(Side::Sell)
        } else {
            None
        }
    }

    pub fn add(&self, other: Quantity) -> Self {
        Self(self.0 + other.0)
    }

    pub fn sub(&self, other: Quantity) -> Self {
        Self(self.0 - other.0)
    }

    pub fn scale(&self, factor: Decimal) -> Self {
        Self(self.0 * factor)
    }

    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(q))
    }
}

impl<'a> Sum<&'a Quantity> for Quantity {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(*q))
    }
}

// 1.3: price in quote currency per unit. must be positive and finite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Price(f64);

impl Price {
    #[must_use]
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && value > 0.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: f64) -> Self {
        debug_assert!(value.is_finite() && value > 0.0);
        Self(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn ln(&self) -> f64 {
        self.0.ln()
    }

    /// Dollar value of a signed quantity at this price.
    pub fn notional(&self, quantity: Quantity) -> f64 {
        quantity.to_f64() * self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}
