//! Order-related types and identifiers.

use crate::{Price, Size};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Returns 1 for buy, -1 for sell (for position calculations).
    pub fn sign(&self) -> i8 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Client order ID.
///
/// Derived deterministically from (asset, level, side, tick sequence) so that
/// a replayed submission of the same tick's intents is an exchange-side no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    /// Build the id for a quote slot at a given tick.
    ///
    /// Format: `{symbol}-{tick_seq}-{b|s}{level}`.
    pub fn for_quote(symbol: &str, side: OrderSide, level: u32, tick_seq: u64) -> Self {
        let s = match side {
            OrderSide::Buy => 'b',
            OrderSide::Sell => 's',
        };
        Self(format!("{}-{}-{}{}", symbol.to_lowercase(), tick_seq, s, level))
    }

    /// Wrap an id received from the venue.
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClientOrderId {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

/// An order known to be resting on the venue.
///
/// One live order per (side, level) slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveOrder {
    /// Client order id the order was placed with.
    pub client_id: ClientOrderId,
    pub side: OrderSide,
    pub price: Price,
    /// Remaining (unfilled) size.
    pub size: Size,
    /// Quote level index (0 = tightest).
    pub level: u32,
    /// Venue-assigned order id.
    pub exchange_id: u64,
    /// Placement timestamp, unix milliseconds.
    pub placed_at_ms: u64,
}

/// A fill observed on one of our orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillEvent {
    pub side: OrderSide,
    pub price: Price,
    pub size: Size,
    /// Fee in USD. Positive = cost, negative = rebate.
    pub fee: rust_decimal::Decimal,
    pub timestamp_ms: u64,
}
