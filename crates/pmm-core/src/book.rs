//! Market data snapshots: order book levels and trades.

use crate::{OrderSide, Price, Size};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single order-book level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    pub size: Size,
}

/// An L2 order-book snapshot, top-N levels per side.
///
/// Bids sorted by price descending, asks ascending.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrderBook {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBook {
    /// Mid price from best bid/ask. None if either side is empty or crossed.
    pub fn mid_price(&self) -> Option<Price> {
        let bid = self.bids.first()?.price;
        let ask = self.asks.first()?.price;
        if !bid.is_positive() || !ask.is_positive() || bid >= ask {
            return None;
        }
        Some(Price::new((bid.inner() + ask.inner()) / Decimal::TWO))
    }

    /// Top-of-book spread in basis points relative to mid.
    pub fn spread_bps(&self) -> Option<Decimal> {
        let mid = self.mid_price()?;
        let bid = self.bids.first()?.price;
        let ask = self.asks.first()?.price;
        Some((ask.inner() - bid.inner()) / mid.inner() * Decimal::from(10_000))
    }
}

/// A public trade print.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub timestamp_ms: u64,
    pub price: Price,
    pub size: Size,
    /// Aggressor side.
    pub side: OrderSide,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level(p: Decimal, s: Decimal) -> BookLevel {
        BookLevel {
            price: Price::new(p),
            size: Size::new(s),
        }
    }

    #[test]
    fn test_mid_price() {
        let book = OrderBook {
            bids: vec![level(dec!(100), dec!(1))],
            asks: vec![level(dec!(102), dec!(1))],
        };
        assert_eq!(book.mid_price().unwrap().inner(), dec!(101));
    }

    #[test]
    fn test_crossed_book_has_no_mid() {
        let book = OrderBook {
            bids: vec![level(dec!(102), dec!(1))],
            asks: vec![level(dec!(100), dec!(1))],
        };
        assert!(book.mid_price().is_none());
    }

    #[test]
    fn test_spread_bps() {
        let book = OrderBook {
            bids: vec![level(dec!(99.95), dec!(1))],
            asks: vec![level(dec!(100.05), dec!(1))],
        };
        // spread 0.10 on mid 100 = 10 bps
        assert_eq!(book.spread_bps().unwrap(), dec!(10));
    }

    #[test]
    fn test_empty_book() {
        assert!(OrderBook::default().mid_price().is_none());
        assert!(OrderBook::default().spread_bps().is_none());
    }
}
