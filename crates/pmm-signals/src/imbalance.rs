//! Order-book imbalance from L2 snapshots.
//!
//! Positive = buy pressure (more resting bid volume), negative = sell
//! pressure. EMA-smoothed, bounded [-1, 1].

use pmm_core::BookLevel;
use rust_decimal::prelude::ToPrimitive;

/// EMA-smoothed book imbalance over the top N levels.
#[derive(Debug)]
pub struct BookImbalance {
    alpha: f64,
    depth: usize,
    smoothed: f64,
    initialized: bool,
}

impl BookImbalance {
    pub fn new(alpha: f64, depth: usize) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            depth: depth.max(1),
            smoothed: 0.0,
            initialized: false,
        }
    }

    /// Feed an L2 snapshot. Returns the smoothed imbalance.
    pub fn update(&mut self, bids: &[BookLevel], asks: &[BookLevel]) -> f64 {
        let bid_vol: f64 = sum_sizes(bids, self.depth);
        let ask_vol: f64 = sum_sizes(asks, self.depth);

        let total = bid_vol + ask_vol;
        let raw = if total > 0.0 {
            (bid_vol - ask_vol) / total
        } else {
            0.0
        };

        if self.initialized {
            self.smoothed = self.alpha * raw + (1.0 - self.alpha) * self.smoothed;
        } else {
            self.smoothed = raw;
            self.initialized = true;
        }
        self.smoothed.clamp(-1.0, 1.0)
    }

    /// Current smoothed imbalance.
    pub fn value(&self) -> f64 {
        self.smoothed.clamp(-1.0, 1.0)
    }
}

fn sum_sizes(levels: &[BookLevel], depth: usize) -> f64 {
    levels
        .iter()
        .take(depth)
        .map(|l| l.size.inner().to_f64().unwrap_or(0.0))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmm_core::{Price, Size};
    use rust_decimal_macros::dec;

    fn level(p: rust_decimal::Decimal, s: rust_decimal::Decimal) -> BookLevel {
        BookLevel {
            price: Price::new(p),
            size: Size::new(s),
        }
    }

    #[test]
    fn test_balanced_book_is_zero() {
        let mut imb = BookImbalance::new(0.3, 5);
        let bids = vec![level(dec!(100), dec!(2)), level(dec!(99), dec!(2))];
        let asks = vec![level(dec!(101), dec!(2)), level(dec!(102), dec!(2))];
        assert_eq!(imb.update(&bids, &asks), 0.0);
    }

    #[test]
    fn test_bid_heavy_is_positive() {
        let mut imb = BookImbalance::new(1.0, 5); // no smoothing
        let bids = vec![level(dec!(100), dec!(3))];
        let asks = vec![level(dec!(101), dec!(1))];
        // (3 - 1) / 4 = 0.5
        assert!((imb.update(&bids, &asks) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_depth_truncation() {
        let mut imb = BookImbalance::new(1.0, 1);
        let bids = vec![level(dec!(100), dec!(1)), level(dec!(99), dec!(100))];
        let asks = vec![level(dec!(101), dec!(1))];
        // Only top level counted: (1 - 1) / 2 = 0
        assert_eq!(imb.update(&bids, &asks), 0.0);
    }

    #[test]
    fn test_ema_smoothing() {
        let mut imb = BookImbalance::new(0.5, 5);
        let heavy_bids = vec![level(dec!(100), dec!(1))];
        let empty: Vec<BookLevel> = vec![];
        imb.update(&heavy_bids, &empty); // raw 1.0, seeds EMA
        let bids = vec![level(dec!(100), dec!(1))];
        let asks = vec![level(dec!(101), dec!(1))];
        // raw 0.0 -> 0.5*0 + 0.5*1 = 0.5
        assert!((imb.update(&bids, &asks) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_book_is_zero() {
        let mut imb = BookImbalance::new(0.3, 5);
        assert_eq!(imb.update(&[], &[]), 0.0);
    }
}
