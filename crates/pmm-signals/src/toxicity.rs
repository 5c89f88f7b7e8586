//! Post-fill toxicity detection.
//!
//! Measures adverse selection by watching how the mid moves after each of
//! our fills. A buy that is followed by a falling mid (or a sell followed by
//! a rising mid) was toxic: the counterparty knew something.
//!
//! Each fill is held pending for a measurement window, then scored as the
//! adverse excursion normalised by ATR, clamped to [0, 1], and folded into a
//! per-side EMA. The global score is the worse of the two sides.

use pmm_core::OrderSide;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Toxicity detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToxicityConfig {
    /// Measurement window after a fill, in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// EMA smoothing factor for per-side scores.
    #[serde(default = "default_ema_alpha")]
    pub ema_alpha: f64,
    /// Fills that must be measured before the detector reports.
    #[serde(default = "default_min_fills")]
    pub min_fills: usize,
}

impl Default for ToxicityConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            ema_alpha: default_ema_alpha(),
            min_fills: default_min_fills(),
        }
    }
}

fn default_window_ms() -> u64 {
    30_000
}
fn default_ema_alpha() -> f64 {
    0.1
}
fn default_min_fills() -> usize {
    10
}

#[derive(Debug)]
struct PendingFill {
    side: OrderSide,
    price: f64,
    at_ms: u64,
}

/// Measures post-fill adverse excursion and keeps per-side EMAs.
pub struct ToxicityDetector {
    config: ToxicityConfig,
    pending: Vec<PendingFill>,
    // EMAs seeded neutral; they only feed pricing once min_fills is reached.
    buy_ema: f64,
    sell_ema: f64,
    measured: usize,
}

impl ToxicityDetector {
    pub fn new(config: ToxicityConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
            buy_ema: 0.3,
            sell_ema: 0.3,
            measured: 0,
        }
    }

    /// Record a fill for future measurement.
    pub fn on_fill(&mut self, side: OrderSide, price: f64, now_ms: u64) {
        self.pending.push(PendingFill {
            side,
            price,
            at_ms: now_ms,
        });
    }

    /// Advance the clock one tick: fills older than the window are scored.
    pub fn on_tick(&mut self, mid: f64, atr: f64, now_ms: u64) {
        let window = self.config.window_ms;
        let alpha = self.config.ema_alpha;
        let mut matured = Vec::new();
        self.pending.retain(|fill| {
            if now_ms.saturating_sub(fill.at_ms) >= window {
                matured.push((fill.side, fill.price));
                false
            } else {
                true
            }
        });

        for (side, fill_price) in matured {
            let score = adverse_score(side, fill_price, mid, atr);
            match side {
                OrderSide::Buy => self.buy_ema = alpha * score + (1.0 - alpha) * self.buy_ema,
                OrderSide::Sell => self.sell_ema = alpha * score + (1.0 - alpha) * self.sell_ema,
            }
            self.measured += 1;
            debug!(
                side = %side,
                score,
                buy_ema = self.buy_ema,
                sell_ema = self.sell_ema,
                "fill toxicity measured"
            );
        }
    }

    /// Global toxicity in [0, 1]: the worse of the two per-side EMAs.
    ///
    /// Reports 0 until `min_fills` fills have been measured, which pricing
    /// treats as "no toxicity adjustment".
    pub fn tau(&self) -> f64 {
        if self.measured < self.config.min_fills {
            return 0.0;
        }
        self.buy_ema.max(self.sell_ema)
    }

    /// Per-side EMAs, for metrics export.
    pub fn side_emas(&self) -> (f64, f64) {
        (self.buy_ema, self.sell_ema)
    }

    pub fn fills_measured(&self) -> usize {
        self.measured
    }

    pub fn fills_pending(&self) -> usize {
        self.pending.len()
    }
}

/// Adverse excursion normalised by ATR, clamped to [0, 1].
///
/// Buy fill: adverse if the mid fell. Sell fill: adverse if the mid rose.
fn adverse_score(side: OrderSide, fill_price: f64, mid_now: f64, atr: f64) -> f64 {
    let direction = match side {
        OrderSide::Buy => -1.0,
        OrderSide::Sell => 1.0,
    };
    let move_against = (mid_now - fill_price) * direction;
    let normalizer = if atr > 0.0 { atr } else { fill_price * 0.001 };
    (move_against / normalizer).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config() -> ToxicityConfig {
        ToxicityConfig {
            window_ms: 1_000,
            ema_alpha: 0.5,
            min_fills: 1,
        }
    }

    #[test]
    fn test_adverse_buy_scores_high() {
        // Bought at 100, mid dropped to 99, ATR 1.0: fully adverse.
        assert_eq!(adverse_score(OrderSide::Buy, 100.0, 99.0, 1.0), 1.0);
    }

    #[test]
    fn test_favourable_buy_scores_zero() {
        // Bought at 100, mid rose: benign.
        assert_eq!(adverse_score(OrderSide::Buy, 100.0, 101.0, 1.0), 0.0);
    }

    #[test]
    fn test_adverse_sell_scores_high() {
        assert_eq!(adverse_score(OrderSide::Sell, 100.0, 101.0, 1.0), 1.0);
    }

    #[test]
    fn test_score_normalised_by_atr() {
        // Half an ATR against us scores 0.5.
        assert!((adverse_score(OrderSide::Buy, 100.0, 99.5, 1.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_tau_zero_before_min_fills() {
        let config = ToxicityConfig {
            min_fills: 5,
            ..quick_config()
        };
        let mut det = ToxicityDetector::new(config);
        det.on_fill(OrderSide::Buy, 100.0, 0);
        det.on_tick(99.0, 1.0, 2_000);
        assert_eq!(det.fills_measured(), 1);
        assert_eq!(det.tau(), 0.0);
    }

    #[test]
    fn test_fill_matures_after_window() {
        let mut det = ToxicityDetector::new(quick_config());
        det.on_fill(OrderSide::Buy, 100.0, 0);
        det.on_tick(99.0, 1.0, 500); // still pending
        assert_eq!(det.fills_pending(), 1);
        det.on_tick(99.0, 1.0, 1_500); // matured, score 1.0
        assert_eq!(det.fills_pending(), 0);
        assert_eq!(det.fills_measured(), 1);
        // EMA: 0.5 * 1.0 + 0.5 * 0.3 = 0.65, tau = max side
        assert!((det.tau() - 0.65).abs() < 1e-12);
    }

    #[test]
    fn test_tau_is_max_of_sides() {
        let mut det = ToxicityDetector::new(quick_config());
        // Toxic buy, benign sell.
        det.on_fill(OrderSide::Buy, 100.0, 0);
        det.on_fill(OrderSide::Sell, 100.0, 0);
        det.on_tick(99.0, 1.0, 2_000);
        let (buy, sell) = det.side_emas();
        assert!(buy > sell);
        assert_eq!(det.tau(), buy);
    }
}
