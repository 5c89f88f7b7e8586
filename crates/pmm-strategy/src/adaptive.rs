//! Adaptive quoting overlay.
//!
//! Sits between the quote engine and the order manager:
//! - a volatility-regime classifier (short vs long rolling std-dev of
//!   returns) scales spreads and sizes per bucket and drops the deeper
//!   levels in the high bucket;
//! - an inventory-decay rule widens the inventory-adding side once a
//!   position has been held too long without a round trip, nudging the book
//!   toward flattening us.

use pmm_mm::{Quote, VolRegime};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Adaptive overlay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    #[serde(default = "default_vol_window_short")]
    pub vol_window_short: usize,
    #[serde(default = "default_vol_window_long")]
    pub vol_window_long: usize,
    /// short vol below this ratio of long vol reads as Low.
    #[serde(default = "default_low_ratio")]
    pub low_ratio: f64,
    /// short vol above this ratio of long vol reads as High.
    #[serde(default = "default_high_ratio")]
    pub high_ratio: f64,
    /// Ticks a one-sided position may sit before decay widening starts.
    #[serde(default = "default_decay_after_ticks")]
    pub decay_after_ticks: u64,
    /// Maximum widening multiplier on the inventory-adding side.
    #[serde(default = "default_decay_max_mult")]
    pub decay_max_mult: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            vol_window_short: default_vol_window_short(),
            vol_window_long: default_vol_window_long(),
            low_ratio: default_low_ratio(),
            high_ratio: default_high_ratio(),
            decay_after_ticks: default_decay_after_ticks(),
            decay_max_mult: default_decay_max_mult(),
        }
    }
}

fn default_vol_window_short() -> usize {
    5
}
fn default_vol_window_long() -> usize {
    50
}
fn default_low_ratio() -> f64 {
    0.7
}
fn default_high_ratio() -> f64 {
    1.5
}
fn default_decay_after_ticks() -> u64 {
    1800
}
fn default_decay_max_mult() -> f64 {
    1.4
}

/// Spread multipliers per regime.
fn regime_spread_mult(regime: VolRegime) -> f64 {
    match regime {
        VolRegime::Low => 0.7,
        VolRegime::Medium => 1.0,
        VolRegime::High => 1.5,
    }
}

/// Size multipliers per regime.
fn regime_size_mult(regime: VolRegime) -> f64 {
    match regime {
        VolRegime::Low => 1.3,
        VolRegime::Medium => 1.0,
        VolRegime::High => 0.6,
    }
}

/// Adaptive state: regime detection plus inventory age.
pub struct AdaptiveOverlay {
    config: AdaptiveConfig,
    returns: VecDeque<f64>,
    last_mid: Option<f64>,
    regime: VolRegime,
    held_ticks: u64,
    last_position_sign: i8,
}

impl AdaptiveOverlay {
    pub fn new(config: AdaptiveConfig) -> Self {
        Self {
            returns: VecDeque::with_capacity(config.vol_window_long),
            config,
            last_mid: None,
            regime: VolRegime::Medium,
            held_ticks: 0,
            last_position_sign: 0,
        }
    }

    pub fn regime(&self) -> VolRegime {
        self.regime
    }

    /// Feed this tick's mid and position sign; reclassifies the regime and
    /// advances the inventory age.
    pub fn on_tick(&mut self, mid: f64, position_sign: i8) {
        if let Some(last) = self.last_mid {
            if last > 0.0 {
                if self.returns.len() >= self.config.vol_window_long {
                    self.returns.pop_front();
                }
                self.returns.push_back((mid - last) / last);
            }
        }
        self.last_mid = Some(mid);
        self.regime = self.classify();

        if position_sign == 0 || position_sign != self.last_position_sign {
            self.held_ticks = 0;
            self.last_position_sign = position_sign;
        } else {
            self.held_ticks += 1;
        }
    }

    /// Apply regime and decay adjustments to a computed quote.
    ///
    /// Offsets from mid scale by the regime spread multiplier; the
    /// inventory-adding side additionally widens with position age; sizes
    /// scale by the regime size multiplier. In the high bucket only the
    /// tightest level survives.
    pub fn adjust(&self, quote: &mut Quote, mid: Decimal) {
        let spread_mult = to_dec(regime_spread_mult(self.regime));
        let size_mult = to_dec(regime_size_mult(self.regime));
        let decay = to_dec(self.decay_mult());

        for level in &mut quote.levels {
            let mut bid_offset = (mid - level.bid_price.inner()) * spread_mult;
            let mut ask_offset = (level.ask_price.inner() - mid) * spread_mult;

            // Widen whichever side would add to a stale position.
            if self.last_position_sign > 0 {
                bid_offset *= decay;
            } else if self.last_position_sign < 0 {
                ask_offset *= decay;
            }

            level.bid_price = pmm_core::Price::new(mid - bid_offset);
            level.ask_price = pmm_core::Price::new(mid + ask_offset);
            level.bid_size = level.bid_size * size_mult;
            level.ask_size = level.ask_size * size_mult;
        }

        if self.regime == VolRegime::High && quote.levels.len() > 1 {
            quote.levels.truncate(1);
        }
    }

    fn classify(&self) -> VolRegime {
        let short = self.rolling_std(self.config.vol_window_short);
        let long = self.rolling_std(self.config.vol_window_long);
        if long <= 0.0 {
            VolRegime::Medium
        } else if short < self.config.low_ratio * long {
            VolRegime::Low
        } else if short > self.config.high_ratio * long {
            VolRegime::High
        } else {
            VolRegime::Medium
        }
    }

    fn rolling_std(&self, window: usize) -> f64 {
        let n = window.min(self.returns.len());
        if n < 2 {
            return 0.0;
        }
        let recent: Vec<f64> = self.returns.iter().rev().take(n).copied().collect();
        let mean = recent.iter().sum::<f64>() / n as f64;
        let var = recent.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
        var.sqrt()
    }

    /// Decay widening ramps linearly from 1.0 to `decay_max_mult` over a
    /// second ageing period once the threshold has passed.
    fn decay_mult(&self) -> f64 {
        let threshold = self.config.decay_after_ticks;
        if self.held_ticks <= threshold || threshold == 0 {
            return 1.0;
        }
        let progress = ((self.held_ticks - threshold) as f64 / threshold as f64).min(1.0);
        1.0 + progress * (self.config.decay_max_mult - 1.0)
    }
}

fn to_dec(v: f64) -> Decimal {
    Decimal::from_f64(v).unwrap_or(Decimal::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmm_core::{Price, Size};
    use pmm_mm::QuoteLevel;
    use rust_decimal_macros::dec;

    fn config() -> AdaptiveConfig {
        AdaptiveConfig {
            vol_window_short: 3,
            vol_window_long: 12,
            decay_after_ticks: 10,
            ..AdaptiveConfig::default()
        }
    }

    fn sample_quote() -> Quote {
        Quote {
            levels: vec![
                QuoteLevel {
                    bid_price: Price::new(dec!(99.80)),
                    bid_size: Size::new(dec!(1)),
                    ask_price: Price::new(dec!(100.20)),
                    ask_size: Size::new(dec!(1)),
                },
                QuoteLevel {
                    bid_price: Price::new(dec!(99.70)),
                    bid_size: Size::new(dec!(1)),
                    ask_price: Price::new(dec!(100.30)),
                    ask_size: Size::new(dec!(1)),
                },
            ],
            suppress_bid: false,
            suppress_ask: false,
        }
    }

    fn feed_flat_then_spike(overlay: &mut AdaptiveOverlay) {
        let mut mid = 100.0;
        // Calm history...
        for i in 0..12 {
            mid += if i % 2 == 0 { 0.01 } else { -0.01 };
            overlay.on_tick(mid, 0);
        }
        // ...then violent ticks.
        for i in 0..3 {
            mid += if i % 2 == 0 { 1.5 } else { -1.2 };
            overlay.on_tick(mid, 0);
        }
    }

    #[test]
    fn test_starts_medium() {
        let overlay = AdaptiveOverlay::new(config());
        assert_eq!(overlay.regime(), VolRegime::Medium);
    }

    #[test]
    fn test_spike_classifies_high() {
        let mut overlay = AdaptiveOverlay::new(config());
        feed_flat_then_spike(&mut overlay);
        assert_eq!(overlay.regime(), VolRegime::High);
    }

    #[test]
    fn test_calm_after_storm_classifies_low() {
        let mut overlay = AdaptiveOverlay::new(config());
        let mut mid = 100.0;
        // Noisy long window.
        for i in 0..9 {
            mid += if i % 2 == 0 { 0.8 } else { -0.8 };
            overlay.on_tick(mid, 0);
        }
        // Dead-calm short window.
        for _ in 0..3 {
            overlay.on_tick(mid, 0);
        }
        assert_eq!(overlay.regime(), VolRegime::Low);
    }

    #[test]
    fn test_high_regime_widen_and_truncate() {
        let mut overlay = AdaptiveOverlay::new(config());
        feed_flat_then_spike(&mut overlay);

        let mut quote = sample_quote();
        overlay.adjust(&mut quote, dec!(100));

        // Only the tightest level survives, 1.5x wider, 0.6x the size.
        assert_eq!(quote.levels.len(), 1);
        assert_eq!(quote.levels[0].bid_price.inner(), dec!(99.70));
        assert_eq!(quote.levels[0].ask_price.inner(), dec!(100.30));
        assert_eq!(quote.levels[0].bid_size.inner(), dec!(0.6));
    }

    #[test]
    fn test_stale_long_position_widens_bids_only() {
        let mut overlay = AdaptiveOverlay::new(config());
        // Hold a long position well past the decay threshold.
        for _ in 0..31 {
            overlay.on_tick(100.0, 1);
        }
        let mut quote = sample_quote();
        overlay.adjust(&mut quote, dec!(100));

        // Medium regime (flat prices), so only the decay applies: the bid
        // offset grows by 1.4x, the ask stays.
        assert_eq!(quote.levels[0].bid_price.inner(), dec!(99.72));
        assert_eq!(quote.levels[0].ask_price.inner(), dec!(100.20));
    }

    #[test]
    fn test_flat_position_resets_age() {
        let mut overlay = AdaptiveOverlay::new(config());
        for _ in 0..31 {
            overlay.on_tick(100.0, 1);
        }
        overlay.on_tick(100.0, 0); // flattened
        let mut quote = sample_quote();
        overlay.adjust(&mut quote, dec!(100));
        assert_eq!(quote.levels[0].bid_price.inner(), dec!(99.80));
    }
}
