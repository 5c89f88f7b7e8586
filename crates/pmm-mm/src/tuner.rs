//! Closed-loop parameter tuning.
//!
//! Tracks live performance in rolling windows and adjusts quoting
//! parameters at most once per window, within hard bounds. Complements the
//! nightly reoptimiser (which writes `live_params`) by reacting on a 4-hour
//! horizon.

use crate::params::QuoteParams;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Tuner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunerConfig {
    /// Evaluation window length in milliseconds (default 4 h).
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Fill rate below which the spread tightens.
    #[serde(default = "default_fill_rate_floor")]
    pub fill_rate_floor: f64,
    /// Inventory utilisation above which skew strengthens.
    #[serde(default = "default_inv_util_threshold")]
    pub inv_util_threshold: f64,
    /// Reset a parameter drifting further than this from its default (%).
    #[serde(default = "default_max_drift_pct")]
    pub max_drift_pct: f64,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            fill_rate_floor: default_fill_rate_floor(),
            inv_util_threshold: default_inv_util_threshold(),
            max_drift_pct: default_max_drift_pct(),
        }
    }
}

fn default_window_ms() -> u64 {
    4 * 3600 * 1000
}
fn default_fill_rate_floor() -> f64 {
    0.15
}
fn default_inv_util_threshold() -> f64 {
    0.70
}
fn default_max_drift_pct() -> f64 {
    70.0
}

/// Rolling performance metrics for one evaluation window.
#[derive(Debug, Default)]
struct Window {
    pnl_series: Vec<f64>,
    fills: u64,
    quotes: u64,
    max_inventory_util: f64,
}

impl Window {
    fn fill_rate(&self) -> f64 {
        if self.quotes == 0 {
            0.0
        } else {
            self.fills as f64 / self.quotes as f64
        }
    }

    /// Annualised Sharpe estimate from bar-level PnL (hourly bars).
    fn sharpe(&self) -> f64 {
        if self.pnl_series.len() < 2 {
            return 0.0;
        }
        let n = self.pnl_series.len() as f64;
        let mean = self.pnl_series.iter().sum::<f64>() / n;
        let var = self
            .pnl_series
            .iter()
            .map(|p| (p - mean).powi(2))
            .sum::<f64>()
            / (n - 1.0);
        if var <= 0.0 {
            return if mean > 0.0 { f64::INFINITY } else { 0.0 };
        }
        mean / var.sqrt() * (8760f64).sqrt()
    }
}

/// Runtime parameter self-adjustment.
pub struct AutoTuner {
    config: TunerConfig,
    baseline: QuoteParams,
    current: QuoteParams,
    window: Window,
    window_start_ms: u64,
    /// Consecutive windows with inventory utilisation over threshold.
    high_util_windows: u32,
    adjustments: u64,
}

impl AutoTuner {
    pub fn new(config: TunerConfig, baseline: QuoteParams, now_ms: u64) -> Self {
        Self {
            config,
            current: baseline.clone(),
            baseline,
            window: Window::default(),
            window_start_ms: now_ms,
            high_util_windows: 0,
            adjustments: 0,
        }
    }

    /// Record a fill and its realised PnL contribution.
    pub fn on_fill(&mut self, pnl: f64) {
        self.window.fills += 1;
        self.window.pnl_series.push(pnl);
    }

    /// Record quotes placed this tick.
    pub fn on_quotes(&mut self, count: u64) {
        self.window.quotes += count;
    }

    /// Record per-tick state.
    pub fn on_tick(&mut self, inventory_util: f64) {
        self.window.max_inventory_util = self.window.max_inventory_util.max(inventory_util.abs());
    }

    /// The parameters currently in force.
    pub fn params(&self) -> &QuoteParams {
        &self.current
    }

    pub fn adjustments(&self) -> u64 {
        self.adjustments
    }

    /// Replace the baseline (and current) parameters, e.g. after hot-reload.
    pub fn rebase(&mut self, params: QuoteParams) {
        self.baseline = params.clone();
        self.current = params;
        self.high_util_windows = 0;
    }

    /// Evaluate the closing window if due. Returns a fresh `QuoteParams`
    /// snapshot when an adjustment was made.
    pub fn evaluate(&mut self, now_ms: u64) -> Option<QuoteParams> {
        if now_ms.saturating_sub(self.window_start_ms) < self.config.window_ms {
            return None;
        }

        let sharpe = self.window.sharpe();
        let fill_rate = self.window.fill_rate();
        let had_quotes = self.window.quotes > 0;
        let high_util = self.window.max_inventory_util > self.config.inv_util_threshold;
        if high_util {
            self.high_util_windows += 1;
        } else {
            self.high_util_windows = 0;
        }

        let mut next = self.current.clone();
        let mut reason = None;

        // One adjustment per window; rules in priority order.
        if had_quotes && self.window.fills > 0 && sharpe < 0.0 {
            let widened = clamp_spread(&next, next.base_spread_bps * dec!(1.10));
            if widened != next.base_spread_bps {
                next.base_spread_bps = widened;
                reason = Some(format!("negative window sharpe ({sharpe:.2})"));
            }
        } else if had_quotes && fill_rate < self.config.fill_rate_floor {
            let tightened = clamp_spread(&next, next.base_spread_bps * dec!(0.90));
            if tightened != next.base_spread_bps {
                next.base_spread_bps = tightened;
                reason = Some(format!("fill rate too low ({:.1}%)", fill_rate * 100.0));
            }
        } else if self.high_util_windows >= 2 {
            let raised = (next.inventory_skew_factor + dec!(0.05)).min(Decimal::ONE);
            if raised != next.inventory_skew_factor {
                next.inventory_skew_factor = raised;
                reason = Some(format!(
                    "inventory utilisation sustained above {:.0}%",
                    self.config.inv_util_threshold * 100.0
                ));
            }
        }

        // Drift guard: any parameter too far from its default snaps back.
        let drifted = self.reset_drifted(&mut next);

        self.window = Window::default();
        self.window_start_ms = now_ms;

        if reason.is_none() && !drifted {
            return None;
        }

        if let Some(reason) = &reason {
            info!(
                spread = %next.base_spread_bps,
                skew = %next.inventory_skew_factor,
                reason,
                "auto-tuner adjustment"
            );
        }
        self.adjustments += 1;
        self.current = next.clone();
        Some(next)
    }

    /// Reset any parameter drifting more than `max_drift_pct` from its
    /// baseline. Returns whether anything was reset.
    fn reset_drifted(&self, params: &mut QuoteParams) -> bool {
        let mut reset = false;
        let limit = self.config.max_drift_pct;

        if drift_pct(params.base_spread_bps, self.baseline.base_spread_bps) > limit {
            warn!(
                current = %params.base_spread_bps,
                baseline = %self.baseline.base_spread_bps,
                "base_spread_bps drift limit hit, resetting"
            );
            params.base_spread_bps = self.baseline.base_spread_bps;
            reset = true;
        }
        if drift_pct(params.inventory_skew_factor, self.baseline.inventory_skew_factor) > limit {
            warn!(
                current = %params.inventory_skew_factor,
                baseline = %self.baseline.inventory_skew_factor,
                "inventory_skew_factor drift limit hit, resetting"
            );
            params.inventory_skew_factor = self.baseline.inventory_skew_factor;
            reset = true;
        }
        if drift_pct(params.order_size_usd, self.baseline.order_size_usd) > limit {
            warn!(
                current = %params.order_size_usd,
                baseline = %self.baseline.order_size_usd,
                "order_size_usd drift limit hit, resetting"
            );
            params.order_size_usd = self.baseline.order_size_usd;
            reset = true;
        }
        reset
    }
}

fn clamp_spread(params: &QuoteParams, value: Decimal) -> Decimal {
    value
        .max(params.min_spread_bps)
        .min(params.max_spread_bps)
        .round_dp(4)
}

fn drift_pct(current: Decimal, baseline: Decimal) -> f64 {
    if baseline.is_zero() {
        return 0.0;
    }
    ((current - baseline) / baseline)
        .abs()
        .to_f64()
        .unwrap_or(0.0)
        * 100.0
}
