//! Dynamic order sizing.
//!
//! Unlike the auto-tuner (slow, windowed), the sizer recomputes on every
//! quote cycle from current conditions: volatility regime, fill rate,
//! inventory load, toxicity and recent drawdown. Each factor is bounded and
//! the combined multiplier is clamped to [0.25, 1.5].

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Volatility regime bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolRegime {
    Low,
    Medium,
    High,
}

/// Sizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizerConfig {
    #[serde(default = "default_min_order_usd")]
    pub min_order_usd: Decimal,
    #[serde(default = "default_max_order_usd")]
    pub max_order_usd: Decimal,
    /// Fill rate the sizer steers toward.
    #[serde(default = "default_fill_rate_target")]
    pub fill_rate_target: f64,
    /// 7-day drawdown (as a fraction of capital) beyond which size shrinks.
    #[serde(default = "default_drawdown_threshold")]
    pub drawdown_threshold: f64,
}

impl Default for SizerConfig {
    fn default() -> Self {
        Self {
            min_order_usd: default_min_order_usd(),
            max_order_usd: default_max_order_usd(),
            fill_rate_target: default_fill_rate_target(),
            drawdown_threshold: default_drawdown_threshold(),
        }
    }
}

fn default_min_order_usd() -> Decimal {
    Decimal::from(20)
}
fn default_max_order_usd() -> Decimal {
    Decimal::from(5000)
}
fn default_fill_rate_target() -> f64 {
    0.5
}
fn default_drawdown_threshold() -> f64 {
    0.03
}

/// Current conditions feeding one sizing pass.
#[derive(Debug, Clone, Copy)]
pub struct SizerInputs {
    pub vol_regime: VolRegime,
    /// Rolling fill rate in [0, 1].
    pub fill_rate: f64,
    /// |position| / max position, in [0, 1].
    pub inventory_utilisation: f64,
    /// Toxicity EMA in [0, 1].
    pub toxicity_ema: f64,
    /// 7-day drawdown as a fraction of capital.
    pub drawdown_7d: f64,
}

/// Per-tick order-size scaler.
#[derive(Debug, Clone)]
pub struct DynamicSizer {
    config: SizerConfig,
}

impl DynamicSizer {
    pub fn new(config: SizerConfig) -> Self {
        Self { config }
    }

    /// Combined multiplier, clamped to [0.25, 1.5].
    pub fn multiplier(&self, inputs: &SizerInputs) -> f64 {
        let mut m = 1.0;

        m *= match inputs.vol_regime {
            VolRegime::Low => 1.2,
            VolRegime::Medium => 1.0,
            VolRegime::High => 0.7,
        };

        m *= self.fill_rate_factor(inputs.fill_rate);
        m *= inventory_factor(inputs.inventory_utilisation);

        if inputs.toxicity_ema > 0.5 {
            m *= 0.75;
        }

        m *= self.drawdown_factor(inputs.drawdown_7d);

        m.clamp(0.25, 1.5)
    }

    /// Scale a base USD size, clamped to the configured bounds.
    pub fn apply(&self, base_size_usd: Decimal, inputs: &SizerInputs) -> Decimal {
        let mult = Decimal::from_f64(self.multiplier(inputs)).unwrap_or(Decimal::ONE);
        (base_size_usd * mult)
            .max(self.config.min_order_usd)
            .min(self.config.max_order_usd)
            .round_dp(2)
    }

    /// Below target ramps toward 1.2 (starving for fills), above target
    /// ramps down toward 0.85 (getting run over).
    fn fill_rate_factor(&self, fill_rate: f64) -> f64 {
        let target = self.config.fill_rate_target.clamp(0.01, 1.0);
        let fr = fill_rate.clamp(0.0, 1.0);
        if fr < target {
            1.0 + 0.2 * (1.0 - fr / target)
        } else {
            let over = (fr - target) / (1.0 - target).max(1e-9);
            1.0 - 0.15 * over.min(1.0)
        }
    }

    /// Ramps toward 0.4 as drawdown reaches twice the threshold.
    fn drawdown_factor(&self, drawdown: f64) -> f64 {
        let threshold = self.config.drawdown_threshold;
        if threshold <= 0.0 || drawdown <= threshold {
            return 1.0;
        }
        let over = ((drawdown - threshold) / threshold).min(1.0);
        1.0 - 0.6 * over
    }
}

/// Heavy inventory shrinks size, ramping toward 0.5 at full utilisation.
fn inventory_factor(utilisation: f64) -> f64 {
    let u = utilisation.abs().clamp(0.0, 1.0);
    if u < 0.7 {
        1.0
    } else {
        1.0 - 0.5 * (u - 0.7) / 0.3
    }
}
