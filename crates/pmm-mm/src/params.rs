//! Quoting parameters.
//!
//! `QuoteParams` is an immutable value: hot-reload and the auto-tuner both
//! produce a fresh instance that the strategy loop swaps in atomically.
//! There is no runtime-patchable parameter registry.

use pmm_core::{CoreError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Parameters for the quote engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteParams {
    /// Base spread in basis points before volatility/inventory terms.
    #[serde(default = "default_base_spread_bps")]
    pub base_spread_bps: Decimal,
    /// Spread widening per bps of volatility.
    #[serde(default = "default_vol_multiplier")]
    pub vol_multiplier: Decimal,
    /// How strongly inventory skews quotes toward flattening.
    #[serde(default = "default_inventory_skew_factor")]
    pub inventory_skew_factor: Decimal,
    /// Inventory spread penalty in bps at full utilisation.
    #[serde(default)]
    pub inventory_penalty_bps: Decimal,
    /// Per-side notional in USD, split across levels.
    #[serde(default = "default_order_size_usd")]
    pub order_size_usd: Decimal,
    /// Quote levels per side.
    #[serde(default = "default_num_levels")]
    pub num_levels: u32,
    /// Spacing between successive levels in bps.
    #[serde(default = "default_level_spacing_bps")]
    pub level_spacing_bps: Decimal,
    /// How strongly the directional signal shifts quotes, 0-1.
    #[serde(default = "default_bias_strength")]
    pub bias_strength: Decimal,
    /// Floor on the half-spread in bps.
    #[serde(default = "default_min_spread_bps")]
    pub min_spread_bps: Decimal,
    /// Cap on the half-spread in bps.
    #[serde(default = "default_max_spread_bps")]
    pub max_spread_bps: Decimal,
    /// Quote refresh period in milliseconds.
    #[serde(default = "default_quote_refresh_ms")]
    pub quote_refresh_ms: u64,
}

impl Default for QuoteParams {
    fn default() -> Self {
        Self {
            base_spread_bps: default_base_spread_bps(),
            vol_multiplier: default_vol_multiplier(),
            inventory_skew_factor: default_inventory_skew_factor(),
            inventory_penalty_bps: Decimal::ZERO,
            order_size_usd: default_order_size_usd(),
            num_levels: default_num_levels(),
            level_spacing_bps: default_level_spacing_bps(),
            bias_strength: default_bias_strength(),
            min_spread_bps: default_min_spread_bps(),
            max_spread_bps: default_max_spread_bps(),
            quote_refresh_ms: default_quote_refresh_ms(),
        }
    }
}

impl QuoteParams {
    /// Check the structural invariants: min <= base <= max, at least one
    /// level, positive sizes.
    pub fn validate(&self) -> Result<()> {
        if self.num_levels == 0 {
            return Err(CoreError::InvalidParam("num_levels must be >= 1".into()));
        }
        if self.min_spread_bps > self.base_spread_bps || self.base_spread_bps > self.max_spread_bps
        {
            return Err(CoreError::InvalidParam(format!(
                "spread ordering violated: min {} <= base {} <= max {}",
                self.min_spread_bps, self.base_spread_bps, self.max_spread_bps
            )));
        }
        if !self.order_size_usd.is_sign_positive() || self.order_size_usd.is_zero() {
            return Err(CoreError::InvalidParam("order_size_usd must be > 0".into()));
        }
        if self.level_spacing_bps.is_sign_negative() {
            return Err(CoreError::InvalidParam(
                "level_spacing_bps must be >= 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_base_spread_bps() -> Decimal {
    Decimal::TWO
}
fn default_vol_multiplier() -> Decimal {
    Decimal::new(15, 1) // 1.5
}
fn default_inventory_skew_factor() -> Decimal {
    Decimal::new(5, 1) // 0.5
}
fn default_order_size_usd() -> Decimal {
    Decimal::from(100)
}
fn default_num_levels() -> u32 {
    1
}
fn default_level_spacing_bps() -> Decimal {
    Decimal::ONE
}
fn default_bias_strength() -> Decimal {
    Decimal::new(5, 1) // 0.5
}
fn default_min_spread_bps() -> Decimal {
    Decimal::new(5, 1) // 0.5
}
fn default_max_spread_bps() -> Decimal {
    Decimal::from(20)
}
fn default_quote_refresh_ms() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_validate() {
        QuoteParams::default().validate().unwrap();
    }

    #[test]
    fn test_spread_ordering_enforced() {
        let params = QuoteParams {
            base_spread_bps: dec!(30), // above max 20
            ..QuoteParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_zero_levels_rejected() {
        let params = QuoteParams {
            num_levels: 0,
            ..QuoteParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_zero_size_rejected() {
        let params = QuoteParams {
            order_size_usd: Decimal::ZERO,
            ..QuoteParams::default()
        };
        assert!(params.validate().is_err());
    }
}
