//! Per-asset metadata and venue rounding discipline.
//!
//! The venue quantises sizes to `size_decimals` decimal places and prices to
//! `6 - size_decimals` places with at most 5 significant figures. All
//! rounding is half-away-from-zero.

use crate::error::{CoreError, Result};
use crate::{Price, Size};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Maximum significant figures for prices.
pub const PRICE_SIG_FIGS: u32 = 5;

/// Maximum decimal places for a perp price before the size-decimals
/// adjustment: `price_decimals = MAX_PRICE_DECIMALS - size_decimals`.
pub const MAX_PRICE_DECIMALS: u32 = 6;

/// Per-asset metadata from the venue universe.
///
/// Material changes (size_decimals, fees) should halt quoting for the asset
/// until the next clean tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMeta {
    /// Venue symbol (e.g. "BTC").
    pub symbol: String,
    /// Size decimals from the venue (szDecimals).
    pub size_decimals: u32,
    /// Maker fee in basis points. Positive = cost, negative = rebate.
    pub maker_fee_bps: Decimal,
    /// Taker fee in basis points.
    pub taker_fee_bps: Decimal,
}

impl AssetMeta {
    pub fn new(symbol: impl Into<String>, size_decimals: u32) -> Result<Self> {
        if size_decimals > MAX_PRICE_DECIMALS {
            return Err(CoreError::InvalidMeta(format!(
                "size_decimals {size_decimals} exceeds {MAX_PRICE_DECIMALS}"
            )));
        }
        Ok(Self {
            symbol: symbol.into(),
            size_decimals,
            maker_fee_bps: Decimal::new(15, 1), // 1.5 bps
            taker_fee_bps: Decimal::new(45, 1), // 4.5 bps
        })
    }

    /// Allowed price decimals for this asset.
    #[inline]
    pub fn price_decimals(&self) -> u32 {
        MAX_PRICE_DECIMALS - self.size_decimals
    }

    /// Minimum size increment: 10^(-size_decimals).
    pub fn lot(&self) -> Size {
        Size::new(Decimal::new(1, self.size_decimals))
    }

    /// Round a price to the venue grid: first to `price_decimals` places,
    /// then to 5 significant figures, both half-away-from-zero.
    pub fn round_price(&self, price: Price) -> Price {
        let stepped = price.inner().round_dp_with_strategy(
            self.price_decimals(),
            RoundingStrategy::MidpointAwayFromZero,
        );
        Price::new(round_sig_figs(stepped, PRICE_SIG_FIGS))
    }

    /// Round a size to `size_decimals` places, half-away-from-zero.
    pub fn round_size(&self, size: Size) -> Size {
        Size::new(
            size.inner()
                .round_dp_with_strategy(self.size_decimals, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Whether another snapshot of the same asset differs in a way that
    /// invalidates outstanding quotes.
    pub fn has_material_change(&self, other: &Self) -> bool {
        self.size_decimals != other.size_decimals
            || self.maker_fee_bps != other.maker_fee_bps
            || self.taker_fee_bps != other.taker_fee_bps
    }
}

/// Round a decimal to `sig_figs` significant figures, half-away-from-zero.
pub fn round_sig_figs(value: Decimal, sig_figs: u32) -> Decimal {
    if value.is_zero() {
        return value;
    }
    let magnitude = magnitude(value.abs());
    // Decimal places that keep exactly `sig_figs` significant digits.
    let dp = sig_figs as i32 - magnitude - 1;
    if dp >= 0 {
        value.round_dp_with_strategy(dp as u32, RoundingStrategy::MidpointAwayFromZero)
    } else {
        // Integer digits beyond the sig-fig budget: scale down, round, scale up.
        let factor = Decimal::from(10i64.pow((-dp) as u32));
        (value / factor).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero) * factor
    }
}

/// Order of magnitude of a positive decimal:
/// 12345 -> 4, 1.2 -> 0, 0.00123 -> -3.
fn magnitude(value: Decimal) -> i32 {
    debug_assert!(value.is_sign_positive());
    let int_part = value.trunc();
    if !int_part.is_zero() {
        return int_part.to_string().len() as i32 - 1;
    }
    // Below 1: count leading zeros after the decimal point.
    let s = value.to_string();
    let mut mag = 0i32;
    for c in s.chars().skip_while(|&c| c != '.').skip(1) {
        mag -= 1;
        if c != '0' {
            break;
        }
    }
    mag
}
