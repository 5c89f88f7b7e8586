//! Quote pricing.
//!
//! Avellaneda-Stoikov-style pricing: the half-spread grows with volatility
//! and inventory load, inventory skews both quotes toward flattening, the
//! directional signal shifts the effective mid, and toxicity widens or
//! suppresses quoting outright.
//!
//! `compute_quote` is a pure function. It never fails; sides that must not
//! be quoted come back suppressed.

use crate::params::QuoteParams;
use pmm_core::{Price, Size};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const BPS: Decimal = dec!(10000);

/// Per-level weight of the book-imbalance shift relative to the half-spread.
const IMBALANCE_WEIGHT: Decimal = dec!(0.3);

/// Base level-size weights; the last entry repeats for deeper books.
const LEVEL_WEIGHTS: [Decimal; 3] = [dec!(40), dec!(35), dec!(25)];

/// One price level of a two-sided quote.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteLevel {
    pub bid_price: Price,
    pub bid_size: Size,
    pub ask_price: Price,
    pub ask_size: Size,
}

/// A computed quote for one tick.
///
/// Suppressed sides keep their computed levels for observability, but the
/// order manager must not place them.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub levels: Vec<QuoteLevel>,
    pub suppress_bid: bool,
    pub suppress_ask: bool,
}

impl Quote {
    /// Both sides withdrawn for this tick.
    pub fn is_fully_suppressed(&self) -> bool {
        self.suppress_bid && self.suppress_ask
    }
}

/// Estimator outputs and market state feeding one pricing pass.
#[derive(Debug, Clone)]
pub struct QuoteInputs {
    pub mid: Price,
    /// Volatility estimate in basis points.
    pub sigma_bps: Decimal,
    /// Net position in contracts, signed.
    pub position: Size,
    pub max_position_usd: Decimal,
    /// Book imbalance in [-1, 1].
    pub imbalance: Decimal,
    /// Directional signal in {-1, 0, +1}.
    pub signal: i8,
    /// Toxicity in [0, 1]. 0 means the detector is not warmed up.
    pub toxicity: Decimal,
    /// Current top-of-book market spread in bps, if known.
    pub market_spread_bps: Option<Decimal>,
    /// Whether the fee-aware profitability gate is active.
    pub fee_aware: bool,
    pub maker_fee_bps: Decimal,
}

/// Price a two-sided multi-level quote.
pub fn compute_quote(inputs: &QuoteInputs, params: &QuoteParams) -> Quote {
    let mid = inputs.mid.inner();

    // Inventory utilisation, signed, clamped to [-1, 1].
    let inv_usd = inputs.position.inner() * mid;
    let inv_ratio = if inputs.max_position_usd.is_zero() {
        Decimal::ZERO
    } else {
        (inv_usd / inputs.max_position_usd).max(dec!(-1)).min(dec!(1))
    };

    // Half-spread in bps: base + volatility + inventory penalty, toxicity-
    // scaled, clamped to [min, max].
    let penalty_bps = inv_ratio.abs() * params.inventory_penalty_bps;
    let raw_bps = params
        .min_spread_bps
        .max(params.base_spread_bps + params.vol_multiplier * inputs.sigma_bps + penalty_bps);
    let half_bps = (raw_bps * toxicity_multiplier(inputs.toxicity))
        .max(params.min_spread_bps)
        .min(params.max_spread_bps);

    let half_px = half_bps / BPS * mid;
    let spacing_px = params.level_spacing_bps / BPS * mid;

    // Inventory skew in price units, amplified as utilisation passes 60%.
    let sigma_frac = inputs.sigma_bps / BPS;
    let skew_px = inv_ratio * params.inventory_skew_factor * sigma_frac * mid
        * skew_amplifier(inv_ratio.abs());

    // Directional shift: lean the whole quote in the signal's direction.
    let shift_px = Decimal::from(inputs.signal) * params.bias_strength * half_px;

    // Book-pressure shift: drift with resting volume imbalance.
    let imb_px = inputs.imbalance.max(dec!(-1)).min(dec!(1)) * IMBALANCE_WEIGHT * half_px;

    let weights = level_weights(params.num_levels);
    let mut levels = Vec::with_capacity(params.num_levels as usize);
    for (i, weight) in weights.iter().enumerate() {
        let offset = spacing_px * Decimal::from(i as u32);
        let bid = mid - half_px - offset - skew_px + shift_px + imb_px;
        let ask = mid + half_px + offset - skew_px + shift_px + imb_px;

        let notional = params.order_size_usd * weight;
        let size = if mid.is_zero() {
            Decimal::ZERO
        } else {
            notional / mid
        };

        levels.push(QuoteLevel {
            bid_price: Price::new(bid),
            bid_size: Size::new(size),
            ask_price: Price::new(ask),
            ask_size: Size::new(size),
        });
    }

    // Suppression conditions compose as a union.
    let mut suppress_bid = false;
    let mut suppress_ask = false;

    if inputs.toxicity > dec!(0.8) {
        suppress_bid = true;
        suppress_ask = true;
    }

    if inputs.fee_aware {
        if let Some(market_spread) = inputs.market_spread_bps {
            if market_spread < Decimal::TWO * inputs.maker_fee_bps {
                suppress_bid = true;
                suppress_ask = true;
            }
        }
    }

    let guard = dec!(0.6) * inputs.max_position_usd;
    if inv_usd > guard {
        suppress_bid = true;
    } else if inv_usd < -guard {
        suppress_ask = true;
    }

    Quote {
        levels,
        suppress_bid,
        suppress_ask,
    }
}

/// Spread multiplier from the toxicity score.
///
/// tau = 0 means "no data" and maps to 1.0; a warmed-up detector emitting a
/// genuinely low score (0, 0.2) earns a modest tightening.
fn toxicity_multiplier(tau: Decimal) -> Decimal {
    if tau > dec!(0.6) {
        dec!(1.5)
    } else if tau > dec!(0.4) {
        dec!(1.25)
    } else if tau.is_zero() {
        Decimal::ONE
    } else if tau < dec!(0.2) {
        dec!(0.9)
    } else {
        Decimal::ONE
    }
}

/// Skew amplifier: 1.0 up to 60% utilisation, ramping linearly to 1.6 at 100%.
fn skew_amplifier(utilisation: Decimal) -> Decimal {
    if utilisation <= dec!(0.6) {
        Decimal::ONE
    } else {
        Decimal::ONE + (utilisation.min(Decimal::ONE) - dec!(0.6)) / dec!(0.4) * dec!(0.6)
    }
}

/// Normalised size weights for `n` levels.
///
/// Base split 40/35/25; deeper books repeat the outermost weight, shallower
/// ones truncate. Always sums to 1.
fn level_weights(n: u32) -> Vec<Decimal> {
    let n = n.max(1) as usize;
    let raw: Vec<Decimal> = (0..n)
        .map(|i| LEVEL_WEIGHTS[i.min(LEVEL_WEIGHTS.len() - 1)])
        .collect();
    let total: Decimal = raw.iter().copied().sum();
    raw.into_iter().map(|w| w / total).collect()
}
