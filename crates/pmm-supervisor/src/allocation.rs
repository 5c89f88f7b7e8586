//! Capital allocation.
//!
//! Targets are proportional to a softmax of the per-asset scores, clipped
//! per asset to [min_capital, max_fraction * total]. Movement is gated by
//! zone: Reward and Punish assets chase their target, Hold assets keep
//! their base, and Pause assets keep their base frozen while the risk
//! multipliers throttle them. Every asset additionally drifts 1%/day of
//! the gap back toward equal weight, and the combined daily move is
//! clamped to +/- `max_daily_change` of the prior base. The sum of bases
//! never exceeds the total portfolio.

use crate::score::Zone;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Allocation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// Total portfolio capital, USD.
    pub total_capital: f64,
    /// Per-asset floor, USD.
    #[serde(default = "default_min_capital")]
    pub min_capital: f64,
    /// Per-asset ceiling as a fraction of total.
    #[serde(default = "default_max_fraction")]
    pub max_fraction: f64,
    /// Daily move cap as a fraction of the prior base.
    #[serde(default = "default_max_daily_change")]
    pub max_daily_change: f64,
    /// Daily pull toward equal weight, as a fraction of the gap.
    #[serde(default = "default_mean_reversion")]
    pub mean_reversion: f64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            total_capital: 10_000.0,
            min_capital: default_min_capital(),
            max_fraction: default_max_fraction(),
            max_daily_change: default_max_daily_change(),
            mean_reversion: default_mean_reversion(),
        }
    }
}

fn default_min_capital() -> f64 {
    500.0
}
fn default_max_fraction() -> f64 {
    0.35
}
fn default_max_daily_change() -> f64 {
    0.05
}
fn default_mean_reversion() -> f64 {
    0.01
}

/// One allocation step: prior bases + scores -> new bases.
pub fn allocate(
    prior: &BTreeMap<String, f64>,
    scores: &BTreeMap<String, f64>,
    config: &AllocationConfig,
) -> BTreeMap<String, f64> {
    if prior.is_empty() {
        return BTreeMap::new();
    }
    let total = config.total_capital;
    let n = prior.len() as f64;
    let equal_share = total / n;
    let ceiling = config.max_fraction * total;

    // Softmax targets over the raw scores.
    let exp_sum: f64 = prior
        .keys()
        .map(|sym| scores.get(sym).copied().unwrap_or(0.5).exp())
        .sum();

    let mut next = BTreeMap::new();
    for (sym, &base) in prior {
        let score = scores.get(sym).copied().unwrap_or(0.5);
        let target = (total * score.exp() / exp_sum).clamp(config.min_capital, ceiling);

        // Zone gates the target pull: only rewarded assets gain and only
        // punished assets shed. Hold means hold, and a paused asset's base
        // stays put while its multipliers do the throttling.
        let target_pull = match Zone::from_score(score) {
            Zone::Reward | Zone::Punish => target - base,
            Zone::Hold | Zone::Pause => 0.0,
        };

        // The slow drift back to equal weight applies to everyone; the
        // combined move stays inside the daily cap.
        let pull = target_pull + config.mean_reversion * (equal_share - base);
        let cap = config.max_daily_change * base;
        let moved = base + pull.clamp(-cap, cap);

        let bounded = moved.clamp(config.min_capital, ceiling);
        // The bound clip must not smuggle a larger-than-cap move through.
        let new_base = bounded.clamp(base - cap, base + cap);
        debug!(asset = %sym, base, target, new_base, "allocation step");
        next.insert(sym.clone(), new_base);
    }

    // The clipped sum may exceed the portfolio: shave the increases
    // proportionally until the bases fit again.
    let sum: f64 = next.values().sum();
    if sum > total {
        let excess = sum - total;
        let raised: Vec<String> = next
            .iter()
            .filter(|(sym, v)| **v > prior[*sym])
            .map(|(sym, _)| sym.clone())
            .collect();
        let total_raise: f64 = raised.iter().map(|sym| next[sym] - prior[sym]).sum();
        if total_raise > 0.0 {
            for sym in raised {
                let raise = next[&sym] - prior[&sym];
                let give_back = excess * raise / total_raise;
                *next.get_mut(&sym).expect("raised asset present") -= give_back;
            }
        }
    }

    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(total: f64) -> AllocationConfig {
        AllocationConfig {
            total_capital: total,
            min_capital: 100.0,
            ..AllocationConfig::default()
        }
    }

    fn equal_start(total: f64, syms: &[&str]) -> BTreeMap<String, f64> {
        let share = total / syms.len() as f64;
        syms.iter().map(|s| (s.to_string(), share)).collect()
    }

    fn scores(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(s, v)| (s.to_string(), *v)).collect()
    }

    #[test]
    fn test_scenario_day_one_moves() {
        // Four assets, equal start, scores across all four zones.
        let total = 10_000.0;
        let prior = equal_start(total, &["A", "B", "C", "D"]);
        let s = scores(&[("A", 0.85), ("B", 0.55), ("C", 0.25), ("D", 0.05)]);

        let next = allocate(&prior, &s, &config(total));

        // Reward gains the full 5% cap, Punish sheds it, Hold and Pause
        // keep the equal share: {0.2625, 0.2500, 0.2375, 0.2500} of total.
        assert!((next["A"] - 2_625.0).abs() < 1e-6);
        assert!((next["B"] - 2_500.0).abs() < 1e-6);
        assert!((next["C"] - 2_375.0).abs() < 1e-6);
        assert!((next["D"] - 2_500.0).abs() < 1e-6);

        // Invariants: moves capped, floor respected, sum bounded.
        for (sym, base) in &next {
            let delta = (base - prior[sym]).abs();
            assert!(delta <= 0.05 * prior[sym] + 1e-9, "{sym} moved {delta}");
            assert!(*base >= 100.0);
        }
        assert!(next.values().sum::<f64>() <= total + 1e-6);
    }

    #[test]
    fn test_ceiling_clips_target() {
        let total = 10_000.0;
        let mut prior = equal_start(total, &["A", "B"]);
        // A already near the 35% ceiling.
        prior.insert("A".into(), 3_450.0);
        prior.insert("B".into(), 3_450.0);
        let s = scores(&[("A", 0.95), ("B", 0.05)]);

        let next = allocate(&prior, &s, &config(total));
        assert!(next["A"] <= 3_500.0 + 1e-9);
    }

    #[test]
    fn test_pause_base_is_frozen() {
        let total = 10_000.0;
        let prior = equal_start(total, &["A", "B", "C", "D"]);
        let s = scores(&[("A", 0.5), ("B", 0.5), ("C", 0.5), ("D", 0.02)]);

        let next = allocate(&prior, &s, &config(total));
        // At equal weight the mean reversion is zero, so the paused asset
        // holds its base exactly.
        assert!((next["D"] - 2_500.0).abs() < 1e-9);
    }

    #[test]
    fn test_floor_respected_for_losers() {
        let total = 1_000.0;
        let mut prior = BTreeMap::new();
        prior.insert("A".to_string(), 105.0);
        prior.insert("B".to_string(), 895.0);
        // A scores into the Punish zone, so the target pull applies.
        let s = scores(&[("A", 0.15), ("B", 0.9)]);

        let cfg = config(total);
        let next = allocate(&prior, &s, &cfg);
        assert!(next["A"] >= cfg.min_capital - 1e-9);
    }

    #[test]
    fn test_equal_scores_drift_to_equal_weight() {
        let mut cfg = config(5_000.0);
        cfg.max_fraction = 0.7;
        let mut prior = BTreeMap::new();
        prior.insert("A".to_string(), 3_000.0);
        prior.insert("B".to_string(), 2_000.0);
        let s = scores(&[("A", 0.5), ("B", 0.5)]);

        let next = allocate(&prior, &s, &cfg);
        // Identical Hold-zone scores: only the mean reversion moves them.
        assert!(next["A"] < 3_000.0);
        assert!(next["B"] > 2_000.0);
    }

    #[test]
    fn test_sum_never_exceeds_total() {
        let total = 10_000.0;
        // All assets near the ceiling with top scores.
        let mut prior = BTreeMap::new();
        for sym in ["A", "B", "C"] {
            prior.insert(sym.to_string(), 3_300.0);
        }
        let s = scores(&[("A", 0.9), ("B", 0.9), ("C", 0.9)]);

        let next = allocate(&prior, &s, &config(total));
        assert!(next.values().sum::<f64>() <= total + 1e-6);
    }

    #[test]
    fn test_missing_score_holds_near_neutral() {
        let total = 10_000.0;
        let prior = equal_start(total, &["A", "B"]);
        let s = scores(&[("A", 0.5)]); // B missing -> neutral 0.5

        let next = allocate(&prior, &s, &config(total));
        assert!((next["A"] - next["B"]).abs() < 1e-9);
    }
}
