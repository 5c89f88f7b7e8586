//! Per-asset scoring and risk zones.
//!
//! `score = 0.40*sharpe + 0.30*return + 0.20*(1 - drawdown) + 0.10*consistency`
//! with every raw metric mapped into [0, 1] by fixed absolute thresholds,
//! not ranks: an asset is judged against the bar, not against its siblings.

use serde::{Deserialize, Serialize};

/// Raw metrics over a scoring window of daily PnLs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowMetrics {
    /// Annualised Sharpe of daily PnL.
    pub sharpe: f64,
    /// Total PnL over the window, USD.
    pub total_return: f64,
    /// Max peak-to-trough drawdown over the window, USD.
    pub max_drawdown: f64,
    /// Fraction of profitable days.
    pub consistency: f64,
}

/// Compute window metrics from a series of daily net PnLs.
pub fn window_metrics(daily_pnls: &[f64]) -> WindowMetrics {
    if daily_pnls.len() < 3 {
        return WindowMetrics {
            sharpe: 0.0,
            total_return: 0.0,
            max_drawdown: 0.0,
            consistency: 0.0,
        };
    }

    let n = daily_pnls.len() as f64;
    let mean = daily_pnls.iter().sum::<f64>() / n;
    let var = daily_pnls.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
    let sharpe = if var > 0.0 {
        mean / var.sqrt() * (365f64).sqrt()
    } else {
        0.0
    };

    let mut cumulative = 0.0;
    let mut peak = 0.0f64;
    let mut drawdown = 0.0f64;
    for p in daily_pnls {
        cumulative += p;
        peak = peak.max(cumulative);
        drawdown = drawdown.max(peak - cumulative);
    }

    WindowMetrics {
        sharpe,
        total_return: daily_pnls.iter().sum(),
        max_drawdown: drawdown,
        consistency: daily_pnls.iter().filter(|p| **p > 0.0).count() as f64 / n,
    }
}

/// Composite score in [0, 1] from absolute-threshold norms.
pub fn composite_score(m: &WindowMetrics) -> f64 {
    // Sharpe mapped from [-2, 15]; anything above 15 is simply excellent.
    let sharpe_norm = ((m.sharpe + 2.0) / 17.0).clamp(0.0, 1.0);

    // Return: bounded ratio, 0.5 at flat, saturating around +/- $100.
    let return_norm =
        (0.5 + m.total_return / (m.total_return.abs() + 100.0) * 0.5).clamp(0.0, 1.0);

    // Drawdown relative to the return magnitude, floored at $10.
    let reference = m.total_return.abs().max(10.0);
    let drawdown_norm = (m.max_drawdown / reference).clamp(0.0, 1.0);

    let consistency = m.consistency.clamp(0.0, 1.0);

    0.40 * sharpe_norm + 0.30 * return_norm + 0.20 * (1.0 - drawdown_norm) + 0.10 * consistency
}

/// Risk multipliers applied to a per-asset instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskMultipliers {
    pub size: f64,
    pub spread: f64,
    pub max_position: f64,
}

/// Score zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Reward,
    Hold,
    Punish,
    Pause,
}

impl Zone {
    pub fn from_score(score: f64) -> Self {
        if score > 0.70 {
            Self::Reward
        } else if score >= 0.30 {
            Self::Hold
        } else if score >= 0.10 {
            Self::Punish
        } else {
            Self::Pause
        }
    }

    /// Zone multipliers for (size, spread, max_position).
    pub fn multipliers(&self) -> RiskMultipliers {
        match self {
            Self::Reward => RiskMultipliers {
                size: 1.10,
                spread: 0.90,
                max_position: 1.10,
            },
            Self::Hold => RiskMultipliers {
                size: 1.0,
                spread: 1.0,
                max_position: 1.0,
            },
            Self::Punish => RiskMultipliers {
                size: 0.70,
                spread: 1.30,
                max_position: 0.70,
            },
            Self::Pause => RiskMultipliers {
                size: 0.40,
                spread: 1.50,
                max_position: 0.40,
            },
        }
    }
}
