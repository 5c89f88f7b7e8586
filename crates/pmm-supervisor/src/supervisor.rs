//! The daily meta-supervisor pass.
//!
//! Reads each asset's persisted day history, scores a rolling window,
//! derives zone multipliers and new base capitals, and publishes a fresh
//! `AllocatorState` snapshot. Compound assets keep their reinvested PnL on
//! top of the base; the base itself only ever moves at the rate-limited
//! allocator pace.

use crate::allocation::{allocate, AllocationConfig};
use crate::error::SupervisorResult;
use crate::score::{composite_score, window_metrics, Zone};
use crate::snapshot::{AllocatorState, AssetAllocation};
use pmm_telemetry::MetricsHistory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

/// Supervisor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Scoring window in days.
    #[serde(default = "default_window_days")]
    pub window_days: usize,
    /// Allocation parameters.
    #[serde(default)]
    pub allocation: AllocationConfig,
    /// Where the allocator snapshot is published.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            allocation: AllocationConfig::default(),
            snapshot_path: default_snapshot_path(),
        }
    }
}

fn default_window_days() -> usize {
    14
}
fn default_snapshot_path() -> PathBuf {
    PathBuf::from("data/allocations.json")
}

/// Assets under supervision.
#[derive(Debug, Clone)]
pub struct SupervisedAsset {
    pub symbol: String,
    pub compound: bool,
}

/// Daily allocator across per-asset instances.
pub struct MetaSupervisor {
    config: SupervisorConfig,
    history: MetricsHistory,
    assets: Vec<SupervisedAsset>,
}

impl MetaSupervisor {
    pub fn new(
        config: SupervisorConfig,
        history: MetricsHistory,
        assets: Vec<SupervisedAsset>,
    ) -> Self {
        Self {
            config,
            history,
            assets,
        }
    }

    pub fn snapshot_path(&self) -> &PathBuf {
        &self.config.snapshot_path
    }

    /// One supervisor pass: score, allocate, publish.
    pub fn run_once(&self, now_ms: u64) -> SupervisorResult<AllocatorState> {
        let prior = AllocatorState::load(&self.config.snapshot_path)?;
        let equal_share = self.config.allocation.total_capital / self.assets.len().max(1) as f64;

        let mut prior_bases = BTreeMap::new();
        let mut scores = BTreeMap::new();
        for asset in &self.assets {
            let base = prior
                .base_capital(&asset.symbol)
                .unwrap_or(equal_share)
                .max(self.config.allocation.min_capital);
            prior_bases.insert(asset.symbol.clone(), base);

            let days = self.history.tail(&asset.symbol, self.config.window_days)?;
            let pnls: Vec<f64> = days.iter().map(|d| d.net_pnl).collect();
            let metrics = window_metrics(&pnls);
            // Too little history reads as neutral: hold the allocation.
            let score = if pnls.len() < 3 {
                0.5
            } else {
                composite_score(&metrics)
            };
            scores.insert(asset.symbol.clone(), score);
        }

        let bases = allocate(&prior_bases, &scores, &self.config.allocation);

        let mut state = AllocatorState {
            updated_at_ms: now_ms,
            assets: BTreeMap::new(),
        };
        for asset in &self.assets {
            let score = scores[&asset.symbol];
            let zone = Zone::from_score(score);
            info!(
                asset = %asset.symbol,
                score = format!("{score:.3}"),
                zone = ?zone,
                base = format!("{:.0}", bases[&asset.symbol]),
                "supervisor verdict"
            );
            state.assets.insert(
                asset.symbol.clone(),
                AssetAllocation {
                    base_capital: bases[&asset.symbol],
                    score,
                    multipliers: zone.multipliers(),
                    compound: asset.compound,
                },
            );
        }

        state.store(&self.config.snapshot_path)?;
        Ok(state)
    }
}
