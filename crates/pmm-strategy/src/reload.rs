//! Hot-reload of live parameters and allocator snapshots.
//!
//! Both inputs are immutable files replaced atomically (write-then-rename)
//! by their producers: `live_params.json` from the nightly reoptimiser and
//! the allocator snapshot from the meta-supervisor. Strategy loops poll by
//! mtime at a fixed tick cadence and swap values atomically when a change
//! lands.

use crate::error::StrategyResult;
use pmm_mm::QuoteParams;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Watches one file for mtime changes.
pub struct SnapshotPoller {
    path: PathBuf,
    last_mtime: Option<SystemTime>,
}

impl SnapshotPoller {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_mtime: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file changed since the last check. The first sighting of
    /// an existing file counts as a change.
    pub fn changed(&mut self) -> bool {
        let mtime = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(_) => return false,
        };
        match self.last_mtime {
            Some(last) if mtime <= last => false,
            _ => {
                self.last_mtime = Some(mtime);
                true
            }
        }
    }
}

/// Per-asset overrides from the nightly reoptimiser.
///
/// Absent fields keep their configured values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamOverrides {
    pub base_spread_bps: Option<Decimal>,
    pub vol_multiplier: Option<Decimal>,
    pub inventory_skew_factor: Option<Decimal>,
    pub order_size_usd: Option<Decimal>,
    pub num_levels: Option<u32>,
    pub level_spacing_bps: Option<Decimal>,
    pub bias_strength: Option<Decimal>,
}

impl ParamOverrides {
    /// Produce a fresh `QuoteParams` with the overrides applied.
    pub fn apply(&self, base: &QuoteParams) -> QuoteParams {
        let mut params = base.clone();
        if let Some(v) = self.base_spread_bps {
            params.base_spread_bps = v;
        }
        if let Some(v) = self.vol_multiplier {
            params.vol_multiplier = v;
        }
        if let Some(v) = self.inventory_skew_factor {
            params.inventory_skew_factor = v;
        }
        if let Some(v) = self.order_size_usd {
            params.order_size_usd = v;
        }
        if let Some(v) = self.num_levels {
            params.num_levels = v;
        }
        if let Some(v) = self.level_spacing_bps {
            params.level_spacing_bps = v;
        }
        if let Some(v) = self.bias_strength {
            params.bias_strength = v;
        }
        params
    }
}

/// The `live_params.json` container: symbol -> overrides.
pub struct LiveParamsFile;

impl LiveParamsFile {
    pub fn load(path: &Path) -> StrategyResult<HashMap<String, ParamOverrides>> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
