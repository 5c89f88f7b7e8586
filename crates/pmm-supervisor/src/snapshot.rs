//! Allocator state snapshots.
//!
//! The snapshot file is replaced with write-then-rename so readers always
//! see either the old or the new state, never a torn one. Strategy loops
//! poll by mtime at their hot-reload cadence.

use crate::error::SupervisorResult;
use crate::score::RiskMultipliers;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Per-asset allocation output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetAllocation {
    /// Supervisor-controlled base capital, USD.
    pub base_capital: f64,
    /// Composite score behind the decision.
    pub score: f64,
    /// Risk multipliers for size, spread and max position.
    pub multipliers: RiskMultipliers,
    /// Whether this asset reinvests PnL on top of the base.
    pub compound: bool,
}

/// Immutable allocator output, one per supervisor run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AllocatorState {
    /// When this snapshot was produced, unix milliseconds.
    pub updated_at_ms: u64,
    pub assets: BTreeMap<String, AssetAllocation>,
}

impl AllocatorState {
    /// Load a snapshot. A missing file yields the default (empty) state.
    pub fn load(path: &Path) -> SupervisorResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Publish atomically: write a sibling temp file, then rename over.
    pub fn store(&self, path: &Path) -> SupervisorResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        fs::rename(&tmp, path)?;
        info!(path = %path.display(), assets = self.assets.len(), "allocator snapshot published");
        Ok(())
    }

    pub fn base_capital(&self, symbol: &str) -> Option<f64> {
        self.assets.get(symbol).map(|a| a.base_capital)
    }

    pub fn multipliers(&self, symbol: &str) -> Option<RiskMultipliers> {
        self.assets.get(symbol).map(|a| a.multipliers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::Zone;

    fn state() -> AllocatorState {
        let mut assets = BTreeMap::new();
        assets.insert(
            "BTC".to_string(),
            AssetAllocation {
                base_capital: 2_625.0,
                score: 0.85,
                multipliers: Zone::Reward.multipliers(),
                compound: true,
            },
        );
        assets.insert(
            "SOL".to_string(),
            AssetAllocation {
                base_capital: 2_375.0,
                score: 0.25,
                multipliers: Zone::Punish.multipliers(),
                compound: false,
            },
        );
        AllocatorState {
            updated_at_ms: 1_700_000_000_000,
            assets,
        }
    }

    fn temp_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("pmm-alloc-{tag}-{}.json", std::process::id()))
    }

    #[test]
    fn test_store_load_roundtrip() {
        let path = temp_path("roundtrip");
        let s = state();
        s.store(&path).unwrap();
        let loaded = AllocatorState::load(&path).unwrap();
        assert_eq!(loaded, s);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_is_default() {
        let loaded = AllocatorState::load(Path::new("/nonexistent/alloc.json")).unwrap();
        assert!(loaded.assets.is_empty());
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let path = temp_path("tmpfile");
        state().store(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_accessors() {
        let s = state();
        assert_eq!(s.base_capital("BTC"), Some(2_625.0));
        assert_eq!(s.multipliers("SOL").unwrap().spread, 1.30);
        assert!(s.base_capital("DOGE").is_none());
    }
}
