//! Application configuration.

use crate::error::{AppError, AppResult};
use pmm_mm::QuoteParams;
use pmm_risk::RiskLimits;
use pmm_strategy::StrategyConfig;
use pmm_supervisor::SupervisorConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which venue environment to trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Testnet,
    Mainnet,
}

/// Configuration for a single traded asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    pub symbol: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_capital")]
    pub capital_usd: Decimal,
    /// Reinvest PnL on top of the allocator base.
    #[serde(default)]
    pub compound: bool,
    #[serde(default)]
    pub fee_aware: bool,
    #[serde(default = "default_true")]
    pub use_toxicity: bool,
    #[serde(default)]
    pub auto_tune: bool,
    #[serde(default)]
    pub adaptive: bool,
    #[serde(default)]
    pub params: QuoteParams,
    #[serde(default)]
    pub limits: RiskLimits,
}

fn default_true() -> bool {
    true
}
fn default_capital() -> Decimal {
    Decimal::from(1000)
}

/// Paper-venue parameters (used until a live adapter is wired in).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    #[serde(default = "default_start_price")]
    pub start_price: f64,
    /// Per-tick random-walk volatility in bps.
    #[serde(default = "default_walk_vol_bps")]
    pub walk_vol_bps: f64,
    #[serde(default)]
    pub seed: u64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            start_price: default_start_price(),
            walk_vol_bps: default_walk_vol_bps(),
            seed: 0,
        }
    }
}

fn default_start_price() -> f64 {
    100.0
}
fn default_walk_vol_bps() -> f64 {
    3.0
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub network: Network,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Dead-man heartbeat cadence.
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
    /// Venue-side auto-cancel timeout.
    #[serde(default = "default_dms_timeout_ms")]
    pub dms_timeout_ms: u64,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub paper: PaperConfig,
    #[serde(default)]
    pub assets: Vec<AssetConfig>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_heartbeat_ms() -> u64 {
    15_000
}
fn default_dms_timeout_ms() -> u64 {
    60_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            data_dir: default_data_dir(),
            heartbeat_ms: default_heartbeat_ms(),
            dms_timeout_ms: default_dms_timeout_ms(),
            supervisor: SupervisorConfig::default(),
            paper: PaperConfig::default(),
            assets: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("failed to read {path}: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("failed to parse {path}: {e}")))
    }

    /// Load from the given path, `PMM_CONFIG`, or fall back to defaults
    /// when no file exists.
    pub fn load(path: Option<String>) -> AppResult<Self> {
        let path = path
            .or_else(|| std::env::var("PMM_CONFIG").ok())
            .unwrap_or_else(|| "config/default.toml".to_string());
        if Path::new(&path).exists() {
            Self::from_file(&path)
        } else {
            tracing::warn!(path = %path, "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Validate everything the strategy loops will assume.
    pub fn validate(&self) -> AppResult<()> {
        if self.enabled_assets().next().is_none() {
            return Err(AppError::Config("no enabled assets".into()));
        }
        for asset in self.enabled_assets() {
            asset
                .params
                .validate()
                .map_err(|e| AppError::Config(format!("{}: {e}", asset.symbol)))?;
            asset
                .limits
                .validate()
                .map_err(|e| AppError::Config(format!("{}: {e}", asset.symbol)))?;
        }
        Ok(())
    }

    pub fn enabled_assets(&self) -> impl Iterator<Item = &AssetConfig> {
        self.assets.iter().filter(|a| a.enabled)
    }

    /// Build the per-asset strategy configuration.
    pub fn strategy_config(&self, asset: &AssetConfig) -> StrategyConfig {
        StrategyConfig {
            symbol: asset.symbol.clone(),
            capital_usd: asset.capital_usd,
            params: asset.params.clone(),
            limits: asset.limits.clone(),
            fee_aware: asset.fee_aware,
            use_toxicity: asset.use_toxicity,
            auto_tune: asset.auto_tune,
            compound: asset.compound,
            adaptive: asset.adaptive,
            data_dir: self.data_dir.join("metrics"),
            live_params_path: self.data_dir.join("live_params.json"),
            allocations_path: self.supervisor.snapshot_path.clone(),
            ..StrategyConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn asset(symbol: &str) -> AssetConfig {
        AssetConfig {
            symbol: symbol.to_string(),
            enabled: true,
            capital_usd: dec!(1000),
            compound: false,
            fee_aware: false,
            use_toxicity: true,
            auto_tune: false,
            adaptive: false,
            params: QuoteParams::default(),
            limits: RiskLimits::default(),
        }
    }

    #[test]
    fn test_empty_config_rejected() {
        assert!(AppConfig::default().validate().is_err());
    }

    #[test]
    fn test_valid_config_passes() {
        let config = AppConfig {
            assets: vec![asset("BTC")],
            ..AppConfig::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn test_bad_params_rejected() {
        let mut bad = asset("BTC");
        bad.params.num_levels = 0;
        let config = AppConfig {
            assets: vec![bad],
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_parse_with_defaults() {
        let toml_str = r#"
network = "mainnet"

[[assets]]
symbol = "BTC"
compound = true

[assets.params]
base_spread_bps = "2.0"
num_levels = 2

[[assets]]
symbol = "ETH"
enabled = false
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.assets.len(), 2);
        assert_eq!(config.enabled_assets().count(), 1);
        let btc = &config.assets[0];
        assert!(btc.compound);
        assert_eq!(btc.params.base_spread_bps, dec!(2.0));
        assert_eq!(btc.params.num_levels, 2);
        // Unspecified fields take their defaults.
        assert_eq!(btc.params.max_spread_bps, dec!(20));
    }

    #[test]
    fn test_strategy_config_paths_share_data_dir() {
        let config = AppConfig {
            data_dir: PathBuf::from("/tmp/pmm"),
            assets: vec![asset("BTC")],
            ..AppConfig::default()
        };
        let sc = config.strategy_config(&config.assets[0]);
        assert_eq!(sc.data_dir, PathBuf::from("/tmp/pmm/metrics"));
        assert_eq!(sc.live_params_path, PathBuf::from("/tmp/pmm/live_params.json"));
    }
}
