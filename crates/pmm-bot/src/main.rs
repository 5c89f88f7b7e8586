//! Perp market-making bot entry point.
//!
//! Exit codes: 0 normal, 2 misconfiguration, 3 unrecoverable venue error,
//! 4 risk-halted shutdown.

use clap::Parser;
use pmm_bot::{AppConfig, Application, AssetConfig, Network};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{error, info};

/// Perp market-making bot.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (also via PMM_CONFIG).
    #[arg(short, long)]
    config: Option<String>,

    /// Run a single symbol.
    #[arg(long, conflicts_with = "all")]
    symbol: Option<String>,

    /// Run every enabled symbol from the config.
    #[arg(long)]
    all: bool,

    /// Use the testnet environment (default).
    #[arg(long, conflicts_with = "mainnet")]
    testnet: bool,

    /// Use the mainnet environment.
    #[arg(long)]
    mainnet: bool,

    /// Capital override in USD (single-symbol runs).
    #[arg(long)]
    capital: Option<f64>,

    /// Suppress quoting when the market spread cannot pay the fees.
    #[arg(long)]
    fee_aware: bool,

    /// Enable the post-fill toxicity detector.
    #[arg(long)]
    toxicity: bool,

    /// Enable the 4-hour auto-tuner.
    #[arg(long)]
    auto_tune: bool,

    /// Reinvest PnL on top of the allocator base.
    #[arg(long)]
    compound: bool,
}

fn apply_cli(mut config: AppConfig, args: &Args) -> AppConfig {
    if args.mainnet {
        config.network = Network::Mainnet;
    } else if args.testnet {
        config.network = Network::Testnet;
    }

    if let Some(symbol) = &args.symbol {
        let symbol = symbol.to_uppercase();
        if !config.assets.iter().any(|a| a.symbol == symbol) {
            config.assets.push(AssetConfig {
                symbol: symbol.clone(),
                enabled: true,
                capital_usd: Decimal::from(1000),
                compound: false,
                fee_aware: false,
                use_toxicity: true,
                auto_tune: false,
                adaptive: false,
                params: Default::default(),
                limits: Default::default(),
            });
        }
        for asset in &mut config.assets {
            asset.enabled = asset.symbol == symbol;
        }
        if let Some(capital) = args.capital {
            if let Some(asset) = config.assets.iter_mut().find(|a| a.symbol == symbol) {
                asset.capital_usd = Decimal::from_f64(capital).unwrap_or(asset.capital_usd);
            }
        }
    } else if !args.all {
        // Default: the first configured asset only.
        let first = config
            .assets
            .iter()
            .position(|a| a.enabled)
            .unwrap_or_default();
        for (i, asset) in config.assets.iter_mut().enumerate() {
            asset.enabled = i == first && asset.enabled;
        }
    }

    for asset in config.assets.iter_mut().filter(|a| a.enabled) {
        if args.fee_aware {
            asset.fee_aware = true;
        }
        if args.toxicity {
            asset.use_toxicity = true;
        }
        if args.auto_tune {
            asset.auto_tune = true;
        }
        if args.compound {
            asset.compound = true;
        }
    }

    config
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = pmm_telemetry::init_logging() {
        eprintln!("failed to initialise logging: {e}");
        std::process::exit(2);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "starting pmm-bot");

    let exit_code = match AppConfig::load(args.config.clone()) {
        Ok(config) => {
            let config = apply_cli(config, &args);
            info!(
                network = ?config.network,
                assets = config.enabled_assets().count(),
                "configuration loaded"
            );
            match Application::new(config) {
                Ok(app) => match app.run().await {
                    Ok(()) => 0,
                    Err(e) => {
                        error!(error = %e, "application terminated");
                        e.exit_code()
                    }
                },
                Err(e) => {
                    error!(error = %e, "invalid configuration");
                    e.exit_code()
                }
            }
        }
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            e.exit_code()
        }
    };

    std::process::exit(exit_code);
}
