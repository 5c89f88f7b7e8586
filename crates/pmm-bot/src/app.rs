//! Application orchestration.
//!
//! Wires the shared adapter, one strategy task per enabled asset, the
//! dead-man heartbeat and the daily meta-supervisor onto one runtime.
//! Concurrency across assets is interleaving on the cooperative scheduler,
//! not parallelism; cross-asset coordination happens only through the
//! allocator snapshot file.

use crate::config::{AppConfig, Network};
use crate::error::{AppError, AppResult};
use crate::paper::PaperExchange;
use chrono::{Days, Utc};
use pmm_core::AssetMeta;
use pmm_exchange::ExchangeAdapter;
use pmm_strategy::StrategyLoop;
use pmm_supervisor::{MetaSupervisor, SupervisedAsset};
use pmm_telemetry::MetricsHistory;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Extra delay after UTC midnight before the supervisor pass, so every
/// loop has rolled and persisted its day bucket first.
const SUPERVISOR_OFFSET_SECS: i64 = 300;

/// Main application.
pub struct Application {
    config: AppConfig,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run until a shutdown signal or a fatal error.
    pub async fn run(self) -> AppResult<()> {
        let config = self.config;

        if config.network == Network::Mainnet {
            warn!("MAINNET selected");
        }

        // The venue adapter behind the trait object. The in-tree paper
        // venue drives dry runs; deployments substitute a live adapter.
        let metas: Vec<AssetMeta> = config
            .enabled_assets()
            .map(|a| AssetMeta::new(&a.symbol, 2))
            .collect::<Result<_, _>>()
            .map_err(|e| AppError::Config(e.to_string()))?;
        let adapter: Arc<dyn ExchangeAdapter> = Arc::new(PaperExchange::new(
            metas,
            config.paper.start_price,
            config.paper.walk_vol_bps,
            config.paper.seed,
        ));

        // Universe-validate every configured symbol.
        let universe = adapter.metadata().await?;
        let now_ms = Utc::now().timestamp_millis() as u64;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut tasks: JoinSet<Result<(), pmm_strategy::StrategyError>> = JoinSet::new();
        for asset in config.enabled_assets() {
            let meta = universe
                .iter()
                .find(|m| m.symbol == asset.symbol)
                .cloned()
                .ok_or_else(|| {
                    AppError::Config(format!("{} not in venue universe", asset.symbol))
                })?;
            info!(
                symbol = %asset.symbol,
                capital = %asset.capital_usd,
                spread_bps = %asset.params.base_spread_bps,
                size_usd = %asset.params.order_size_usd,
                compound = asset.compound,
                "asset configured"
            );
            let mut strategy = StrategyLoop::new(
                adapter.clone(),
                meta,
                config.strategy_config(asset),
                now_ms,
            );
            let rx = shutdown_rx.clone();
            tasks.spawn(async move { strategy.run(rx).await });
        }

        // Dead-man heartbeat: re-arm well inside the venue timeout so a
        // dead process flats itself venue-side.
        let heartbeat = {
            let adapter = adapter.clone();
            let mut rx = shutdown_rx.clone();
            let period = std::time::Duration::from_millis(config.heartbeat_ms);
            let timeout_ms = config.dms_timeout_ms;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            if let Err(e) = adapter.arm_dead_mans_switch(timeout_ms).await {
                                warn!(error = %e, "dead-man heartbeat failed");
                            }
                        }
                        _ = rx.changed() => break,
                    }
                }
            })
        };

        // Daily meta-supervisor.
        let supervisor_task = {
            let supervised: Vec<SupervisedAsset> = config
                .enabled_assets()
                .map(|a| SupervisedAsset {
                    symbol: a.symbol.clone(),
                    compound: a.compound,
                })
                .collect();
            let supervisor = MetaSupervisor::new(
                config.supervisor.clone(),
                MetricsHistory::new(config.data_dir.join("metrics")),
                supervised,
            );
            let mut rx = shutdown_rx.clone();
            tokio::spawn(async move {
                loop {
                    let wait = duration_to_next_run();
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {
                            let now_ms = Utc::now().timestamp_millis() as u64;
                            match supervisor.run_once(now_ms) {
                                Ok(state) => info!(assets = state.assets.len(), "supervisor pass complete"),
                                Err(e) => warn!(error = %e, "supervisor pass failed"),
                            }
                        }
                        _ = rx.changed() => break,
                    }
                }
            })
        };

        // Shutdown on SIGINT.
        {
            let shutdown_tx = shutdown_tx.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("shutdown signal received");
                    let _ = shutdown_tx.send(true);
                }
            });
        }

        // Wait for the strategy tasks; the first failure stops the fleet.
        let mut first_error: Option<AppError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "strategy loop terminated");
                    if first_error.is_none() {
                        first_error = Some(e.into());
                    }
                    let _ = shutdown_tx.send(true);
                }
                Err(join_error) => {
                    error!(error = %join_error, "strategy task panicked");
                    if first_error.is_none() {
                        first_error = Some(AppError::Strategy(join_error.to_string()));
                    }
                    let _ = shutdown_tx.send(true);
                }
            }
        }

        let _ = shutdown_tx.send(true);
        heartbeat.abort();
        supervisor_task.abort();

        info!("application stopped");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Time until the next supervisor run (UTC midnight + offset).
fn duration_to_next_run() -> std::time::Duration {
    let now = Utc::now();
    let next = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .expect("date overflow")
        .and_hms_opt(0, 0, 0)
        .expect("valid midnight")
        .and_utc()
        + chrono::Duration::seconds(SUPERVISOR_OFFSET_SECS);
    (next - now)
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(60))
}
