//! The per-asset strategy loop.
//!
//! One cooperative task per asset with a nominal 1 s period. Each tick:
//! read market data, update estimators, check hot-reload, price a quote,
//! gate it through risk, rescale by the dynamic sizer, reconcile orders,
//! pull fills into inventory and metrics, let the auto-tuner adjust, and
//! keep the dead-man switch armed.
//!
//! All pure computation is non-suspending; only adapter calls and timer
//! waits yield. Cross-asset state arrives exclusively through the allocator
//! snapshot.

use crate::adaptive::{AdaptiveConfig, AdaptiveOverlay};
use crate::error::{StrategyError, StrategyResult};
use crate::order_manager::{OrderManager, OrderManagerConfig};
use crate::reload::{LiveParamsFile, SnapshotPoller};
use pmm_core::{AssetMeta, OrderSide, Price, Size};
use pmm_exchange::{ExchangeAdapter, VenueError};
use pmm_mm::{
    compute_quote, AutoTuner, DynamicSizer, Inventory, Quote, QuoteInputs, QuoteParams,
    SizerConfig, SizerInputs, TunerConfig, VolRegime,
};
use pmm_risk::{BreakReason, RiskLimits, RiskState, RiskSupervisor};
use pmm_signals::{
    AtrTracker, BookImbalance, DirectionalConfig, DirectionalSignal, EwmaVolatility,
    ToxicityConfig, ToxicityDetector,
};
use pmm_supervisor::AllocatorState;
use pmm_telemetry::{FillRateTracker, MetricsHistory, MetricsTracker};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Per-asset strategy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub symbol: String,
    /// Capital the configured order sizes correspond to.
    pub capital_usd: Decimal,
    #[serde(default)]
    pub params: QuoteParams,
    #[serde(default)]
    pub limits: RiskLimits,
    /// Suppress quoting when the market spread cannot pay the fees.
    #[serde(default)]
    pub fee_aware: bool,
    /// Run the post-fill toxicity detector.
    #[serde(default = "default_true")]
    pub use_toxicity: bool,
    /// Run the 4-hour auto-tuner.
    #[serde(default)]
    pub auto_tune: bool,
    /// Reinvest PnL on top of the allocator base.
    #[serde(default)]
    pub compound: bool,
    /// Enable the adaptive regime/decay overlay.
    #[serde(default)]
    pub adaptive: bool,
    #[serde(default = "default_book_depth")]
    pub book_depth: usize,
    /// Suspend quoting after this long without fresh market data.
    #[serde(default = "default_staleness_ms")]
    pub staleness_ms: u64,
    /// Tick-over-tick move (%) that pauses quoting.
    #[serde(default = "default_large_move_pct")]
    pub large_move_pct: f64,
    #[serde(default = "default_large_move_pause_ms")]
    pub large_move_pause_ms: u64,
    /// Contracts of divergence tolerated between our inventory and the
    /// venue's position before a forced reconciliation.
    #[serde(default = "default_position_tolerance")]
    pub position_tolerance: Decimal,
    /// Hot-reload poll cadence in ticks.
    #[serde(default = "default_hot_reload_ticks")]
    pub hot_reload_ticks: u64,
    /// Venue-metadata refresh cadence in ticks.
    #[serde(default = "default_meta_refresh_ticks")]
    pub meta_refresh_ticks: u64,
    /// Terminate (exit code 4) instead of sleeping when the daily-loss
    /// breaker trips.
    #[serde(default)]
    pub exit_on_circuit_break: bool,
    /// Volatility EMA half-life in ticks.
    #[serde(default = "default_vol_half_life")]
    pub vol_half_life_ticks: f64,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_live_params_path")]
    pub live_params_path: PathBuf,
    #[serde(default = "default_allocations_path")]
    pub allocations_path: PathBuf,
    #[serde(default)]
    pub order_manager: OrderManagerConfig,
    #[serde(default)]
    pub sizer: SizerConfig,
    #[serde(default)]
    pub tuner: TunerConfig,
    #[serde(default)]
    pub toxicity: ToxicityConfig,
    #[serde(default)]
    pub directional: DirectionalConfig,
    #[serde(default)]
    pub adaptive_config: AdaptiveConfig,
}

fn default_true() -> bool {
    true
}
fn default_book_depth() -> usize {
    5
}
fn default_staleness_ms() -> u64 {
    10_000
}
fn default_large_move_pct() -> f64 {
    0.5
}
fn default_large_move_pause_ms() -> u64 {
    300_000
}
fn default_position_tolerance() -> Decimal {
    dec!(0.0001)
}
fn default_hot_reload_ticks() -> u64 {
    3600
}
fn default_meta_refresh_ticks() -> u64 {
    3600
}
fn default_vol_half_life() -> f64 {
    20.0
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data/metrics")
}
fn default_live_params_path() -> PathBuf {
    PathBuf::from("data/live_params.json")
}
fn default_allocations_path() -> PathBuf {
    PathBuf::from("data/allocations.json")
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            capital_usd: Decimal::from(1000),
            params: QuoteParams::default(),
            limits: RiskLimits::default(),
            fee_aware: false,
            use_toxicity: true,
            auto_tune: false,
            compound: false,
            adaptive: false,
            book_depth: default_book_depth(),
            staleness_ms: default_staleness_ms(),
            large_move_pct: default_large_move_pct(),
            large_move_pause_ms: default_large_move_pause_ms(),
            position_tolerance: default_position_tolerance(),
            hot_reload_ticks: default_hot_reload_ticks(),
            meta_refresh_ticks: default_meta_refresh_ticks(),
            exit_on_circuit_break: false,
            vol_half_life_ticks: default_vol_half_life(),
            data_dir: default_data_dir(),
            live_params_path: default_live_params_path(),
            allocations_path: default_allocations_path(),
            order_manager: OrderManagerConfig::default(),
            sizer: SizerConfig::default(),
            tuner: TunerConfig::default(),
            toxicity: ToxicityConfig::default(),
            directional: DirectionalConfig::default(),
            adaptive_config: AdaptiveConfig::default(),
        }
    }
}

/// The per-asset trading task.
pub struct StrategyLoop<A: ExchangeAdapter + ?Sized> {
    adapter: Arc<A>,
    config: StrategyConfig,
    params: QuoteParams,
    inventory: Inventory,
    orders: OrderManager,
    risk: RiskSupervisor,
    sizer: DynamicSizer,
    tuner: AutoTuner,
    vol: EwmaVolatility,
    atr: AtrTracker,
    imbalance: BookImbalance,
    signal: DirectionalSignal,
    toxicity: ToxicityDetector,
    fill_rate: FillRateTracker,
    metrics: MetricsTracker,
    history: MetricsHistory,
    adaptive: Option<AdaptiveOverlay>,
    live_params: SnapshotPoller,
    allocations: SnapshotPoller,

    // Allocator-controlled state.
    base_capital: Decimal,
    alloc_size_mult: Decimal,
    alloc_spread_mult: Decimal,

    tick_seq: u64,
    last_mid: Option<Decimal>,
    last_data_ms: u64,
    paused_until_ms: u64,
    stale_suspended: bool,
    day_pnl_baseline: Decimal,
}

impl<A: ExchangeAdapter + ?Sized> StrategyLoop<A> {
    pub fn new(adapter: Arc<A>, meta: AssetMeta, config: StrategyConfig, now_ms: u64) -> Self {
        let capital_f = config.capital_usd.to_f64().unwrap_or(0.0);
        let inventory = Inventory::new(&config.symbol, config.limits.max_position_usd);
        let orders = OrderManager::new(meta, config.order_manager.clone());
        let risk = RiskSupervisor::new(config.limits.clone(), config.capital_usd);
        let history = MetricsHistory::new(config.data_dir.clone());
        let mut metrics = MetricsTracker::new(capital_f, now_ms);
        // Carry the trailing day history across restarts so drawdown and
        // Sharpe figures do not reset with the process.
        if let Ok(records) = history.tail(&config.symbol, 30) {
            metrics.seed_history(records);
        }
        let adaptive = config
            .adaptive
            .then(|| AdaptiveOverlay::new(config.adaptive_config.clone()));

        Self {
            params: config.params.clone(),
            inventory,
            orders,
            risk,
            sizer: DynamicSizer::new(config.sizer.clone()),
            tuner: AutoTuner::new(config.tuner.clone(), config.params.clone(), now_ms),
            vol: EwmaVolatility::new(config.vol_half_life_ticks, 5),
            atr: AtrTracker::new(20),
            imbalance: BookImbalance::new(0.3, config.book_depth),
            signal: DirectionalSignal::new(config.directional.clone()),
            toxicity: ToxicityDetector::new(config.toxicity.clone()),
            fill_rate: FillRateTracker::new(100),
            metrics,
            history,
            adaptive,
            live_params: SnapshotPoller::new(config.live_params_path.clone()),
            allocations: SnapshotPoller::new(config.allocations_path.clone()),
            base_capital: config.capital_usd,
            alloc_size_mult: Decimal::ONE,
            alloc_spread_mult: Decimal::ONE,
            tick_seq: 0,
            last_mid: None,
            last_data_ms: 0,
            paused_until_ms: 0,
            stale_suspended: false,
            day_pnl_baseline: Decimal::ZERO,
            adapter,
            config,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn orders(&self) -> &OrderManager {
        &self.orders
    }

    pub fn params(&self) -> &QuoteParams {
        &self.params
    }

    /// Drive the loop until shutdown. Returns only on fatal error or a
    /// shutdown signal; both paths cancel everything first.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> StrategyResult<()> {
        let period = std::time::Duration::from_millis(self.params.quote_refresh_ms.max(100));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            symbol = %self.config.symbol,
            spread_bps = %self.params.base_spread_bps,
            size_usd = %self.params.order_size_usd,
            "strategy loop starting"
        );

        let result = loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now_ms = chrono::Utc::now().timestamp_millis() as u64;
                    match self.run_tick(now_ms).await {
                        Ok(()) => {}
                        Err(e) => break Err(e),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break Ok(());
                    }
                }
            }
        };

        self.shutdown().await;
        result
    }

    /// One quote cycle. Public so tests and the runner can drive the loop
    /// with a synthetic clock.
    pub async fn run_tick(&mut self, now_ms: u64) -> StrategyResult<()> {
        self.tick_seq += 1;

        // 3 (hoisted): hot-reload checks are cheap stats, run them on their
        // own cadence independent of market data health.
        if self.tick_seq == 1 || self.tick_seq % self.config.hot_reload_ticks == 0 {
            self.hot_reload(now_ms);
        }
        if self.config.meta_refresh_ticks > 0 && self.tick_seq % self.config.meta_refresh_ticks == 0
        {
            self.refresh_metadata(now_ms).await;
        }

        if now_ms < self.paused_until_ms {
            return Ok(());
        }

        // 1. Market data.
        let book = match self.adapter.order_book(&self.config.symbol, self.config.book_depth).await
        {
            Ok(book) => book,
            Err(e) => return self.absorb_error(e, now_ms).await,
        };
        let mid = match book.mid_price() {
            Some(mid) => mid,
            None => return self.note_bad_data(now_ms).await,
        };
        self.last_data_ms = now_ms;
        if self.stale_suspended {
            info!(symbol = %self.config.symbol, "market data recovered, resuming");
            self.stale_suspended = false;
        }

        let mid_f = mid.inner().to_f64().unwrap_or(0.0);

        // Large-move guard.
        if let Some(last) = self.last_mid {
            if !last.is_zero() {
                let move_pct = ((mid.inner() - last) / last * dec!(100)).abs();
                if move_pct > Decimal::from_f64(self.config.large_move_pct).unwrap_or(dec!(0.5)) {
                    warn!(symbol = %self.config.symbol, move_pct = %move_pct, "large move, pausing");
                    self.paused_until_ms = now_ms + self.config.large_move_pause_ms;
                    self.last_mid = Some(mid.inner());
                    let _ = self.orders.cancel_all(self.adapter.as_ref()).await;
                    return Ok(());
                }
            }
        }
        self.last_mid = Some(mid.inner());

        // 2. Estimators.
        let sigma_bps = self.vol.update(mid_f);
        let atr = self.atr.update(mid_f);
        let imbalance = self.imbalance.update(&book.bids, &book.asks);
        let trend = self.signal.update(mid_f);
        if self.config.use_toxicity {
            self.toxicity.on_tick(mid_f, atr, now_ms);
        }

        // Day roll: persist yesterday's record, reset daily state.
        if let Some(record) = self.metrics.maybe_roll_day(now_ms) {
            if let Err(e) = self.history.append(&self.config.symbol, &record) {
                warn!(symbol = %self.config.symbol, error = %e, "day record write failed");
            }
            self.inventory.reset_daily();
            self.day_pnl_baseline = self.inventory.realized_pnl() - self.inventory.total_fees();
        }

        let day_pnl = self.inventory.total_pnl(mid) - self.day_pnl_baseline;
        let position_usd = self.inventory.position_usd(mid);

        // 5. Risk gate.
        let gate = self.risk.evaluate(now_ms, day_pnl, position_usd);
        if let RiskState::CircuitBreak { until_ms, reason } = gate {
            if self.orders.num_live() > 0 {
                warn!(
                    symbol = %self.config.symbol,
                    %reason,
                    until_ms,
                    "circuit break: cancelling all orders"
                );
                let _ = self.orders.cancel_all(self.adapter.as_ref()).await;
            }
            if self.config.exit_on_circuit_break && reason == BreakReason::DailyLoss {
                return Err(StrategyError::RiskHalted(format!(
                    "{} daily loss limit, halted until {until_ms}",
                    self.config.symbol
                )));
            }
            return Ok(());
        }

        // 4. Quote.
        let tau = if self.config.use_toxicity {
            self.toxicity.tau()
        } else {
            0.0
        };
        let effective = self.effective_params();
        let inputs = QuoteInputs {
            mid,
            sigma_bps: Decimal::from_f64(sigma_bps).unwrap_or(Decimal::ZERO),
            position: self.inventory.position(),
            max_position_usd: self.risk.limits().max_position_usd,
            imbalance: Decimal::from_f64(imbalance).unwrap_or(Decimal::ZERO),
            signal: trend.sign(),
            toxicity: Decimal::from_f64(tau).unwrap_or(Decimal::ZERO),
            market_spread_bps: book.spread_bps(),
            fee_aware: self.config.fee_aware,
            maker_fee_bps: self.orders.meta().maker_fee_bps,
        };
        let mut quote = compute_quote(&inputs, &effective);

        // Adaptive overlay.
        if let Some(overlay) = self.adaptive.as_mut() {
            let sign = position_sign(self.inventory.position());
            overlay.on_tick(mid_f, sign);
            overlay.adjust(&mut quote, mid.inner());
        }

        // Risk masking.
        if let RiskState::PositionLimit { masked } = gate {
            match masked {
                OrderSide::Buy => quote.suppress_bid = true,
                OrderSide::Sell => quote.suppress_ask = true,
            }
        }

        // 6. Dynamic sizing + allocator capital scaling.
        let size_scale = self.size_scale(tau);
        for level in &mut quote.levels {
            level.bid_size = level.bid_size * size_scale;
            level.ask_size = level.ask_size * size_scale;
        }

        // 7. Reconcile.
        let margin = self.adapter.available_margin().await.ok();
        let plan = self.orders.plan_tick(
            &quote,
            self.tick_seq,
            margin,
            self.risk.limits().max_open_orders,
        );
        let quotes_standing = self.orders.num_live() + plan.places.len();
        let report = self
            .orders
            .execute_plan(self.adapter.as_ref(), plan, self.tick_seq, now_ms)
            .await;
        for error in &report.errors {
            self.risk.on_api_error(now_ms, error.budget_weight());
        }
        if let Some(fatal) = report.fatal {
            self.risk.force_break(now_ms, BreakReason::Fatal);
            return Err(StrategyError::Venue(fatal));
        }
        self.tuner.on_quotes((report.placed + report.modified) as u64);

        // 8. Fills and inventory.
        let fills = self.pull_fills(mid, now_ms).await?;
        self.fill_rate.record(fills as u64, quotes_standing.max(1) as u64);

        // 9. Metrics and tuning.
        let day_pnl_now = self.inventory.total_pnl(mid) - self.day_pnl_baseline;
        let quoted_spread = quote_spread_bps(&quote, mid);
        self.metrics.on_tick(
            day_pnl_now.to_f64().unwrap_or(0.0),
            self.inventory.inventory_ratio(mid).abs().to_f64().unwrap_or(0.0),
            quoted_spread,
            tau,
        );
        self.tuner
            .on_tick(self.inventory.inventory_ratio(mid).abs().to_f64().unwrap_or(0.0));
        if self.config.auto_tune {
            if let Some(next) = self.tuner.evaluate(now_ms) {
                info!(
                    symbol = %self.config.symbol,
                    spread_bps = %next.base_spread_bps,
                    skew = %next.inventory_skew_factor,
                    "auto-tuned parameters in force"
                );
                self.params = next;
            }
        }

        // 10. Dead-man switch.
        if let Err(e) = self
            .orders
            .maybe_arm_dead_man(self.adapter.as_ref(), now_ms)
            .await
        {
            self.risk.on_api_error(now_ms, e.budget_weight());
        }

        if self.tick_seq % 60 == 0 {
            self.log_status(mid, sigma_bps, tau);
        }

        Ok(())
    }

    /// Re-fetch venue metadata; a material change (precision, fees) resets
    /// outstanding quotes before the new grid is adopted.
    async fn refresh_metadata(&mut self, now_ms: u64) {
        let universe = match self.adapter.metadata().await {
            Ok(u) => u,
            Err(e) => {
                self.risk.on_api_error(now_ms, e.budget_weight());
                return;
            }
        };
        let Some(meta) = universe.into_iter().find(|m| m.symbol == self.config.symbol) else {
            warn!(symbol = %self.config.symbol, "asset missing from venue universe");
            return;
        };
        if self.orders.meta().has_material_change(&meta) {
            warn!(
                symbol = %self.config.symbol,
                size_decimals = meta.size_decimals,
                maker_fee_bps = %meta.maker_fee_bps,
                "asset metadata changed, resetting quotes"
            );
            let _ = self.orders.cancel_all(self.adapter.as_ref()).await;
            self.orders.set_meta(meta);
        }
    }

    /// Poll the hot-reload inputs and swap state atomically on change.
    fn hot_reload(&mut self, _now_ms: u64) {
        if self.live_params.changed() {
            match LiveParamsFile::load(self.live_params.path()) {
                Ok(map) => {
                    if let Some(overrides) = map.get(&self.config.symbol) {
                        let next = overrides.apply(&self.config.params);
                        if next.validate().is_ok() {
                            info!(
                                symbol = %self.config.symbol,
                                old_spread = %self.params.base_spread_bps,
                                new_spread = %next.base_spread_bps,
                                old_size = %self.params.order_size_usd,
                                new_size = %next.order_size_usd,
                                "hot-reloaded live params"
                            );
                            self.params = next.clone();
                            self.tuner.rebase(next);
                        } else {
                            warn!(symbol = %self.config.symbol, "rejected invalid live params");
                        }
                    }
                }
                Err(e) => warn!(symbol = %self.config.symbol, error = %e, "live params load failed"),
            }
        }

        if self.allocations.changed() {
            match AllocatorState::load(self.allocations.path()) {
                Ok(state) => {
                    if let Some(alloc) = state.assets.get(&self.config.symbol) {
                        self.base_capital =
                            Decimal::from_f64(alloc.base_capital).unwrap_or(self.config.capital_usd);
                        self.alloc_size_mult =
                            Decimal::from_f64(alloc.multipliers.size).unwrap_or(Decimal::ONE);
                        self.alloc_spread_mult =
                            Decimal::from_f64(alloc.multipliers.spread).unwrap_or(Decimal::ONE);
                        let max_pos = self.config.limits.max_position_usd
                            * Decimal::from_f64(alloc.multipliers.max_position)
                                .unwrap_or(Decimal::ONE);
                        self.risk.set_max_position_usd(max_pos);
                        self.inventory.set_max_position_usd(max_pos);
                        self.risk.set_capital(self.base_capital);
                        self.metrics
                            .set_capital(alloc.base_capital.max(f64::MIN_POSITIVE));
                        info!(
                            symbol = %self.config.symbol,
                            base_capital = alloc.base_capital,
                            size_mult = alloc.multipliers.size,
                            spread_mult = alloc.multipliers.spread,
                            "allocator snapshot applied"
                        );
                    }
                }
                Err(e) => warn!(symbol = %self.config.symbol, error = %e, "allocations load failed"),
            }
        }
    }

    /// Quote parameters with the allocator spread multiplier folded in.
    fn effective_params(&self) -> QuoteParams {
        let mut params = self.params.clone();
        params.base_spread_bps = (params.base_spread_bps * self.alloc_spread_mult)
            .max(params.min_spread_bps)
            .min(params.max_spread_bps);
        params
    }

    /// Combined size multiplier: dynamic sizer, allocator size multiplier,
    /// and active-capital scaling (compound assets trade base + banked PnL).
    fn size_scale(&self, tau: f64) -> Decimal {
        let regime = self
            .adaptive
            .as_ref()
            .map(|a| a.regime())
            .unwrap_or(VolRegime::Medium);
        let sizer_inputs = SizerInputs {
            vol_regime: regime,
            fill_rate: self.fill_rate.rate(),
            inventory_utilisation: self
                .inventory
                .inventory_ratio(Price::new(self.last_mid.unwrap_or(Decimal::ONE)))
                .abs()
                .to_f64()
                .unwrap_or(0.0),
            toxicity_ema: tau,
            drawdown_7d: self.metrics.drawdown_7d(),
        };
        let active = self.active_capital();
        let capital_scale = if self.config.capital_usd.is_zero() {
            Decimal::ONE
        } else {
            active / self.config.capital_usd
        };

        // The sizer applies its multiplier and the [min, max] USD clamp to
        // the per-side notional; fold the result back into a scale factor.
        let base_usd = self.params.order_size_usd * self.alloc_size_mult * capital_scale;
        let sized_usd = self.sizer.apply(base_usd, &sizer_inputs);
        if self.params.order_size_usd.is_zero() {
            Decimal::ONE
        } else {
            sized_usd / self.params.order_size_usd
        }
    }

    /// The capital this instance currently trades.
    fn active_capital(&self) -> Decimal {
        if self.config.compound {
            // Base is a floor; banked PnL compounds on top.
            let banked = self.inventory.net_pnl().max(Decimal::ZERO);
            self.base_capital + banked
        } else {
            self.base_capital
        }
    }

    /// Pull fills via snapshot diff, reconcile position drift, and feed
    /// inventory, toxicity, metrics and the tuner. Returns the fill count.
    async fn pull_fills(&mut self, mid: Price, now_ms: u64) -> StrategyResult<usize> {
        let snapshot = match self.adapter.open_orders(&self.config.symbol).await {
            Ok(s) => s,
            Err(e) => {
                self.absorb_error(e, now_ms).await?;
                return Ok(0);
            }
        };
        let venue_position = match self.adapter.position(&self.config.symbol).await {
            Ok(p) => p,
            Err(e) => {
                self.absorb_error(e, now_ms).await?;
                return Ok(0);
            }
        };

        let fills = self.orders.detect_fills(&snapshot, venue_position, now_ms);
        let mid_f = mid.inner().to_f64().unwrap_or(0.0);
        for fill in &fills {
            let (realized, event) =
                self.inventory
                    .record_fill(fill.side, fill.price, fill.size, fill.fee, now_ms);
            if self.config.use_toxicity {
                self.toxicity
                    .on_fill(event.side, event.price.inner().to_f64().unwrap_or(mid_f), now_ms);
            }
            let captured_bps = event
                .price
                .bps_from(mid)
                .map(|b| b.abs().to_f64().unwrap_or(0.0));
            self.metrics.on_fill(
                event.side == OrderSide::Buy,
                realized.to_f64().unwrap_or(0.0),
                event.fee.to_f64().unwrap_or(0.0),
                captured_bps,
            );
            self.tuner.on_fill(realized.to_f64().unwrap_or(0.0));
            info!(
                symbol = %self.config.symbol,
                side = %event.side,
                price = %event.price,
                size = %event.size,
                realized = %realized,
                position = %self.inventory.position(),
                net_pnl = %self.inventory.net_pnl(),
                "fill"
            );
        }

        // Position drift check: never silently trust either side.
        let drift = (venue_position - self.inventory.position()).inner().abs();
        if drift > self.config.position_tolerance {
            warn!(
                symbol = %self.config.symbol,
                ours = %self.inventory.position(),
                venue = %venue_position,
                "position mismatch, reconciling against the venue"
            );
            let _ = self.orders.cancel_all(self.adapter.as_ref()).await;
            self.orders.clear_local_state();
            self.inventory.force_position(venue_position, mid);
        }

        Ok(fills.len())
    }

    /// Classify and absorb a venue error; fatal errors escalate.
    async fn absorb_error(&mut self, error: VenueError, now_ms: u64) -> StrategyResult<()> {
        if error.is_fatal() {
            self.risk.force_break(now_ms, BreakReason::Fatal);
            return Err(StrategyError::Venue(error));
        }
        debug!(symbol = %self.config.symbol, %error, "transient venue error");
        self.risk.on_api_error(now_ms, error.budget_weight());
        self.check_staleness(now_ms).await;
        Ok(())
    }

    /// Bad or missing market data: count toward staleness.
    async fn note_bad_data(&mut self, now_ms: u64) -> StrategyResult<()> {
        self.check_staleness(now_ms).await;
        Ok(())
    }

    async fn check_staleness(&mut self, now_ms: u64) {
        if self.stale_suspended || self.last_data_ms == 0 {
            return;
        }
        if now_ms.saturating_sub(self.last_data_ms) > self.config.staleness_ms {
            warn!(
                symbol = %self.config.symbol,
                since_ms = self.last_data_ms,
                "market data stale, suspending quoting"
            );
            self.stale_suspended = true;
            let _ = self.orders.cancel_all(self.adapter.as_ref()).await;
        }
    }

    async fn shutdown(&mut self) {
        info!(symbol = %self.config.symbol, "strategy loop shutting down");
        let _ = self.orders.cancel_all(self.adapter.as_ref()).await;
        let (buys, sells) = self.inventory.fill_counts();
        info!(
            symbol = %self.config.symbol,
            ticks = self.tick_seq,
            fills_buy = buys,
            fills_sell = sells,
            round_trips = self.inventory.round_trips(),
            volume_usd = %self.inventory.volume_usd(),
            realized = %self.inventory.realized_pnl(),
            fees = %self.inventory.total_fees(),
            net_pnl = %self.inventory.net_pnl(),
            position = %self.inventory.position(),
            "session summary"
        );
    }

    fn log_status(&self, mid: Price, sigma_bps: f64, tau: f64) {
        info!(
            symbol = %self.config.symbol,
            mid = %mid,
            sigma_bps = format!("{sigma_bps:.2}"),
            toxicity = format!("{tau:.3}"),
            position = %self.inventory.position(),
            position_usd = %self.inventory.position_usd(mid).round_dp(2),
            net_pnl = %self.inventory.net_pnl().round_dp(4),
            live_orders = self.orders.num_live(),
            fill_rate = format!("{:.1}%", self.fill_rate.rate() * 100.0),
            "status"
        );
    }
}

fn position_sign(position: Size) -> i8 {
    if position.inner().is_zero() {
        0
    } else if position.inner().is_sign_positive() {
        1
    } else {
        -1
    }
}

/// Top-of-book quoted spread in bps, when both sides are live.
fn quote_spread_bps(quote: &Quote, mid: Price) -> Option<f64> {
    if quote.suppress_bid || quote.suppress_ask || quote.levels.is_empty() || mid.is_zero() {
        return None;
    }
    let l0 = &quote.levels[0];
    let spread = l0.ask_price.inner() - l0.bid_price.inner();
    (spread / mid.inner() * dec!(10000)).to_f64()
}
