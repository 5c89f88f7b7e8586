//! End-to-end strategy-loop tests against the mock exchange.

mod common;

use common::{test_meta, MockExchange};
use pmm_core::OrderSide;
use pmm_mm::QuoteParams;
use pmm_risk::RiskLimits;
use pmm_strategy::{StrategyConfig, StrategyLoop};
use rust_decimal_macros::dec;
use std::path::PathBuf;
use std::sync::Arc;

const TICK_MS: u64 = 1_000;

fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pmm-loop-{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn test_config(tag: &str) -> StrategyConfig {
    let dir = temp_dir(tag);
    StrategyConfig {
        symbol: "BTC".to_string(),
        capital_usd: dec!(10000),
        params: QuoteParams {
            base_spread_bps: dec!(2),
            vol_multiplier: dec!(1.5),
            inventory_skew_factor: dec!(0.3),
            order_size_usd: dec!(150),
            num_levels: 2,
            level_spacing_bps: dec!(1),
            min_spread_bps: dec!(0.5),
            max_spread_bps: dec!(20),
            ..QuoteParams::default()
        },
        limits: RiskLimits {
            max_position_usd: dec!(500),
            ..RiskLimits::default()
        },
        // Synthetic books jump around; keep the guard out of the way unless
        // a test wants it.
        large_move_pct: 1e9,
        data_dir: dir.join("metrics"),
        live_params_path: dir.join("live_params.json"),
        allocations_path: dir.join("allocations.json"),
        ..StrategyConfig::default()
    }
}

fn make_loop(tag: &str) -> (Arc<MockExchange>, StrategyLoop<MockExchange>) {
    let adapter = Arc::new(MockExchange::new());
    let config = test_config(tag);
    let looper = StrategyLoop::new(adapter.clone(), test_meta(), config, 0);
    (adapter, looper)
}

#[tokio::test]
async fn test_first_tick_places_two_sided_ladder() {
    let (adapter, mut looper) = make_loop("first-tick");
    looper.run_tick(TICK_MS).await.unwrap();

    // Two levels per side.
    assert_eq!(looper.orders().num_live(), 4);
    let state = adapter.state.lock();
    assert_eq!(state.placed.len(), 4);
    assert!(state.placed.iter().all(|p| p.post_only));
    let buys = state.placed.iter().filter(|p| p.side == OrderSide::Buy).count();
    assert_eq!(buys, 2);
    // Every price on the venue grid: bids below mid, asks above.
    for p in &state.placed {
        match p.side {
            OrderSide::Buy => assert!(p.price.inner() < dec!(100)),
            OrderSide::Sell => assert!(p.price.inner() > dec!(100)),
        }
    }
}

#[tokio::test]
async fn test_unchanged_book_is_a_no_op() {
    let (adapter, mut looper) = make_loop("no-op");
    looper.run_tick(TICK_MS).await.unwrap();
    let placed_after_first = adapter.placed_count();

    looper.run_tick(2 * TICK_MS).await.unwrap();

    // Nothing re-placed or modified: dedup held.
    assert_eq!(adapter.placed_count(), placed_after_first);
    assert!(adapter.state.lock().modified.is_empty());
}

#[tokio::test]
async fn test_price_move_modifies_in_place() {
    let (adapter, mut looper) = make_loop("modify");
    looper.run_tick(TICK_MS).await.unwrap();
    let placed_after_first = adapter.placed_count();

    // 30 bps move: all four quotes chase via batched modify.
    adapter.set_book(dec!(100.29), dec!(100.31));
    looper.run_tick(2 * TICK_MS).await.unwrap();

    let state = adapter.state.lock();
    assert_eq!(state.placed.len(), placed_after_first);
    assert_eq!(state.modified.len(), 4);
    assert!(state.cancelled.is_empty());
}

#[tokio::test]
async fn test_fill_reaches_inventory() {
    let (adapter, mut looper) = make_loop("fill");
    looper.run_tick(TICK_MS).await.unwrap();

    // Fill the tightest bid.
    let bid_id = {
        let state = adapter.state.lock();
        state
            .open
            .iter()
            .filter(|o| o.side == OrderSide::Buy)
            .max_by_key(|o| o.price)
            .unwrap()
            .exchange_id
    };
    adapter.fill_order(bid_id);

    looper.run_tick(2 * TICK_MS).await.unwrap();

    let position = looper.inventory().position().inner();
    assert!(position > dec!(0), "fill should create a long, got {position}");
    let (buys, sells) = looper.inventory().fill_counts();
    assert_eq!((buys, sells), (1, 0));
    // Venue and local position agree: no reconciliation kicked in.
    assert_eq!(adapter.state.lock().position.inner(), position);
}

#[tokio::test]
async fn test_daily_loss_circuit_break_cancels_and_sleeps() {
    let adapter = Arc::new(MockExchange::new());
    let mut config = test_config("breaker");
    // $100 capital, 5% daily loss limit: $5 of pain trips it.
    config.capital_usd = dec!(100);
    let mut looper = StrategyLoop::new(adapter.clone(), test_meta(), config, 0);

    looper.run_tick(TICK_MS).await.unwrap();
    let bid_id = {
        let state = adapter.state.lock();
        state
            .open
            .iter()
            .filter(|o| o.side == OrderSide::Buy)
            .max_by_key(|o| o.price)
            .unwrap()
            .exchange_id
    };
    adapter.fill_order(bid_id);
    looper.run_tick(2 * TICK_MS).await.unwrap();
    assert!(looper.inventory().position().inner() > dec!(0));

    // Mark the long badly under water.
    adapter.set_book(dec!(89.99), dec!(90.01));
    looper.run_tick(3 * TICK_MS).await.unwrap();

    // Everything cancelled and no re-quoting while broken.
    assert!(adapter.open_ids().is_empty());
    let placed_before = adapter.placed_count();
    looper.run_tick(4 * TICK_MS).await.unwrap();
    assert_eq!(adapter.placed_count(), placed_before);
}

#[tokio::test]
async fn test_position_limit_masks_loaded_side() {
    let adapter = Arc::new(MockExchange::new());
    let mut config = test_config("pos-limit");
    config.limits.max_position_usd = dec!(100);
    let mut looper = StrategyLoop::new(adapter.clone(), test_meta(), config, 0);

    // Hand the venue a position past the limit before the first quote.
    adapter.state.lock().position = pmm_core::Size::new(dec!(1.2)); // $120 at mid 100
    looper.run_tick(TICK_MS).await.unwrap();
    // First tick: position arrives via reconciliation.
    looper.run_tick(2 * TICK_MS).await.unwrap();

    // Only asks may rest: the bid side is masked while loaded.
    let state = adapter.state.lock();
    assert!(state.open.iter().all(|o| o.side == OrderSide::Sell));
}

#[tokio::test]
async fn test_dead_man_switch_armed_on_cadence() {
    let (adapter, mut looper) = make_loop("dms");
    looper.run_tick(20_000).await.unwrap();
    assert_eq!(adapter.state.lock().dms_armed.len(), 1);

    // Next tick is inside the re-arm window: no second arm.
    looper.run_tick(21_000).await.unwrap();
    assert_eq!(adapter.state.lock().dms_armed.len(), 1);

    looper.run_tick(36_000).await.unwrap();
    assert_eq!(adapter.state.lock().dms_armed.len(), 2);
}

#[tokio::test]
async fn test_hot_reload_swaps_params() {
    let adapter = Arc::new(MockExchange::new());
    let mut config = test_config("reload");
    config.hot_reload_ticks = 2;
    let live_params_path = config.live_params_path.clone();
    std::fs::create_dir_all(live_params_path.parent().unwrap()).unwrap();
    let mut looper = StrategyLoop::new(adapter.clone(), test_meta(), config, 0);

    looper.run_tick(TICK_MS).await.unwrap();
    assert_eq!(looper.params().base_spread_bps, dec!(2));

    std::fs::write(
        &live_params_path,
        r#"{"BTC": {"base_spread_bps": "4.0"}}"#,
    )
    .unwrap();

    // Next poll tick picks the change up atomically.
    looper.run_tick(2 * TICK_MS).await.unwrap();
    assert_eq!(looper.params().base_spread_bps, dec!(4.0));
}

#[tokio::test]
async fn test_position_mismatch_triggers_reconciliation() {
    let (adapter, mut looper) = make_loop("reconcile");
    looper.run_tick(TICK_MS).await.unwrap();
    assert!(looper.orders().num_live() > 0);

    // The venue suddenly reports a position we never saw fill.
    adapter.state.lock().position = pmm_core::Size::new(dec!(2));
    adapter.state.lock().open.clear();
    looper.run_tick(2 * TICK_MS).await.unwrap();

    // We adopted the venue's number and flushed local order state.
    assert_eq!(looper.inventory().position().inner(), dec!(2));
}
