//! Paper venue: an in-memory random-walk exchange.
//!
//! Lets the full stack run end-to-end with no credentials and no network.
//! The mid follows a geometric random walk; resting post-only orders fill
//! when the walk crosses their price. Production deployments swap in a real
//! adapter implementing the same trait.

use async_trait::async_trait;
use parking_lot::Mutex;
use pmm_core::{AssetMeta, BookLevel, OrderBook, OrderSide, Price, Size, TradeEvent};
use pmm_exchange::{
    ExchangeAdapter, ModifyRequest, OpenOrder, PlaceOrderRequest, VenueError, VenueResult,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

struct PaperState {
    rng: StdRng,
    mid: f64,
    walk_vol: f64,
    open: Vec<OpenOrder>,
    position: Size,
    margin: Decimal,
    next_id: u64,
    dms_deadline_ms: Option<u64>,
}

/// Simulated venue for one or more assets.
pub struct PaperExchange {
    metas: Vec<AssetMeta>,
    state: Mutex<PaperState>,
}

impl PaperExchange {
    pub fn new(metas: Vec<AssetMeta>, start_price: f64, walk_vol_bps: f64, seed: u64) -> Self {
        Self {
            metas,
            state: Mutex::new(PaperState {
                rng: StdRng::seed_from_u64(seed),
                mid: start_price,
                walk_vol: walk_vol_bps / 10_000.0,
                open: Vec::new(),
                position: Size::ZERO,
                margin: dec!(100000),
                next_id: 1,
                dms_deadline_ms: None,
            }),
        }
    }

    /// Advance the walk one step and fill whatever the move crossed.
    fn step(state: &mut PaperState) {
        let shock: f64 = state.rng.gen_range(-1.0..1.0) * state.walk_vol;
        state.mid *= 1.0 + shock;

        let mid = Decimal::from_f64(state.mid).unwrap_or(Decimal::ONE);
        let mut filled = Vec::new();
        state.open.retain(|order| {
            let hit = match order.side {
                OrderSide::Buy => mid <= order.price.inner(),
                OrderSide::Sell => mid >= order.price.inner(),
            };
            if hit {
                filled.push((order.side, order.remaining));
                false
            } else {
                true
            }
        });
        for (side, size) in filled {
            let signed = Decimal::from(side.sign()) * size.inner();
            state.position = Size::new(state.position.inner() + signed);
            debug!(side = %side, size = %size, mid = state.mid, "paper fill");
        }
    }

    fn book(state: &PaperState) -> OrderBook {
        let mid = Decimal::from_f64(state.mid).unwrap_or(Decimal::ONE);
        let touch = mid * dec!(0.0001); // 1 bp half-touch
        let level = |price: Decimal| BookLevel {
            price: Price::new(price),
            size: Size::new(dec!(5)),
        };
        OrderBook {
            bids: (1..=3).map(|i| level(mid - touch * Decimal::from(i))).collect(),
            asks: (1..=3).map(|i| level(mid + touch * Decimal::from(i))).collect(),
        }
    }
}

#[async_trait]
impl ExchangeAdapter for PaperExchange {
    async fn mid_price(&self, _symbol: &str) -> VenueResult<Price> {
        let state = self.state.lock();
        Ok(Price::new(
            Decimal::from_f64(state.mid).unwrap_or(Decimal::ONE),
        ))
    }

    async fn order_book(&self, _symbol: &str, depth: usize) -> VenueResult<OrderBook> {
        let mut state = self.state.lock();
        Self::step(&mut state);
        let mut book = Self::book(&state);
        book.bids.truncate(depth);
        book.asks.truncate(depth);
        Ok(book)
    }

    async fn recent_trades(&self, _symbol: &str, _since_ms: u64) -> VenueResult<Vec<TradeEvent>> {
        Ok(Vec::new())
    }

    async fn place_order(&self, request: &PlaceOrderRequest) -> VenueResult<u64> {
        let mut state = self.state.lock();
        let book = Self::book(&state);
        // Post-only: reject anything that would cross the synthetic touch.
        let crosses = match request.side {
            OrderSide::Buy => book
                .asks
                .first()
                .is_some_and(|a| request.price >= a.price),
            OrderSide::Sell => book
                .bids
                .first()
                .is_some_and(|b| request.price <= b.price),
        };
        if request.post_only && crosses {
            return Err(VenueError::would_cross());
        }
        let id = state.next_id;
        state.next_id += 1;
        state.open.push(OpenOrder {
            exchange_id: id,
            client_id: Some(request.client_id.clone()),
            side: request.side,
            price: request.price,
            remaining: request.size,
            original: request.size,
        });
        Ok(id)
    }

    async fn modify_orders(&self, requests: &[ModifyRequest]) -> VenueResult<Vec<VenueResult<()>>> {
        let mut state = self.state.lock();
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let found = state
                .open
                .iter_mut()
                .find(|o| o.exchange_id == request.exchange_id);
            match found {
                Some(order) => {
                    order.price = request.new_price;
                    order.remaining = request.new_size;
                    order.original = request.new_size;
                    results.push(Ok(()));
                }
                None => results.push(Err(VenueError::Rejected {
                    reason: pmm_exchange::RejectReason::Other("unknown order".into()),
                })),
            }
        }
        Ok(results)
    }

    async fn cancel_orders(&self, _symbol: &str, exchange_ids: &[u64]) -> VenueResult<()> {
        let mut state = self.state.lock();
        state.open.retain(|o| !exchange_ids.contains(&o.exchange_id));
        Ok(())
    }

    async fn cancel_all(&self, _symbol: &str) -> VenueResult<usize> {
        let mut state = self.state.lock();
        let n = state.open.len();
        state.open.clear();
        Ok(n)
    }

    async fn open_orders(&self, _symbol: &str) -> VenueResult<Vec<OpenOrder>> {
        Ok(self.state.lock().open.clone())
    }

    async fn position(&self, _symbol: &str) -> VenueResult<Size> {
        Ok(self.state.lock().position)
    }

    async fn available_margin(&self) -> VenueResult<Decimal> {
        Ok(self.state.lock().margin)
    }

    async fn arm_dead_mans_switch(&self, timeout_ms: u64) -> VenueResult<()> {
        let mut state = self.state.lock();
        state.dms_deadline_ms = Some(timeout_ms);
        Ok(())
    }

    async fn metadata(&self) -> VenueResult<Vec<AssetMeta>> {
        Ok(self.metas.clone())
    }
}
