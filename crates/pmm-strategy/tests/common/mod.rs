//! In-memory mock exchange for integration tests.

// Each test binary uses a different subset of the helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use pmm_core::{AssetMeta, BookLevel, OrderBook, Price, Size, TradeEvent};
use pmm_exchange::{
    ExchangeAdapter, ModifyRequest, OpenOrder, PlaceOrderRequest, VenueError, VenueResult,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Default)]
pub struct MockState {
    pub book: OrderBook,
    pub open: Vec<OpenOrder>,
    pub position: Size,
    pub margin: Decimal,
    pub next_id: u64,
    pub placed: Vec<PlaceOrderRequest>,
    pub modified: Vec<ModifyRequest>,
    pub cancelled: Vec<u64>,
    pub dms_armed: Vec<u64>,
    /// Error injected into the next place_order call.
    pub fail_next_place: Option<VenueError>,
}

pub struct MockExchange {
    pub state: Mutex<MockState>,
}

impl MockExchange {
    pub fn new() -> Self {
        let mut state = MockState {
            margin: dec!(1000000),
            next_id: 1,
            ..MockState::default()
        };
        state.book = make_book(dec!(99.99), dec!(100.01));
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn set_book(&self, bid: Decimal, ask: Decimal) {
        self.state.lock().book = make_book(bid, ask);
    }

    /// Simulate a full fill of a resting order: it leaves the book and the
    /// position moves by its remaining size.
    pub fn fill_order(&self, exchange_id: u64) {
        let mut state = self.state.lock();
        if let Some(pos) = state.open.iter().position(|o| o.exchange_id == exchange_id) {
            let order = state.open.remove(pos);
            let signed = Decimal::from(order.side.sign()) * order.remaining.inner();
            state.position = Size::new(state.position.inner() + signed);
        }
    }

    pub fn open_ids(&self) -> Vec<u64> {
        self.state.lock().open.iter().map(|o| o.exchange_id).collect()
    }

    pub fn placed_count(&self) -> usize {
        self.state.lock().placed.len()
    }
}

pub fn make_book(bid: Decimal, ask: Decimal) -> OrderBook {
    OrderBook {
        bids: vec![BookLevel {
            price: Price::new(bid),
            size: Size::new(dec!(5)),
        }],
        asks: vec![BookLevel {
            price: Price::new(ask),
            size: Size::new(dec!(5)),
        }],
    }
}

pub fn test_meta() -> AssetMeta {
    AssetMeta::new("BTC", 2).unwrap()
}

#[async_trait]
impl ExchangeAdapter for MockExchange {
    async fn mid_price(&self, _symbol: &str) -> VenueResult<Price> {
        self.state
            .lock()
            .book
            .mid_price()
            .ok_or_else(VenueError::timeout)
    }

    async fn order_book(&self, _symbol: &str, _depth: usize) -> VenueResult<OrderBook> {
        Ok(self.state.lock().book.clone())
    }

    async fn recent_trades(&self, _symbol: &str, _since_ms: u64) -> VenueResult<Vec<TradeEvent>> {
        Ok(Vec::new())
    }

    async fn place_order(&self, request: &PlaceOrderRequest) -> VenueResult<u64> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_next_place.take() {
            return Err(error);
        }
        let id = state.next_id;
        state.next_id += 1;
        state.placed.push(request.clone());
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
                None => results.push(Err(VenueError::timeout())),
            }
            state.modified.push(request.clone());
        }
        Ok(results)
    }

    async fn cancel_orders(&self, _symbol: &str, exchange_ids: &[u64]) -> VenueResult<()> {
        let mut state = self.state.lock();
        state.open.retain(|o| !exchange_ids.contains(&o.exchange_id));
        state.cancelled.extend_from_slice(exchange_ids);
        Ok(())
    }

    async fn cancel_all(&self, _symbol: &str) -> VenueResult<usize> {
        let mut state = self.state.lock();
        let n = state.open.len();
        let ids: Vec<u64> = state.open.iter().map(|o| o.exchange_id).collect();
        state.cancelled.extend(ids);
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
        self.state.lock().dms_armed.push(timeout_ms);
        Ok(())
    }

    async fn metadata(&self) -> VenueResult<Vec<AssetMeta>> {
        Ok(vec![test_meta()])
    }
}
