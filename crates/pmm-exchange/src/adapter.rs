//! The exchange adapter trait.

use crate::error::VenueResult;
use crate::types::{ModifyRequest, OpenOrder, PlaceOrderRequest};
use async_trait::async_trait;
use pmm_core::{AssetMeta, OrderBook, Price, Size, TradeEvent};
use rust_decimal::Decimal;

/// Venue operations consumed by the strategy loop and order manager.
///
/// All operations are asynchronous and cancellable; implementations must
/// bound every call with a timeout (<= 5 s) and map failures into
/// `VenueError` rather than panicking.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Current mid price.
    async fn mid_price(&self, symbol: &str) -> VenueResult<Price>;

    /// L2 book snapshot, top `depth` levels per side.
    async fn order_book(&self, symbol: &str, depth: usize) -> VenueResult<OrderBook>;

    /// Public trades since the given timestamp.
    async fn recent_trades(&self, symbol: &str, since_ms: u64) -> VenueResult<Vec<TradeEvent>>;

    /// Submit one order. Returns the venue order id.
    async fn place_order(&self, request: &PlaceOrderRequest) -> VenueResult<u64>;

    /// Batched in-place modifications (venue batch size >= 20). Each entry
    /// resolves independently.
    async fn modify_orders(&self, requests: &[ModifyRequest]) -> VenueResult<Vec<VenueResult<()>>>;

    /// Cancel specific orders.
    async fn cancel_orders(&self, symbol: &str, exchange_ids: &[u64]) -> VenueResult<()>;

    /// Cancel everything resting for the symbol. Returns how many went.
    async fn cancel_all(&self, symbol: &str) -> VenueResult<usize>;

    /// Orders currently resting for the symbol.
    async fn open_orders(&self, symbol: &str) -> VenueResult<Vec<OpenOrder>>;

    /// Signed net position in contracts.
    async fn position(&self, symbol: &str) -> VenueResult<Size>;

    /// Withdrawable margin in USD.
    async fn available_margin(&self) -> VenueResult<Decimal>;

    /// Arm (or re-arm) the venue-side auto-cancel.
    async fn arm_dead_mans_switch(&self, timeout_ms: u64) -> VenueResult<()>;

    /// Universe metadata: precision and fees per asset.
    async fn metadata(&self) -> VenueResult<Vec<AssetMeta>>;
}
