//! Wire-level request and response types.

use pmm_core::{ClientOrderId, OrderSide, Price, Size};
use serde::{Deserialize, Serialize};

/// A new order to submit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub price: Price,
    pub size: Size,
    /// Post-only (add-liquidity-only). Always true for passive quotes.
    pub post_only: bool,
    pub client_id: ClientOrderId,
}

/// A batched modification of a resting order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyRequest {
    pub exchange_id: u64,
    pub new_price: Price,
    pub new_size: Size,
}

/// A resting order as reported by the venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub exchange_id: u64,
    /// Client id if the venue echoes it.
    pub client_id: Option<ClientOrderId>,
    pub side: OrderSide,
    pub price: Price,
    /// Remaining (unfilled) size.
    pub remaining: Size,
    /// Size the order was placed with.
    pub original: Size,
}

impl OpenOrder {
    /// Filled quantity so far.
    pub fn filled(&self) -> Size {
        self.original - self.remaining
    }
}
