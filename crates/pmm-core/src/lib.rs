//! Core domain types for the perp market-making bot.
//!
//! This crate provides the fundamental types used throughout the system:
//! - `Price`, `Size`: precision-safe numeric types
//! - `AssetMeta`: per-asset precision and fee metadata with venue rounding
//! - `OrderSide`, `ClientOrderId`: trading enums and ids
//! - `OrderBook`, `TradeEvent`, `FillEvent`, `LiveOrder`: market/order data

pub mod book;
pub mod decimal;
pub mod error;
pub mod market;
pub mod order;

pub use book::{BookLevel, OrderBook, TradeEvent};
pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use market::{AssetMeta, MAX_PRICE_DECIMALS, PRICE_SIG_FIGS};
pub use order::{ClientOrderId, FillEvent, LiveOrder, OrderSide};
