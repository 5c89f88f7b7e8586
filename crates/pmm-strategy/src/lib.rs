//! Order lifecycle management and the per-asset strategy loop.
//!
//! `OrderManager` reconciles a desired quote against the live order set with
//! venue rounding, modification dedup, batching and snapshot-diff fill
//! detection. `StrategyLoop` ties estimators, pricing, risk, sizing and the
//! order manager into one cooperative task per asset, with hot-reload of
//! live parameters and allocator snapshots.

pub mod adaptive;
pub mod error;
pub mod order_manager;
pub mod reload;
pub mod strategy;

pub use adaptive::{AdaptiveConfig, AdaptiveOverlay};
pub use error::{StrategyError, StrategyResult};
pub use order_manager::{OrderManager, OrderManagerConfig, TickPlan, TickReport};
pub use reload::{LiveParamsFile, SnapshotPoller};
pub use strategy::{StrategyConfig, StrategyLoop};
