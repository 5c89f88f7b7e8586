//! Streaming market-data estimators.
//!
//! Pure state machines over tick inputs, no I/O:
//! - `EwmaVolatility`: EMA of absolute log-returns, in basis points
//! - `AtrTracker`: rolling mean tick range, the toxicity normaliser
//! - `BookImbalance`: EMA of top-of-book volume imbalance in [-1, 1]
//! - `DirectionalSignal`: Kalman trend gated by QQE, with hysteresis
//! - `ToxicityDetector`: post-fill adverse-excursion scoring
//!
//! Estimator internals are `f64`; exact decimals only matter once values
//! re-enter quote pricing.

pub mod directional;
pub mod imbalance;
pub mod toxicity;
pub mod volatility;

pub use directional::{DirectionalConfig, DirectionalSignal, Trend};
pub use imbalance::BookImbalance;
pub use toxicity::{ToxicityConfig, ToxicityDetector};
pub use volatility::{AtrTracker, EwmaVolatility};
