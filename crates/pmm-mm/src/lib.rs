//! Market-making decision core.
//!
//! - `QuoteParams`: immutable quoting parameters, replaced atomically
//! - `QuoteEngine`: pure quote pricing from estimator outputs
//! - `Inventory`: net position, average entry, realised/unrealised PnL, fees
//! - `DynamicSizer`: per-tick order-size scaling from market conditions
//! - `AutoTuner`: slow closed-loop parameter adjustment

pub mod inventory;
pub mod params;
pub mod quote_engine;
pub mod sizer;
pub mod tuner;

pub use inventory::Inventory;
pub use params::QuoteParams;
pub use quote_engine::{compute_quote, Quote, QuoteInputs, QuoteLevel};
pub use sizer::{DynamicSizer, SizerConfig, SizerInputs, VolRegime};
pub use tuner::{AutoTuner, TunerConfig};
