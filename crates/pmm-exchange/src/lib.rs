//! Exchange adapter contract.
//!
//! The trading core never talks to a venue directly: it consumes the
//! `ExchangeAdapter` trait. Concrete adapters (REST/WebSocket clients,
//! credential handling, symbol mapping) live outside the core; tests use
//! mocks.
//!
//! Errors are a sum type, not unwinding: the strategy loop pattern-matches
//! on transient / rejected / fatal and recovers locally where it can.

pub mod adapter;
pub mod error;
pub mod types;

pub use adapter::ExchangeAdapter;
pub use error::{FatalKind, RejectReason, TransientKind, VenueError, VenueResult};
pub use types::{ModifyRequest, OpenOrder, PlaceOrderRequest};
