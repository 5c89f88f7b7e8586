//! Risk supervision.
//!
//! The supervisor gates every quoting tick: position limits mask one side,
//! loss and error budgets trip a circuit breaker that cancels everything and
//! sleeps. The bot prioritises stopping over trading when in doubt.

pub mod error;
pub mod supervisor;

pub use error::{RiskError, RiskResult};
pub use supervisor::{BreakReason, RiskLimits, RiskState, RiskSupervisor};
