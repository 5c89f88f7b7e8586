//! Strategy crate errors.

use pmm_exchange::VenueError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrategyError {
    /// Fatal venue failure: the loop terminates, dead-man switch cleans up.
    #[error("venue error: {0}")]
    Venue(#[from] VenueError),

    #[error("core error: {0}")]
    Core(#[from] pmm_core::CoreError),

    #[error("risk halted: {0}")]
    RiskHalted(String),

    #[error("snapshot io: {0}")]
    SnapshotIo(#[from] std::io::Error),

    #[error("snapshot parse: {0}")]
    SnapshotParse(#[from] serde_json::Error),
}

pub type StrategyResult<T> = std::result::Result<T, StrategyError>;
