//! Application errors with process exit codes.

use pmm_exchange::VenueError;
use pmm_strategy::StrategyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("venue error: {0}")]
    Venue(#[from] VenueError),

    #[error("risk halted: {0}")]
    RiskHalted(String),

    #[error("strategy error: {0}")]
    Strategy(String),
}

impl AppError {
    /// Process exit code: 0 normal, 2 misconfiguration, 3 unrecoverable
    /// venue error, 4 risk-halted shutdown.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Venue(_) => 3,
            Self::RiskHalted(_) => 4,
            Self::Strategy(_) => 1,
        }
    }
}

impl From<StrategyError> for AppError {
    fn from(e: StrategyError) -> Self {
        match e {
            StrategyError::Venue(v) => Self::Venue(v),
            StrategyError::RiskHalted(msg) => Self::RiskHalted(msg),
            other => Self::Strategy(other.to_string()),
        }
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
