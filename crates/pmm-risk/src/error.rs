//! Risk crate errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("invalid risk limits: {0}")]
    InvalidLimits(String),
}

pub type RiskResult<T> = std::result::Result<T, RiskError>;
