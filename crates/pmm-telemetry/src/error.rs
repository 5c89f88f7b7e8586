//! Telemetry errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed history row: {0}")]
    Malformed(String),

    #[error("logging init: {0}")]
    Init(String),
}

pub type TelemetryResult<T> = std::result::Result<T, TelemetryError>;
