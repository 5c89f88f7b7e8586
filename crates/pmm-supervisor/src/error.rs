//! Supervisor errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("history error: {0}")]
    History(#[from] pmm_telemetry::TelemetryError),
}

pub type SupervisorResult<T> = std::result::Result<T, SupervisorError>;
