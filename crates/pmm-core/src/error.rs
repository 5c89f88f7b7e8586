//! Core error types.

use thiserror::Error;

/// Errors from core domain types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid asset metadata: {0}")]
    InvalidMeta(String),

    #[error("invalid parameter: {0}")]
    InvalidParam(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
