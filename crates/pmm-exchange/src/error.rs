//! Venue error taxonomy.

use thiserror::Error;

/// Recoverable venue failures: retry next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    Timeout,
    ServerError,
    RateLimited,
}

/// Order rejections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Post-only order would have crossed the book. Benign: the ALO
    /// constraint did its job.
    WouldCross,
    /// Price or size off the venue grid.
    InvalidTickLot,
    /// Not enough margin for the requested size.
    InsufficientMargin,
    Other(String),
}

/// Unrecoverable failures: terminate the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalKind {
    Credentials,
    Permissions,
    Other(String),
}

/// Error sum type for all adapter operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VenueError {
    #[error("transient venue error: {kind:?}")]
    Transient { kind: TransientKind },

    #[error("order rejected: {reason:?}")]
    Rejected { reason: RejectReason },

    #[error("fatal venue error: {kind:?}")]
    Fatal { kind: FatalKind },
}

impl VenueError {
    pub fn timeout() -> Self {
        Self::Transient {
            kind: TransientKind::Timeout,
        }
    }

    pub fn would_cross() -> Self {
        Self::Rejected {
            reason: RejectReason::WouldCross,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }

    /// Weight against the API-error budget.
    ///
    /// Post-only crosses barely count; real failures count in full.
    pub fn budget_weight(&self) -> f64 {
        match self {
            Self::Transient { .. } => 1.0,
            Self::Rejected {
                reason: RejectReason::WouldCross,
            } => 0.2,
            Self::Rejected { .. } => 0.5,
            Self::Fatal { .. } => 1.0,
        }
    }
}

pub type VenueResult<T> = std::result::Result<T, VenueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_weights() {
        assert_eq!(VenueError::timeout().budget_weight(), 1.0);
        assert_eq!(VenueError::would_cross().budget_weight(), 0.2);
        assert_eq!(
            VenueError::Rejected {
                reason: RejectReason::InvalidTickLot
            }
            .budget_weight(),
            0.5
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(VenueError::Fatal {
            kind: FatalKind::Credentials
        }
        .is_fatal());
        assert!(!VenueError::timeout().is_fatal());
    }
}
