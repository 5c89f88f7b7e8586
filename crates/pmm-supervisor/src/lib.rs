//! Meta-supervision: slow capital and risk allocation across assets.
//!
//! Runs daily. Scores each asset from its persisted day history, maps the
//! score to a risk zone (size/spread/max-position multipliers) and steers
//! base capital toward a softmax of the scores, rate-limited and
//! mean-reverted. Output is an immutable `AllocatorState` snapshot replaced
//! atomically on disk; strategy loops pick it up at their next hot-reload
//! check.

pub mod allocation;
pub mod error;
pub mod score;
pub mod snapshot;
pub mod supervisor;

pub use allocation::{allocate, AllocationConfig};
pub use error::{SupervisorError, SupervisorResult};
pub use score::{composite_score, window_metrics, RiskMultipliers, WindowMetrics, Zone};
pub use snapshot::{AllocatorState, AssetAllocation};
pub use supervisor::{MetaSupervisor, SupervisedAsset, SupervisorConfig};
