//! Telemetry: logging, rolling metrics and the persisted day history.
//!
//! The day-history CSV is the only contract between the live core and the
//! meta-supervisor (and offline backtesters): one row per asset per UTC day.

pub mod error;
pub mod history;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use history::{DayRecord, MetricsHistory};
pub use logging::{init_logging, init_logging_with, LogFormat};
pub use metrics::{FillRateTracker, MetricsTracker};
