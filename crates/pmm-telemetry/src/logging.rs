//! Logging initialisation.
//!
//! Interactive runs get pretty output; shipped deployments get one JSON
//! object per line for the log pipeline. The format is chosen explicitly
//! or falls back to the `RUST_ENV` convention.

use crate::error::{TelemetryError, TelemetryResult};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter applied when `RUST_LOG` is unset: quiet dependencies, debug for
/// the bot's own crates.
const DEFAULT_FILTER: &str = "info,pmm=debug";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, for interactive runs.
    #[default]
    Pretty,
    /// Line-delimited JSON, for production log shipping.
    Json,
}

impl LogFormat {
    /// Environment fallback: deployments set `RUST_ENV=production`.
    pub fn from_env() -> Self {
        match std::env::var("RUST_ENV").as_deref() {
            Ok("production") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Install the global tracing subscriber with an explicit format and
/// default filter (`RUST_LOG` still wins when set).
///
/// Fails if a subscriber is already installed rather than panicking, so a
/// second call surfaces as a configuration error.
pub fn init_logging_with(format: LogFormat, default_filter: &str) -> TelemetryResult<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_names(true),
            )
            .try_init(),
    };

    installed.map_err(|e| TelemetryError::Init(e.to_string()))
}

/// Install logging with the environment-selected format and the workspace
/// default filter.
pub fn init_logging() -> TelemetryResult<()> {
    init_logging_with(LogFormat::from_env(), DEFAULT_FILTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_env() {
        std::env::remove_var("RUST_ENV");
        assert_eq!(LogFormat::from_env(), LogFormat::Pretty);
        std::env::set_var("RUST_ENV", "production");
        assert_eq!(LogFormat::from_env(), LogFormat::Json);
        std::env::remove_var("RUST_ENV");
    }

    #[test]
    fn test_double_init_is_an_error_not_a_panic() {
        let first = init_logging_with(LogFormat::Pretty, "info");
        let second = init_logging_with(LogFormat::Pretty, "info");
        assert!(first.is_ok());
        assert!(matches!(second, Err(TelemetryError::Init(_))));
    }
}
