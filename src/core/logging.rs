//! Logging abstraction
//!
//! Crate-wide logging macros backed by `tracing`:
//! - `log_info!`, `log_warn!`, `log_error!`, `log_debug!`, `log_trace!`
//!
//! Call [`init`] once at startup to install the subscriber. `RUST_LOG`
//! overrides the configured filter.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogSection;
use crate::error::RuntimeError;

/// Install the global subscriber with `default_filter` (e.g. `"info"`).
///
/// A second call returns [`RuntimeError::Logging`] instead of panicking.
pub fn init(default_filter: &str) -> Result<(), RuntimeError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|e| RuntimeError::Logging(e.to_string()))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_thread_names(true))
        .try_init()
        .map_err(|e| RuntimeError::Logging(e.to_string()))
}

/// Install the subscriber using the `[log]` section's filter.
pub fn init_from(config: &LogSection) -> Result<(), RuntimeError> {
    init(&config.filter)
}

/// Log info message
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::__tracing::info!($($arg)*)
    };
}

/// Log warning message
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::__tracing::warn!($($arg)*)
    };
}

/// Log error message
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::__tracing::error!($($arg)*)
    };
}

/// Log debug message
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::__tracing::debug!($($arg)*)
    };
}

/// Log trace message
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        $crate::__tracing::trace!($($arg)*)
    };
}
