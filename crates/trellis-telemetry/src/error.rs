//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while setting up telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The global subscriber could not be installed, usually because one
    /// is already set.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// A filter directive could not be parsed.
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter {
        /// The rejected directive string
        filter: String,
        /// Parser message
        reason: String,
    },
}
