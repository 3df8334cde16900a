//! Logging setup for Trellis.
//!
//! Trellis crates emit events through the `tracing` macros and never
//! install a subscriber themselves. Applications call [`init_logging`]
//! once at startup, usually with a [`LogConfig`] read from the `logging`
//! configuration section:
//!
//! ```rust,no_run
//! use trellis_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development()).unwrap();
//! tracing::info!(service = "orders", "starting");
//! ```
//!
//! Production output is one JSON object per line; development output is
//! the multi-line pretty format. Field names used across the workspace
//! live in [`fields`].

#![doc(html_root_url = "https://docs.rs/trellis-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{fields, init_logging, parse_filter, request_span, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
