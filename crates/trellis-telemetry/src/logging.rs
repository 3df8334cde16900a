//! Structured logging.
//!
//! # Example
//!
//! ```rust
//! use trellis_telemetry::LogConfig;
//!
//! let config: LogConfig = serde_json::from_str(r#"{"level": "trellis=debug,info"}"#).unwrap();
//! assert!(config.json_format);
//! assert_eq!(config.level, "trellis=debug,info");
//! ```

use serde::{Deserialize, Serialize};
use tracing::Span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Filter directives (e.g., "info", "trellis=debug,warn").
    ///
    /// `RUST_LOG`, when set, takes precedence.
    pub level: String,

    /// Whether to output JSON format.
    pub json_format: bool,

    /// Whether to include span events (new, close).
    pub span_events: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to include thread IDs.
    pub thread_ids: bool,

    /// Whether to include target (module path).
    pub include_target: bool,

    /// Service name attached to the startup event.
    pub service_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Human-readable output at `debug`.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            json_format: false,
            span_events: true,
            file_line_info: true,
            thread_ids: false,
            include_target: true,
            service_name: "trellis".to_string(),
        }
    }

    /// JSON lines at `info`.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            span_events: false,
            file_line_info: false,
            thread_ids: false,
            include_target: true,
            service_name: "trellis".to_string(),
        }
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let span_events = if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let layer = tracing_subscriber::fmt::layer()
            .with_span_events(span_events)
            .with_file(self.file_line_info)
            .with_line_number(self.file_line_info)
            .with_thread_ids(self.thread_ids)
            .with_target(self.include_target);

        if self.json_format {
            layer.json().boxed()
        } else {
            layer.pretty().boxed()
        }
    }
}

/// Installs the global subscriber described by `config`.
///
/// Does nothing when `config.enabled` is false.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] for bad directives and
/// [`TelemetryError::LoggingInit`] if a global subscriber already exists.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => parse_filter(&directives)?,
        _ => parse_filter(&config.level)?,
    };

    tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(filter)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::info!(
        service.name = %config.service_name,
        json = config.json_format,
        "logging initialized"
    );
    Ok(())
}

/// Parses filter directives such as `"trellis=debug,warn"`.
pub fn parse_filter(directives: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(directives).map_err(|e| TelemetryError::InvalidFilter {
        filter: directives.to_string(),
        reason: e.to_string(),
    })
}

/// Creates the span wrapping one request's dispatch.
pub fn request_span(method: &str, path: &str) -> Span {
    tracing::info_span!(
        "request",
        http.method = method,
        http.path = path,
        http.status_code = tracing::field::Empty,
        route = tracing::field::Empty,
    )
}

/// Standard log fields for Trellis.
///
/// Use these field names for consistency across logs.
pub mod fields {
    /// Request ID field name.
    pub const REQUEST_ID: &str = "request_id";

    /// HTTP method field name.
    pub const HTTP_METHOD: &str = "http.method";

    /// HTTP path field name.
    pub const HTTP_PATH: &str = "http.path";

    /// HTTP status code field name.
    pub const HTTP_STATUS: &str = "http.status_code";

    /// Duration field name (in milliseconds).
    pub const DURATION_MS: &str = "duration_ms";

    /// Matched route pattern field name.
    pub const ROUTE: &str = "route";

    /// Plugin name field name.
    pub const PLUGIN: &str = "plugin";

    /// Error field name.
    pub const ERROR: &str = "error";

    /// Service name field name.
    pub const SERVICE_NAME: &str = "service.name";
}
