//! Access log middleware.
//!
//! Emits one `tracing` event per request once the rest of the chain has
//! finished. Successful requests log at `info`, failed ones at `warn`
//! with the error and the status it maps to.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use trellis_core::{Context, TrellisResult};

use super::request_id::REQUEST_ID_STATE_KEY;
use super::ConfigurableMiddleware;
use crate::middleware::{Middleware, Next};

/// Configuration for [`AccessLogMiddleware`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessLogConfig {
    /// Paths that are never logged, such as health probes.
    pub skip_paths: Vec<String>,
}

/// Structured access log.
#[derive(Debug, Clone, Default)]
pub struct AccessLogMiddleware {
    skip_paths: Vec<String>,
}

impl AccessLogMiddleware {
    /// Logs every request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Excludes `path` from the log.
    #[must_use]
    pub fn skip(mut self, path: impl Into<String>) -> Self {
        self.skip_paths.push(path.into());
        self
    }
}

impl Middleware for AccessLogMiddleware {
    fn name(&self) -> &'static str {
        "access_log"
    }

    fn handle(&self, ctx: &mut Context, next: Next<'_>) -> TrellisResult<()> {
        if self.skip_paths.iter().any(|p| p == ctx.path()) {
            return next.run(ctx);
        }

        let start = Instant::now();
        let result = next.run(ctx);
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        let request_id = ctx
            .state::<String>(REQUEST_ID_STATE_KEY)
            .map_or("", String::as_str);

        match &result {
            Ok(()) => tracing::info!(
                request_id,
                http.method = %ctx.method(),
                http.path = ctx.path(),
                http.status_code = ctx.status().as_u16(),
                duration_ms,
                "request completed"
            ),
            Err(err) => tracing::warn!(
                request_id,
                http.method = %ctx.method(),
                http.path = ctx.path(),
                http.status_code = err.status_code().as_u16(),
                duration_ms,
                error = %err,
                "request failed"
            ),
        }
        result
    }
}

impl ConfigurableMiddleware for AccessLogMiddleware {
    const SECTION: &'static str = "access_log";
    type Config = AccessLogConfig;

    fn from_config(config: Self::Config) -> TrellisResult<Self> {
        Ok(Self {
            skip_paths: config.skip_paths,
        })
    }
}
