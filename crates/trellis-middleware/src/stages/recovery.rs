//! Recovery middleware.
//!
//! Catches errors returned by the rest of the chain, and panics raised in
//! it, and turns them into a JSON error response:
//!
//! ```json
//! {"code": 500, "msg": "Internal Server Error", "data": null}
//! ```
//!
//! Client errors (4xx) keep their message. Server errors are reported
//! generically unless `show_details` is set, which also adds the error
//! kind under `data.type`.
//!
//! Install it first so it wraps every other stage.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use http::{header, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use trellis_core::{Context, TrellisError, TrellisResult};

use super::ConfigurableMiddleware;
use crate::middleware::{Middleware, Next};

/// Custom renderer invoked instead of the default JSON body.
pub type ErrorHook = Arc<dyn Fn(&mut Context, &TrellisError) + Send + Sync>;

/// Configuration for [`RecoveryMiddleware`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Include error messages of 5xx errors and the error kind in responses.
    pub show_details: bool,
    /// Log every recovered error.
    pub log_errors: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            show_details: false,
            log_errors: true,
        }
    }
}

/// Converts errors and panics into responses.
#[derive(Clone, Default)]
pub struct RecoveryMiddleware {
    config: RecoveryConfig,
    hook: Option<ErrorHook>,
}

impl RecoveryMiddleware {
    /// Creates a recovery stage with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recovery stage that reports error details.
    #[must_use]
    pub fn with_details() -> Self {
        Self {
            config: RecoveryConfig {
                show_details: true,
                ..RecoveryConfig::default()
            },
            hook: None,
        }
    }

    /// Replaces the default JSON rendering with `hook`.
    #[must_use]
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Context, &TrellisError) + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    fn recover(&self, ctx: &mut Context, err: &TrellisError) {
        let status = err.status_code();
        if self.config.log_errors {
            if status.is_server_error() {
                tracing::error!(
                    error = %err,
                    error.kind = err.kind(),
                    http.method = %ctx.method(),
                    http.path = ctx.path(),
                    "recovered from request failure"
                );
            } else {
                tracing::debug!(
                    error = %err,
                    http.status_code = status.as_u16(),
                    "request rejected"
                );
            }
        }

        match &self.hook {
            Some(hook) => hook(ctx, err),
            None => self.render(ctx, err),
        }
    }

    fn render(&self, ctx: &mut Context, err: &TrellisError) {
        let status = err.status_code();
        let msg = if status.is_server_error() && !self.config.show_details {
            status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string()
        } else {
            err.to_string()
        };
        let data = if self.config.show_details {
            json!({ "type": err.kind() })
        } else {
            serde_json::Value::Null
        };

        if let TrellisError::MethodNotAllowed { allowed, .. } = err {
            let list = allowed
                .iter()
                .map(http::Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            if let Ok(value) = HeaderValue::from_str(&list) {
                ctx.set_header(header::ALLOW, value);
            }
        }

        ctx.set_status(status);
        let body = json!({ "code": status.as_u16(), "msg": msg, "data": data });
        if ctx.json(&body).is_err() {
            // serde_json::Value always serializes
            ctx.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}

impl Middleware for RecoveryMiddleware {
    fn name(&self) -> &'static str {
        "recovery"
    }

    fn handle(&self, ctx: &mut Context, next: Next<'_>) -> TrellisResult<()> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| next.run(ctx)));
        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                self.recover(ctx, &err);
                Ok(())
            }
            Err(payload) => {
                let err = TrellisError::internal(format!(
                    "handler panicked: {}",
                    panic_message(payload.as_ref())
                ));
                self.recover(ctx, &err);
                Ok(())
            }
        }
    }
}

impl ConfigurableMiddleware for RecoveryMiddleware {
    const SECTION: &'static str = "recovery";
    type Config = RecoveryConfig;

    fn from_config(config: Self::Config) -> TrellisResult<Self> {
        Ok(Self { config, hook: None })
    }
}

impl fmt::Debug for RecoveryMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryMiddleware")
            .field("config", &self.config)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
