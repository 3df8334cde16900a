//! Error types for Trellis.
//!
//! [`TrellisError`] is the error type handlers, middleware and plugins
//! return. Every variant maps to an HTTP status through
//! [`TrellisError::status_code`], which the recovery middleware and the
//! dispatch boundary use when rendering a failure.

use std::fmt;

use http::{Method, StatusCode};
use thiserror::Error;
use trellis_router::RouteError;

/// Result type alias using [`TrellisError`].
pub type TrellisResult<T> = Result<T, TrellisError>;

/// Boxed error source carried by [`TrellisError::Internal`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Plugin lifecycle phase in which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginPhase {
    /// `config()`, run once at registration
    Config,
    /// `uninstall()`, run on removal or shutdown
    Uninstall,
}

impl fmt::Display for PluginPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => f.write_str("config"),
            Self::Uninstall => f.write_str("uninstall"),
        }
    }
}

/// Standard error type for Trellis.
///
/// # Example
///
/// ```
/// use trellis_core::{Context, TrellisError, TrellisResult};
/// use http::{Method, StatusCode};
///
/// fn show_user(ctx: &mut Context) -> TrellisResult<()> {
///     let id = ctx.param("id").ok_or_else(|| TrellisError::bad_request("missing id"))?;
///     ctx.text(format!("user {id}"));
///     Ok(())
/// }
///
/// let mut ctx = Context::new(Method::GET, "/users");
/// let err = show_user(&mut ctx).unwrap_err();
/// assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
/// ```
#[derive(Error, Debug)]
pub enum TrellisError {
    /// A route could not be registered.
    #[error("Route registration failed: {0}")]
    Route(#[from] RouteError),

    /// No route matches the request path.
    #[error("No route for {method} {path}")]
    NotFound {
        /// Request method
        method: Method,
        /// Request path
        path: String,
    },

    /// The path exists but not for the request method.
    #[error("Method {method} not allowed for {path}")]
    MethodNotAllowed {
        /// Request method
        method: Method,
        /// Request path
        path: String,
        /// Methods the path does accept
        allowed: Vec<Method>,
    },

    /// A failure with an explicit status, raised by a handler or middleware.
    #[error("{status}: {message}")]
    Http {
        /// Response status to use
        status: StatusCode,
        /// Human-readable error message
        message: String,
    },

    /// An internal failure.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message
        message: String,
        /// Underlying cause
        #[source]
        source: Option<BoxError>,
    },

    /// A plugin failed during one of its lifecycle phases.
    #[error("Plugin '{plugin}' failed during {phase}: {source}")]
    Plugin {
        /// Name of the plugin
        plugin: String,
        /// Phase that failed
        phase: PluginPhase,
        /// Underlying cause
        #[source]
        source: Box<TrellisError>,
    },

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other error raised by application code.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrellisError {
    /// Creates an error carrying an explicit status.
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Creates a 400 error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::http(StatusCode::BAD_REQUEST, message)
    }

    /// Creates a 401 error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::http(StatusCode::UNAUTHORIZED, message)
    }

    /// Creates a 403 error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::http(StatusCode::FORBIDDEN, message)
    }

    /// Creates an internal error without a source.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error wrapping `source`.
    pub fn internal_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Wraps `source` as a failure of `plugin` during `phase`.
    pub fn plugin(plugin: impl Into<String>, phase: PluginPhase, source: TrellisError) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            phase,
            source: Box::new(source),
        }
    }

    /// Returns the HTTP status this error renders as.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Http { status, .. } => *status,
            Self::Route(_)
            | Self::Internal { .. }
            | Self::Plugin { .. }
            | Self::Config(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a short machine-readable name for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Route(_) => "route",
            Self::NotFound { .. } => "not_found",
            Self::MethodNotAllowed { .. } => "method_not_allowed",
            Self::Http { .. } => "http",
            Self::Internal { .. } => "internal",
            Self::Plugin { .. } => "plugin",
            Self::Config(_) => "config",
            Self::Other(_) => "other",
        }
    }

    /// Returns true if the message is safe to show to clients.
    ///
    /// Only errors that describe the request itself qualify; anything
    /// internal is rendered generically outside development mode.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}
