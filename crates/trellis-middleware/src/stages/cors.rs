//! CORS (Cross-Origin Resource Sharing) middleware.
//!
//! Answers preflight requests directly and adds CORS headers to actual
//! cross-origin requests.
//!
//! ## Preflight Requests
//!
//! An `OPTIONS` request carrying both `Origin` and
//! `Access-Control-Request-Method` is a preflight. For an allowed origin the
//! middleware replies `204 No Content` with the allow headers and never
//! calls the rest of the chain. A disallowed origin gets `403 Forbidden`.
//!
//! ## Actual Requests
//!
//! Requests with an allowed `Origin` receive `Access-Control-Allow-Origin`
//! (plus credentials and expose headers when configured) before the
//! chain continues, so the headers survive handler errors. Requests from
//! other origins pass through untouched; the browser enforces the block.

use http::{header, HeaderValue, Method, StatusCode};
use serde::{Deserialize, Serialize};
use trellis_core::{Context, TrellisError, TrellisResult};

use super::ConfigurableMiddleware;
use crate::middleware::{Middleware, Next};

/// CORS header names.
pub mod headers {
    /// `Access-Control-Allow-Origin` header.
    pub const ALLOW_ORIGIN: &str = "access-control-allow-origin";
    /// `Access-Control-Allow-Methods` header.
    pub const ALLOW_METHODS: &str = "access-control-allow-methods";
    /// `Access-Control-Allow-Headers` header.
    pub const ALLOW_HEADERS: &str = "access-control-allow-headers";
    /// `Access-Control-Allow-Credentials` header.
    pub const ALLOW_CREDENTIALS: &str = "access-control-allow-credentials";
    /// `Access-Control-Max-Age` header.
    pub const MAX_AGE: &str = "access-control-max-age";
    /// `Access-Control-Expose-Headers` header.
    pub const EXPOSE_HEADERS: &str = "access-control-expose-headers";
    /// `Access-Control-Request-Method` header (preflight).
    pub const REQUEST_METHOD: &str = "access-control-request-method";
    /// `Access-Control-Request-Headers` header (preflight).
    pub const REQUEST_HEADERS: &str = "access-control-request-headers";
}

/// Configuration for [`CorsMiddleware`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; `"*"` allows any.
    pub allow_origins: Vec<String>,
    /// Methods advertised to preflight requests.
    pub allow_methods: Vec<String>,
    /// Request headers advertised to preflight requests; `"*"` echoes
    /// whatever the browser asks for.
    pub allow_headers: Vec<String>,
    /// Response headers readable from scripts.
    pub expose_headers: Vec<String>,
    /// Allow cookies and authorization headers.
    pub allow_credentials: bool,
    /// Preflight cache duration in seconds; 0 omits the header.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: vec!["*".to_string()],
            allow_methods: ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"]
                .into_iter()
                .map(String::from)
                .collect(),
            allow_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
            expose_headers: Vec::new(),
            allow_credentials: false,
            max_age_secs: 86_400,
        }
    }
}

/// CORS middleware.
///
/// Install it before authentication so preflights, which carry no
/// credentials, are answered first.
///
/// ```
/// use trellis_middleware::stages::{CorsConfig, CorsMiddleware};
/// use trellis_middleware::ConfigurableMiddleware;
///
/// let cors = CorsMiddleware::from_config(CorsConfig {
///     allow_origins: vec!["https://app.example.com".into()],
///     allow_credentials: true,
///     ..CorsConfig::default()
/// })
/// .unwrap();
/// assert!(cors.is_origin_allowed("https://app.example.com"));
/// assert!(!cors.is_origin_allowed("https://evil.example.com"));
/// ```
#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    any_origin: bool,
    origins: Vec<String>,
    allow_methods: HeaderValue,
    allow_headers: Option<HeaderValue>,
    echo_request_headers: bool,
    expose_headers: Option<HeaderValue>,
    allow_credentials: bool,
    max_age: Option<HeaderValue>,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self::permissive()
    }
}

impl CorsMiddleware {
    /// Allows any origin with the default methods and headers.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            any_origin: true,
            origins: Vec::new(),
            allow_methods: HeaderValue::from_static("GET, POST, PUT, DELETE, PATCH, OPTIONS"),
            allow_headers: Some(HeaderValue::from_static("Content-Type, Authorization")),
            echo_request_headers: false,
            expose_headers: None,
            allow_credentials: false,
            max_age: Some(HeaderValue::from(86_400_u64)),
        }
    }

    /// Returns true if `origin` may make cross-origin requests.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.any_origin || self.origins.iter().any(|o| o == origin)
    }

    fn allow_origin_value(&self, origin: &str) -> Option<HeaderValue> {
        // A literal "*" is invalid together with credentials
        if self.any_origin && !self.allow_credentials {
            Some(HeaderValue::from_static("*"))
        } else {
            HeaderValue::from_str(origin).ok()
        }
    }

    fn apply_origin(&self, ctx: &mut Context, origin: &str) {
        if let Some(value) = self.allow_origin_value(origin) {
            let echoed = value != "*";
            ctx.set_header(headers::ALLOW_ORIGIN, value);
            if echoed {
                ctx.append_header(header::VARY, HeaderValue::from_static("Origin"));
            }
        }
        if self.allow_credentials {
            ctx.set_header(headers::ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
    }

    fn preflight(&self, ctx: &mut Context, origin: &str) {
        if !self.is_origin_allowed(origin) {
            tracing::debug!(origin, "CORS preflight from disallowed origin");
            ctx.set_status(StatusCode::FORBIDDEN);
            return;
        }

        self.apply_origin(ctx, origin);
        ctx.set_header(headers::ALLOW_METHODS, self.allow_methods.clone());

        let requested = if self.echo_request_headers {
            ctx.header(headers::REQUEST_HEADERS)
                .and_then(|v| HeaderValue::from_str(v).ok())
        } else {
            None
        };
        if let Some(value) = requested.or_else(|| self.allow_headers.clone()) {
            ctx.set_header(headers::ALLOW_HEADERS, value);
        }
        if let Some(max_age) = &self.max_age {
            ctx.set_header(headers::MAX_AGE, max_age.clone());
        }
        ctx.set_status(StatusCode::NO_CONTENT);
        ctx.set_body(bytes::Bytes::new());
    }
}

impl Middleware for CorsMiddleware {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn handle(&self, ctx: &mut Context, next: Next<'_>) -> TrellisResult<()> {
        let Some(origin) = ctx.header(header::ORIGIN.as_str()).map(str::to_string) else {
            return next.run(ctx);
        };

        let is_preflight =
            *ctx.method() == Method::OPTIONS && ctx.header(headers::REQUEST_METHOD).is_some();
        if is_preflight {
            self.preflight(ctx, &origin);
            return Ok(());
        }

        if self.is_origin_allowed(&origin) {
            self.apply_origin(ctx, &origin);
            if let Some(expose) = &self.expose_headers {
                ctx.set_header(headers::EXPOSE_HEADERS, expose.clone());
            }
        }
        next.run(ctx)
    }
}

impl ConfigurableMiddleware for CorsMiddleware {
    const SECTION: &'static str = "cors";
    type Config = CorsConfig;

    fn from_config(config: Self::Config) -> TrellisResult<Self> {
        let any_origin = config.allow_origins.iter().any(|o| o == "*");
        let echo_request_headers = config.allow_headers.iter().any(|h| h == "*");

        let allow_methods = join_value("allow_methods", &config.allow_methods)?
            .ok_or_else(|| TrellisError::config("cors.allow_methods must not be empty"))?;
        let allow_headers = if echo_request_headers {
            None
        } else {
            join_value("allow_headers", &config.allow_headers)?
        };

        Ok(Self {
            any_origin,
            origins: config.allow_origins,
            allow_methods,
            allow_headers,
            echo_request_headers,
            expose_headers: join_value("expose_headers", &config.expose_headers)?,
            allow_credentials: config.allow_credentials,
            max_age: (config.max_age_secs > 0).then(|| HeaderValue::from(config.max_age_secs)),
        })
    }
}

fn join_value(field: &str, items: &[String]) -> TrellisResult<Option<HeaderValue>> {
    if items.is_empty() {
        return Ok(None);
    }
    HeaderValue::from_str(&items.join(", "))
        .map(Some)
        .map_err(|_| TrellisError::config(format!("cors.{field}: invalid header value")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoxedMiddleware;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use trellis_core::handler;

    fn run(mw: CorsMiddleware, ctx: &mut Context) -> bool {
        let reached = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&reached);
        let stages: Vec<BoxedMiddleware> = vec![Arc::new(mw)];
        let h = handler(move |ctx| {
            flag.store(true, Ordering::SeqCst);
            ctx.text("ok");
            Ok(())
        });
        Next::new(&stages, h.as_ref()).run(ctx).unwrap();
        reached.load(Ordering::SeqCst)
    }

    fn restricted() -> CorsMiddleware {
        CorsMiddleware::from_config(CorsConfig {
            allow_origins: vec!["https://app.example.com".into()],
            expose_headers: vec!["X-Request-Id".into()],
            allow_credentials: true,
            ..CorsConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_preflight_short_circuits() {
        let mut ctx = Context::new(Method::OPTIONS, "/api")
            .with_header("origin", "https://any.example.com")
            .with_header("access-control-request-method", "PUT");
        let reached = run(CorsMiddleware::permissive(), &mut ctx);

        assert!(!reached);
        assert_eq!(ctx.status(), StatusCode::NO_CONTENT);
        assert_eq!(ctx.response_header(headers::ALLOW_ORIGIN), Some("*"));
        assert_eq!(
            ctx.response_header(headers::ALLOW_METHODS),
            Some("GET, POST, PUT, DELETE, PATCH, OPTIONS")
        );
        assert_eq!(ctx.response_header(headers::MAX_AGE), Some("86400"));
    }

    #[test]
    fn test_preflight_from_disallowed_origin() {
        let mut ctx = Context::new(Method::OPTIONS, "/api")
            .with_header("origin", "https://evil.example.com")
            .with_header("access-control-request-method", "GET");
        assert!(!run(restricted(), &mut ctx));
        assert_eq!(ctx.status(), StatusCode::FORBIDDEN);
        assert!(ctx.response_header(headers::ALLOW_ORIGIN).is_none());
    }

    #[test]
    fn test_actual_request_gets_echoed_origin() {
        let mut ctx = Context::new(Method::GET, "/api").with_header("origin", "https://app.example.com");
        assert!(run(restricted(), &mut ctx));
        assert_eq!(
            ctx.response_header(headers::ALLOW_ORIGIN),
            Some("https://app.example.com")
        );
        assert_eq!(ctx.response_header(headers::ALLOW_CREDENTIALS), Some("true"));
        assert_eq!(ctx.response_header(headers::EXPOSE_HEADERS), Some("X-Request-Id"));
        assert_eq!(ctx.response_header("vary"), Some("Origin"));
    }

    #[test]
    fn test_disallowed_actual_request_passes_without_headers() {
        let mut ctx = Context::new(Method::GET, "/api").with_header("origin", "https://evil.example.com");
        assert!(run(restricted(), &mut ctx));
        assert!(ctx.response_header(headers::ALLOW_ORIGIN).is_none());
    }

    #[test]
    fn test_same_origin_request_is_untouched() {
        let mut ctx = Context::new(Method::OPTIONS, "/api");
        assert!(run(CorsMiddleware::permissive(), &mut ctx));
        assert!(ctx.response_headers().get(headers::ALLOW_ORIGIN).is_none());
    }

    #[test]
    fn test_wildcard_headers_echo_request() {
        let mw = CorsMiddleware::from_config(CorsConfig {
            allow_headers: vec!["*".into()],
            ..CorsConfig::default()
        })
        .unwrap();
        let mut ctx = Context::new(Method::OPTIONS, "/api")
            .with_header("origin", "https://app.example.com")
            .with_header("access-control-request-method", "POST")
            .with_header("access-control-request-headers", "x-custom");
        run(mw, &mut ctx);
        assert_eq!(ctx.response_header(headers::ALLOW_HEADERS), Some("x-custom"));
    }

    #[test]
    fn test_empty_methods_rejected() {
        let err = CorsMiddleware::from_config(CorsConfig {
            allow_methods: Vec::new(),
            ..CorsConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, TrellisError::Config(_)));
    }
}
