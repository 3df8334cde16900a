//! Request ID middleware.
//!
//! Every request gets an identifier for log correlation. An incoming
//! header is reused when trusted and well formed; otherwise a UUID v7 is
//! generated, so identifiers sort by creation time.
//!
//! The identifier is stored in the context state under
//! [`REQUEST_ID_STATE_KEY`] and echoed on the response.

use http::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use trellis_core::{Context, TrellisError, TrellisResult};
use uuid::Uuid;

use super::ConfigurableMiddleware;
use crate::middleware::{Middleware, Next};

/// State key holding the request ID as a `String`.
pub const REQUEST_ID_STATE_KEY: &str = "request_id";

/// Default header used to read and echo the request ID.
pub const DEFAULT_HEADER: &str = "x-request-id";

const MAX_INCOMING_LEN: usize = 128;

/// Configuration for [`RequestIdMiddleware`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestIdConfig {
    /// Header to read and echo.
    pub header: String,
    /// Reuse an incoming ID instead of always generating one.
    pub trust_incoming: bool,
}

impl Default for RequestIdConfig {
    fn default() -> Self {
        Self {
            header: DEFAULT_HEADER.to_string(),
            trust_incoming: true,
        }
    }
}

/// Middleware that generates or propagates request IDs.
#[derive(Debug, Clone)]
pub struct RequestIdMiddleware {
    header: HeaderName,
    trust_incoming: bool,
}

impl Default for RequestIdMiddleware {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static(DEFAULT_HEADER),
            trust_incoming: true,
        }
    }
}

impl RequestIdMiddleware {
    /// Creates the middleware using `x-request-id`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a middleware that ignores incoming IDs.
    ///
    /// Use this at the edge, where clients are not trusted to pick IDs.
    #[must_use]
    pub fn always_generate() -> Self {
        Self {
            trust_incoming: false,
            ..Self::default()
        }
    }

    /// The header this middleware reads and writes.
    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    fn incoming(&self, ctx: &Context) -> Option<String> {
        if !self.trust_incoming {
            return None;
        }
        ctx.header(self.header.as_str())
            .map(str::trim)
            .filter(|id| is_valid_id(id))
            .map(str::to_string)
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_INCOMING_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':'))
}

impl Middleware for RequestIdMiddleware {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn handle(&self, ctx: &mut Context, next: Next<'_>) -> TrellisResult<()> {
        let id = self
            .incoming(ctx)
            .unwrap_or_else(|| Uuid::now_v7().to_string());

        if let Ok(value) = HeaderValue::from_str(&id) {
            ctx.set_header(self.header.clone(), value);
        }
        ctx.put_state(REQUEST_ID_STATE_KEY, id);

        next.run(ctx)
    }
}

impl ConfigurableMiddleware for RequestIdMiddleware {
    const SECTION: &'static str = "request_id";
    type Config = RequestIdConfig;

    fn from_config(config: Self::Config) -> TrellisResult<Self> {
        let header = HeaderName::from_bytes(config.header.as_bytes()).map_err(|_| {
            TrellisError::config(format!("request_id.header: invalid header name '{}'", config.header))
        })?;
        Ok(Self {
            header,
            trust_incoming: config.trust_incoming,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoxedMiddleware;
    use http::Method;
    use std::sync::Arc;
    use trellis_core::handler;

    fn run(mw: RequestIdMiddleware, ctx: &mut Context) -> Option<String> {
        let stages: Vec<BoxedMiddleware> = vec![Arc::new(mw)];
        let h = handler(|ctx| {
            let id = ctx.state::<String>(REQUEST_ID_STATE_KEY).cloned();
            ctx.text(id.unwrap_or_default());
            Ok(())
        });
        Next::new(&stages, h.as_ref()).run(ctx).unwrap();
        ctx.state::<String>(REQUEST_ID_STATE_KEY).cloned()
    }

    #[test]
    fn test_generates_uuid_v7() {
        let mut ctx = Context::new(Method::GET, "/");
        let id = run(RequestIdMiddleware::new(), &mut ctx).unwrap();
        let uuid = Uuid::parse_str(&id).unwrap();
        assert_eq!(uuid.get_version_num(), 7);
        assert_eq!(ctx.response_header("x-request-id"), Some(id.as_str()));
        assert_eq!(ctx.response_body().as_ref(), id.as_bytes());
    }

    #[test]
    fn test_reuses_trusted_incoming_id() {
        let mut ctx = Context::new(Method::GET, "/").with_header("x-request-id", "abc-123");
        assert_eq!(run(RequestIdMiddleware::new(), &mut ctx).as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_rejects_malformed_incoming_id() {
        let mut ctx = Context::new(Method::GET, "/").with_header("x-request-id", "bad id!");
        let id = run(RequestIdMiddleware::new(), &mut ctx).unwrap();
        assert_ne!(id, "bad id!");
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_always_generate_ignores_incoming() {
        let mut ctx = Context::new(Method::GET, "/").with_header("x-request-id", "abc-123");
        let id = run(RequestIdMiddleware::always_generate(), &mut ctx).unwrap();
        assert_ne!(id, "abc-123");
    }

    #[test]
    fn test_custom_header_from_config() {
        let mw = RequestIdMiddleware::from_config(RequestIdConfig {
            header: "x-trace-id".into(),
            ..RequestIdConfig::default()
        })
        .unwrap();
        let mut ctx = Context::new(Method::GET, "/").with_header("x-trace-id", "t-1");
        assert_eq!(run(mw, &mut ctx).as_deref(), Some("t-1"));
        assert_eq!(ctx.response_header("x-trace-id"), Some("t-1"));
    }

    #[test]
    fn test_invalid_header_name_is_config_error() {
        let err = RequestIdMiddleware::from_config(RequestIdConfig {
            header: "bad header".into(),
            ..RequestIdConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, TrellisError::Config(_)));
    }
}
