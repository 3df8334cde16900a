//! HTTP Basic authentication.
//!
//! Reads `Authorization: Basic <base64(user:password)>` and checks the
//! pair against a fixed user table or a validator closure. Accepted
//! requests continue with the user name stored under
//! [`USER_STATE_KEY`]. Everything else is answered with
//! `401 Unauthorized` and a `WWW-Authenticate` challenge, and the rest of
//! the chain does not run.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::{header, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use trellis_core::{Context, TrellisError, TrellisResult};

use super::ConfigurableMiddleware;
use crate::middleware::{Middleware, Next};

/// State key holding the authenticated user name as a `String`.
pub const USER_STATE_KEY: &str = "user";

type Validator = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Configuration for [`BasicAuthMiddleware`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicAuthConfig {
    /// Realm announced in the challenge.
    pub realm: String,
    /// Accepted user names and passwords.
    pub users: HashMap<String, String>,
}

impl Default for BasicAuthConfig {
    fn default() -> Self {
        Self {
            realm: "Restricted".to_string(),
            users: HashMap::new(),
        }
    }
}

/// HTTP Basic authentication middleware.
///
/// ```
/// use trellis_middleware::stages::BasicAuthMiddleware;
///
/// let auth = BasicAuthMiddleware::with_validator(|user, password| {
///     user == "admin" && password == "s3cret"
/// })
/// .realm("admin area");
/// ```
#[derive(Clone)]
pub struct BasicAuthMiddleware {
    realm: String,
    challenge: HeaderValue,
    validator: Validator,
}

impl BasicAuthMiddleware {
    /// Accepts exactly the given user names and passwords.
    pub fn new<I, U, P>(users: I) -> Self
    where
        I: IntoIterator<Item = (U, P)>,
        U: Into<String>,
        P: Into<String>,
    {
        let users: HashMap<String, String> = users
            .into_iter()
            .map(|(u, p)| (u.into(), p.into()))
            .collect();
        Self::with_validator(move |user, password| {
            users
                .get(user)
                .is_some_and(|expected| constant_time_eq(expected.as_bytes(), password.as_bytes()))
        })
    }

    /// Accepts whatever `validator` approves.
    pub fn with_validator<F>(validator: F) -> Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        let realm = BasicAuthConfig::default().realm;
        Self {
            challenge: challenge_for(&realm).unwrap_or_else(|| HeaderValue::from_static("Basic")),
            realm,
            validator: Arc::new(validator),
        }
    }

    /// Sets the realm announced in the challenge.
    ///
    /// A realm that cannot be sent as a header value is ignored.
    #[must_use]
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        let realm = realm.into();
        if let Some(challenge) = challenge_for(&realm) {
            self.challenge = challenge;
            self.realm = realm;
        }
        self
    }

    /// Decodes the credentials of `ctx`, if it carries well formed ones.
    pub fn credentials(ctx: &Context) -> Option<(String, String)> {
        let value = ctx.header(header::AUTHORIZATION.as_str())?;
        let (scheme, encoded) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (user, password) = decoded.split_once(':')?;
        Some((user.to_string(), password.to_string()))
    }

    fn reject(&self, ctx: &mut Context) {
        ctx.set_status(StatusCode::UNAUTHORIZED);
        ctx.set_header(header::WWW_AUTHENTICATE, self.challenge.clone());
        ctx.text("Unauthorized");
    }
}

fn challenge_for(realm: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm.replace('"', "'"))).ok()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0_u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl Middleware for BasicAuthMiddleware {
    fn name(&self) -> &'static str {
        "basic_auth"
    }

    fn handle(&self, ctx: &mut Context, next: Next<'_>) -> TrellisResult<()> {
        match Self::credentials(ctx) {
            Some((user, password)) if (self.validator)(&user, &password) => {
                ctx.put_state(USER_STATE_KEY, user);
                next.run(ctx)
            }
            Some((user, _)) => {
                tracing::debug!(user, realm = %self.realm, "basic auth rejected");
                self.reject(ctx);
                Ok(())
            }
            None => {
                self.reject(ctx);
                Ok(())
            }
        }
    }
}

impl ConfigurableMiddleware for BasicAuthMiddleware {
    const SECTION: &'static str = "basic_auth";
    type Config = BasicAuthConfig;

    fn from_config(config: Self::Config) -> TrellisResult<Self> {
        if config.users.is_empty() {
            return Err(TrellisError::config("basic_auth.users must not be empty"));
        }
        let realm = config.realm.clone();
        let mw = Self::new(config.users);
        let challenge = challenge_for(&realm)
            .ok_or_else(|| TrellisError::config("basic_auth.realm: invalid header value"))?;
        Ok(Self {
            realm,
            challenge,
            ..mw
        })
    }
}

impl fmt::Debug for BasicAuthMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthMiddleware")
            .field("realm", &self.realm)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoxedMiddleware;
    use http::Method;
    use trellis_core::handler;

    fn basic(user: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
    }

    fn run(mw: BasicAuthMiddleware, mut ctx: Context) -> Context {
        let stages: Vec<BoxedMiddleware> = vec![Arc::new(mw)];
        let h = handler(|ctx| {
            let user = ctx.state::<String>(USER_STATE_KEY).cloned().unwrap_or_default();
            ctx.text(format!("hello {user}"));
            Ok(())
        });
        Next::new(&stages, h.as_ref()).run(&mut ctx).unwrap();
        ctx
    }

    #[test]
    fn test_valid_credentials_continue() {
        let mw = BasicAuthMiddleware::new([("alice", "pw")]);
        let ctx = Context::new(Method::GET, "/").with_header("authorization", &basic("alice", "pw"));
        let ctx = run(mw, ctx);
        assert_eq!(ctx.status(), StatusCode::OK);
        assert_eq!(ctx.response_body().as_ref(), b"hello alice");
    }

    #[test]
    fn test_wrong_password_is_challenged() {
        let mw = BasicAuthMiddleware::new([("alice", "pw")]).realm("admin");
        let ctx = Context::new(Method::GET, "/").with_header("authorization", &basic("alice", "nope"));
        let ctx = run(mw, ctx);
        assert_eq!(ctx.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ctx.response_header("www-authenticate"), Some("Basic realm=\"admin\""));
        assert!(!ctx.has_state(USER_STATE_KEY));
    }

    #[test]
    fn test_missing_or_malformed_header() {
        let mw = BasicAuthMiddleware::with_validator(|_, _| true);
        let ctx = run(mw.clone(), Context::new(Method::GET, "/"));
        assert_eq!(ctx.status(), StatusCode::UNAUTHORIZED);

        let ctx = run(
            mw.clone(),
            Context::new(Method::GET, "/").with_header("authorization", "Bearer token"),
        );
        assert_eq!(ctx.status(), StatusCode::UNAUTHORIZED);

        let ctx = run(
            mw,
            Context::new(Method::GET, "/").with_header("authorization", "Basic !!!"),
        );
        assert_eq!(ctx.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_password_may_contain_colon() {
        let mw = BasicAuthMiddleware::with_validator(|u, p| u == "bob" && p == "a:b");
        let ctx = Context::new(Method::GET, "/").with_header("authorization", &basic("bob", "a:b"));
        assert_eq!(run(mw, ctx).status(), StatusCode::OK);
    }

    #[test]
    fn test_from_config() {
        let config: BasicAuthConfig =
            serde_json::from_value(serde_json::json!({ "users": { "ops": "pw" } })).unwrap();
        let mw = BasicAuthMiddleware::from_config(config).unwrap();
        let ctx = Context::new(Method::GET, "/").with_header("authorization", &basic("ops", "pw"));
        assert_eq!(run(mw, ctx).status(), StatusCode::OK);

        assert!(BasicAuthMiddleware::from_config(BasicAuthConfig::default()).is_err());
    }
}
