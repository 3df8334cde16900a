//! Rate limiting middleware.
//!
//! Counts requests per client IP in fixed windows. The client IP comes
//! from `X-Forwarded-For`, `X-Real-IP` and related headers, then the
//! peer address. Requests over the limit receive
//! `429 Too Many Requests` with `Retry-After` and never reach the rest of
//! the chain.
//!
//! Every response carries `X-RateLimit-Limit` and
//! `X-RateLimit-Remaining`. Expired windows are swept at most once per
//! window length, so spoofed client addresses cannot pile up.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use http::{HeaderValue, StatusCode};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use trellis_core::{Context, TrellisError, TrellisResult};

use super::ConfigurableMiddleware;
use crate::middleware::{Middleware, Next};

/// Rate limit header names.
pub mod headers {
    /// Maximum requests allowed in the window.
    pub const LIMIT: &str = "x-ratelimit-limit";
    /// Remaining requests in current window.
    pub const REMAINING: &str = "x-ratelimit-remaining";
    /// Seconds to wait before retrying (on 429).
    pub const RETRY_AFTER: &str = "retry-after";
}

/// Key used when a request has no identifiable client address.
const UNKNOWN_CLIENT: &str = "unknown";

/// Configuration for [`RateLimitMiddleware`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed per window.
    pub limit: u64,
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Body of the 429 response.
    pub message: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            window_ms: 60_000,
            message: "Too Many Requests".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u64,
}

enum Decision {
    Allow { remaining: u64 },
    Deny { retry_after: Duration },
}

/// Fixed-window rate limiter keyed by client IP.
#[derive(Debug)]
pub struct RateLimitMiddleware {
    limit: u64,
    window: Duration,
    message: String,
    windows: DashMap<String, Window>,
    last_purge: Mutex<Instant>,
}

impl Default for RateLimitMiddleware {
    fn default() -> Self {
        let config = RateLimitConfig::default();
        Self::new(config.limit, Duration::from_millis(config.window_ms))
    }
}

impl RateLimitMiddleware {
    /// Allows `limit` requests per client in every `window`.
    pub fn new(limit: u64, window: Duration) -> Self {
        Self {
            limit,
            window,
            message: RateLimitConfig::default().message,
            windows: DashMap::new(),
            last_purge: Mutex::new(Instant::now()),
        }
    }

    /// Requests allowed per window.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Drops windows that have expired.
    pub fn purge_expired(&self) {
        self.purge_at(Instant::now());
    }

    fn purge_at(&self, now: Instant) {
        self.windows
            .retain(|_, w| now.duration_since(w.started) < self.window);
    }

    fn maybe_purge(&self, now: Instant) {
        // Another request is already sweeping
        let Some(mut last) = self.last_purge.try_lock() else {
            return;
        };
        if now.duration_since(*last) < self.window {
            return;
        }
        *last = now;
        drop(last);
        self.purge_at(now);
    }

    fn check(&self, key: String, now: Instant) -> Decision {
        let mut entry = self.windows.entry(key).or_insert(Window {
            started: now,
            count: 0,
        });
        let window = entry.value_mut();
        if now.duration_since(window.started) >= self.window {
            *window = Window {
                started: now,
                count: 0,
            };
        }

        if window.count >= self.limit {
            let elapsed = now.duration_since(window.started);
            return Decision::Deny {
                retry_after: self.window.saturating_sub(elapsed),
            };
        }
        window.count += 1;
        Decision::Allow {
            remaining: self.limit - window.count,
        }
    }
}

impl Middleware for RateLimitMiddleware {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn handle(&self, ctx: &mut Context, next: Next<'_>) -> TrellisResult<()> {
        let key = ctx
            .client_ip()
            .map_or_else(|| UNKNOWN_CLIENT.to_string(), |ip| ip.to_string());

        let now = Instant::now();
        self.maybe_purge(now);
        ctx.set_header(headers::LIMIT, HeaderValue::from(self.limit));
        match self.check(key, now) {
            Decision::Allow { remaining } => {
                ctx.set_header(headers::REMAINING, HeaderValue::from(remaining));
                next.run(ctx)
            }
            Decision::Deny { retry_after } => {
                // Round up so clients never retry early
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                tracing::debug!(
                    client = ?ctx.client_ip(),
                    retry_after_secs = secs,
                    "rate limit exceeded"
                );
                ctx.set_header(headers::REMAINING, HeaderValue::from(0_u64));
                ctx.set_header(headers::RETRY_AFTER, HeaderValue::from(secs.max(1)));
                ctx.set_status(StatusCode::TOO_MANY_REQUESTS);
                ctx.text(self.message.clone());
                Ok(())
            }
        }
    }
}

impl ConfigurableMiddleware for RateLimitMiddleware {
    const SECTION: &'static str = "rate_limit";
    type Config = RateLimitConfig;

    fn from_config(config: Self::Config) -> TrellisResult<Self> {
        if config.limit == 0 {
            return Err(TrellisError::config("rate_limit.limit must be at least 1"));
        }
        if config.window_ms == 0 {
            return Err(TrellisError::config("rate_limit.window_ms must be at least 1"));
        }
        Ok(Self {
            message: config.message,
            ..Self::new(config.limit, Duration::from_millis(config.window_ms))
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

    fn send(stages: &[BoxedMiddleware], ip: &str) -> Context {
        let h = handler(|ctx| {
            ctx.text("ok");
            Ok(())
        });
        let mut ctx = Context::new(Method::GET, "/").with_header("x-forwarded-for", ip);
        Next::new(stages, h.as_ref()).run(&mut ctx).unwrap();
        ctx
    }

    #[test]
    fn test_limits_per_client() {
        let stages: Vec<BoxedMiddleware> =
            vec![Arc::new(RateLimitMiddleware::new(2, Duration::from_secs(60)))];

        let first = send(&stages, "10.0.0.1");
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.response_header(headers::LIMIT), Some("2"));
        assert_eq!(first.response_header(headers::REMAINING), Some("1"));

        assert_eq!(send(&stages, "10.0.0.1").status(), StatusCode::OK);

        let denied = send(&stages, "10.0.0.1");
        assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(denied.response_header(headers::REMAINING), Some("0"));
        let retry: u64 = denied
            .response_header(headers::RETRY_AFTER)
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=60).contains(&retry));

        assert_eq!(send(&stages, "10.0.0.2").status(), StatusCode::OK);
    }

    #[test]
    fn test_window_resets() {
        let mw = RateLimitMiddleware::new(1, Duration::from_millis(20));
        let start = Instant::now();
        assert!(matches!(mw.check("a".into(), start), Decision::Allow { remaining: 0 }));
        assert!(matches!(mw.check("a".into(), start), Decision::Deny { .. }));
        let later = start + Duration::from_millis(25);
        assert!(matches!(mw.check("a".into(), later), Decision::Allow { .. }));
    }

    #[test]
    fn test_purge_expired() {
        let mw = RateLimitMiddleware::new(5, Duration::from_millis(1));
        let past = Instant::now();
        let _ = mw.check("a".into(), past);
        std::thread::sleep(Duration::from_millis(5));
        mw.purge_expired();
        assert_eq!(mw.tracked_clients(), 0);
    }

    #[test]
    fn test_expired_clients_are_swept_on_request() {
        let limiter = Arc::new(RateLimitMiddleware::new(5, Duration::from_millis(1)));
        let stages: Vec<BoxedMiddleware> = vec![Arc::clone(&limiter) as BoxedMiddleware];

        for i in 0..200 {
            send(&stages, &format!("10.1.{}.{}", i / 250, i % 250));
        }

        std::thread::sleep(Duration::from_millis(5));
        send(&stages, "10.9.9.9");
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_from_config_validates() {
        assert!(RateLimitMiddleware::from_config(RateLimitConfig {
            limit: 0,
            ..RateLimitConfig::default()
        })
        .is_err());

        let mw = RateLimitMiddleware::from_config(RateLimitConfig::default()).unwrap();
        assert_eq!(mw.limit(), 100);
    }
}
