//! Built-in middleware stages.
//!
//! Unlike a fixed pipeline, none of these run unless installed. The usual
//! outermost-first order is:
//!
//! 1. [`recovery`] - Turn errors and panics into responses
//! 2. [`access_log`] - One structured event per request
//! 3. [`request_id`] - Generate/propagate request ID
//! 4. [`cors`] - Preflight handling and CORS headers
//! 5. [`rate_limit`] - Fixed-window limit per client
//! 6. [`basic_auth`] - HTTP Basic credentials
//!
//! Every stage can be built from a serde config section through
//! [`ConfigurableMiddleware`].

pub mod access_log;
pub mod basic_auth;
pub mod cors;
pub mod rate_limit;
pub mod recovery;
pub mod request_id;

pub use access_log::{AccessLogConfig, AccessLogMiddleware};
pub use basic_auth::{BasicAuthConfig, BasicAuthMiddleware, USER_STATE_KEY};
pub use cors::{CorsConfig, CorsMiddleware};
pub use rate_limit::{RateLimitConfig, RateLimitMiddleware};
pub use recovery::{ErrorHook, RecoveryConfig, RecoveryMiddleware};
pub use request_id::{RequestIdConfig, RequestIdMiddleware, REQUEST_ID_STATE_KEY};

use serde::de::DeserializeOwned;
use trellis_core::TrellisResult;

use crate::Middleware;

/// A middleware that can be built from a named configuration section.
pub trait ConfigurableMiddleware: Middleware + Sized {
    /// Section name under which the config lives (`plugins.<SECTION>`).
    const SECTION: &'static str;

    /// Deserialized configuration. Missing keys take their defaults.
    type Config: DeserializeOwned + Default;

    /// Builds the middleware, rejecting values that cannot be used.
    fn from_config(config: Self::Config) -> TrellisResult<Self>;
}
