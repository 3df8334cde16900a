//! # Trellis Test
//!
//! In-memory request dispatch for testing Trellis apps. Requests go through
//! routing, the full middleware chain and error rendering without a socket.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use http::StatusCode;
//! use trellis::prelude::*;
//! use trellis_test::TestClient;
//!
//! let mut app = App::new();
//! app.use_plugin(MiddlewarePlugin::new(RequestIdMiddleware::new())).unwrap();
//! app.post("/users", |ctx| {
//!     let user: serde_json::Value = ctx.body_json()?;
//!     ctx.set_status(StatusCode::CREATED);
//!     ctx.json(&user)
//! })
//! .unwrap();
//!
//! let client = TestClient::new(Arc::new(app));
//! let response = client
//!     .post("/users")
//!     .json(&serde_json::json!({ "name": "Alice" }))
//!     .send();
//!
//! response.assert_status(StatusCode::CREATED);
//! assert!(response.header("x-request-id").is_some());
//! assert_eq!(response.json_value().unwrap()["name"], "Alice");
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::TestClient;
pub use error::TestError;
pub use request::TestRequestBuilder;
pub use response::TestResponse;
