//! Ready-made plugins.
//!
//! - [`MiddlewarePlugin`] - Installs one middleware stage
//! - [`RoutesPlugin`] - Registers a [`Routes`](trellis_core::Routes) collection
//! - [`ServicePlugin`] - Publishes a shared instance

mod middleware;
mod routes;
mod service;

pub use middleware::MiddlewarePlugin;
pub use routes::RoutesPlugin;
pub use service::ServicePlugin;
