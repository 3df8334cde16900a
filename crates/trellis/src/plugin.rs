//! The plugin contract.
//!
//! A plugin bundles setup work: registering routes, installing middleware,
//! publishing services. [`App::use_plugin`] runs [`Plugin::config`] right
//! away; [`App::unuse`] and [`App::shutdown`] run [`Plugin::uninstall`].
//!
//! Anything a plugin registers through the `App` while its `config` runs is
//! tagged with the plugin. Middleware and services are taken down again
//! when the plugin is removed; routes stay registered.
//!
//! # Example
//!
//! ```
//! use trellis::{App, Plugin, TrellisResult};
//!
//! #[derive(Default)]
//! struct Health {
//!     checks: usize,
//! }
//!
//! impl Plugin for Health {
//!     fn name(&self) -> &str {
//!         "health"
//!     }
//!
//!     fn config(&mut self, app: &mut App) -> TrellisResult<()> {
//!         app.get("/health", |ctx| {
//!             ctx.text("ok");
//!             Ok(())
//!         })?;
//!         self.checks += 1;
//!         Ok(())
//!     }
//! }
//!
//! let mut app = App::new();
//! app.use_plugin(Health::default()).unwrap();
//! assert_eq!(app.get_plugin::<Health>().map(|h| h.checks), Some(1));
//! ```
//!
//! [`App::use_plugin`]: crate::App::use_plugin
//! [`App::unuse`]: crate::App::unuse
//! [`App::shutdown`]: crate::App::shutdown

use std::any::Any;

use trellis_core::TrellisResult;

use crate::App;

/// A unit of application setup with an install and an uninstall phase.
pub trait Plugin: Any + Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Installs the plugin into `app`.
    ///
    /// Runs exactly once, when the plugin is passed to
    /// [`App::use_plugin`](crate::App::use_plugin). On error, everything
    /// registered during the call is rolled back.
    fn config(&mut self, app: &mut App) -> TrellisResult<()> {
        let _ = app;
        Ok(())
    }

    /// Releases whatever the plugin holds outside the `App`.
    fn uninstall(&mut self) -> TrellisResult<()> {
        Ok(())
    }
}

/// Downcasting support for stored plugins.
pub(crate) trait AnyPlugin: Plugin {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<P: Plugin> AnyPlugin for P {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// `my_app::plugins::Metrics<my_app::Db>` → `Metrics<Db>`.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}
