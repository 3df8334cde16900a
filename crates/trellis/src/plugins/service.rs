//! A shared instance as a plugin.

use std::sync::Arc;

use trellis_core::TrellisResult;

use crate::plugin::{short_type_name, Plugin};
use crate::App;

/// Publishes a shared instance into the app's services when used.
///
/// The instance is withdrawn when the plugin is unused.
///
/// ```
/// use std::sync::Arc;
/// use trellis::plugins::ServicePlugin;
/// use trellis::App;
///
/// struct Mailer {
///     host: String,
/// }
///
/// let mut app = App::new();
/// app.use_plugin(ServicePlugin::named("mail", Arc::new(Mailer { host: "smtp.local".into() })))
///     .unwrap();
/// assert_eq!(app.service_named::<Mailer>("mail").unwrap().host, "smtp.local");
///
/// app.unuse::<ServicePlugin<Mailer>>().unwrap();
/// assert!(app.service_named::<Mailer>("mail").is_none());
/// ```
pub struct ServicePlugin<T> {
    label: String,
    name: Option<String>,
    service: Arc<T>,
}

impl<T: Send + Sync + 'static> ServicePlugin<T> {
    /// Publishes `service` under its type.
    pub fn new(service: Arc<T>) -> Self {
        Self {
            label: short_type_name(std::any::type_name::<T>()).to_string(),
            name: None,
            service,
        }
    }

    /// Publishes `service` under its type and `name`.
    pub fn named(name: impl Into<String>, service: Arc<T>) -> Self {
        let name = name.into();
        Self {
            label: format!("{}({name})", short_type_name(std::any::type_name::<T>())),
            name: Some(name),
            service,
        }
    }

    /// The published instance.
    pub fn service(&self) -> &Arc<T> {
        &self.service
    }
}

impl<T: Send + Sync + 'static> Plugin for ServicePlugin<T> {
    fn name(&self) -> &str {
        &self.label
    }

    fn config(&mut self, app: &mut App) -> TrellisResult<()> {
        let service = Arc::clone(&self.service);
        match &self.name {
            Some(name) => app.provide_named(name.clone(), service),
            None => app.provide(service),
        };
        Ok(())
    }
}
