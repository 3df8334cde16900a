//! Shared service container.
//!
//! Plugins publish the facilities they provide (a connection pool, a
//! cache client, a template engine) into the application's [`Services`]
//! during `config()`, and handlers or later plugins resolve them from
//! there. Services are keyed by type, and optionally by a name when more
//! than one instance of a type is registered.
//!
//! ```rust
//! use trellis_core::Services;
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! let mut services = Services::new();
//! services.register(Arc::new(Database { url: "postgres://primary".into() }));
//! services.register_named("replica", Arc::new(Database { url: "postgres://replica".into() }));
//!
//! let primary: Arc<Database> = services.resolve().unwrap();
//! let replica: Arc<Database> = services.resolve_named("replica").unwrap();
//! assert_eq!(primary.url, "postgres://primary");
//! assert_eq!(replica.url, "postgres://replica");
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Error when a service cannot be resolved.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Failed to resolve {type_name}{}: service not registered", .name.as_ref().map(|n| format!(" '{n}'")).unwrap_or_default())]
pub struct ResolveError {
    /// The type that could not be resolved
    pub type_name: &'static str,
    /// The instance name, for named lookups
    pub name: Option<String>,
}

type Key = (TypeId, Option<String>);

/// A container of shared services keyed by type and optional name.
#[derive(Default, Clone)]
pub struct Services {
    services: HashMap<Key, Arc<dyn Any + Send + Sync>>,
}

impl Services {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the default instance of `T`, replacing any previous one.
    pub fn register<T: Send + Sync + 'static>(&mut self, service: Arc<T>) {
        self.services.insert((TypeId::of::<T>(), None), service);
    }

    /// Registers an instance of `T` under `name`.
    pub fn register_named<T: Send + Sync + 'static>(&mut self, name: impl Into<String>, service: Arc<T>) {
        self.services
            .insert((TypeId::of::<T>(), Some(name.into())), service);
    }

    /// Resolves the default instance of `T`.
    #[must_use]
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.lookup::<T>(None)
    }

    /// Resolves the instance of `T` registered under `name`.
    #[must_use]
    pub fn resolve_named<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.lookup::<T>(Some(name.to_string()))
    }

    /// Resolves the default instance of `T` or returns an error.
    pub fn require<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveError> {
        self.resolve().ok_or(ResolveError {
            type_name: std::any::type_name::<T>(),
            name: None,
        })
    }

    /// Resolves the named instance of `T` or returns an error.
    pub fn require_named<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ResolveError> {
        self.resolve_named(name).ok_or_else(|| ResolveError {
            type_name: std::any::type_name::<T>(),
            name: Some(name.to_string()),
        })
    }

    /// Returns true if the default instance of `T` is registered.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.services.contains_key(&(TypeId::of::<T>(), None))
    }

    /// Removes the default instance of `T`.
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<Arc<T>> {
        self.services
            .remove(&(TypeId::of::<T>(), None))
            .and_then(|s| s.downcast::<T>().ok())
    }

    /// Removes the instance of `T` registered under `name`.
    pub fn remove_named<T: Send + Sync + 'static>(&mut self, name: &str) -> Option<Arc<T>> {
        self.services
            .remove(&(TypeId::of::<T>(), Some(name.to_string())))
            .and_then(|s| s.downcast::<T>().ok())
    }

    /// Removes whatever is registered under `type_id` and `name`.
    ///
    /// For callers that recorded a registration without keeping its type
    /// parameter around.
    pub fn remove_by_type_id(&mut self, type_id: TypeId, name: Option<&str>) -> bool {
        self.services
            .remove(&(type_id, name.map(str::to_string)))
            .is_some()
    }

    /// Number of registered instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    fn lookup<T: Send + Sync + 'static>(&self, name: Option<String>) -> Option<Arc<T>> {
        self.services
            .get(&(TypeId::of::<T>(), name))
            .and_then(|s| Arc::clone(s).downcast::<T>().ok())
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("count", &self.services.len())
            .finish()
    }
}
