//! Layered configuration for Trellis.
//!
//! Configuration is one tree of values, built by [`ConfigLoader`] from
//! defaults, TOML or JSON files, and `TRELLIS__*` environment variables,
//! and read through [`ConfigStore`]:
//!
//! ```text
//! defaults ─┐
//! file(s)  ─┼─► ConfigLoader::load() ─► ConfigStore
//! env vars ─┘                            ├─ section::<T>("plugins.cors")
//!                                        └─ get_i64("server.port")
//! ```
//!
//! The application reads its own `server` section as [`ServerSettings`];
//! every other section belongs to whoever consumes it, typically a plugin
//! deserializing its own config struct.
//!
//! # Example
//!
//! ```
//! use trellis_config::{ConfigLoader, ServerSettings};
//!
//! let store = ConfigLoader::new()
//!     .with_string("[server]\ndev_mode = true\n\n[plugins]\nrecovery = true", "toml")
//!     .unwrap()
//!     .load()
//!     .unwrap();
//!
//! let server = ServerSettings::from_store(&store).unwrap();
//! assert!(server.dev_mode);
//! assert_eq!(store.get_bool("plugins.recovery"), Some(true));
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod loader;
mod settings;
mod store;

pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use settings::ServerSettings;
pub use store::ConfigStore;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
