//! # Coral Plugin Runtime
//!
//! Host-side runtime for the Coral extension system: descriptor discovery,
//! dependency resolution, lifecycle management and the shared object
//! registry.
//!
//! ## Overview
//!
//! - [`PluginManager`] discovers descriptor files, binds the dependency
//!   graph, and drives every plugin through
//!   `Loaded` → `Initialized` → `Running` in dependency order, then back
//!   through `Stopped` → `Deleted` in reverse order on shutdown.
//! - [`PluginSpec`] is the record for one plugin: metadata, dependencies,
//!   lifecycle state and the last error, if any.
//! - [`ObjectRegistry`] is the pool plugins use to publish and discover
//!   each other's services.
//!
//! ## Example
//!
//! ```rust,no_run
//! use coral_plugin_runtime::{FactoryLoaderHost, PluginManager};
//! use std::path::PathBuf;
//!
//! # async fn example() -> coral_plugin_runtime::Result<()> {
//! let host = FactoryLoaderHost::new();
//! // host.register("my-plugin", || Ok(Box::new(MyPlugin::new())));
//!
//! let mut manager = PluginManager::new("org.example.plugin/1", Box::new(host));
//! manager.read_plugins(&[PathBuf::from("plugins")])?;
//! manager.load_plugins().await;
//!
//! // ... run the application ...
//!
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod error;
pub mod host;
pub mod loader;
pub mod manager;
pub mod registry;
pub mod settings;
pub mod spec;
pub mod version;

pub use error::{Result, RuntimeError};
pub use loader::{FactoryLoaderHost, LoaderHost, LoaderResult, PluginLoader};
pub use manager::PluginManager;
pub use registry::{ObjectHandle, ObjectRegistry};
pub use settings::PluginSettings;
pub use spec::{
    DependencyType, PluginArgumentDescription, PluginDependency, PluginSpec, PluginState,
};

// Re-export plugin API types for convenience
pub use coral_plugin_api::{Plugin, PluginError, ShutdownFlag, ShutdownSignal};

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::error::{Result, RuntimeError};
    pub use crate::loader::{FactoryLoaderHost, LoaderHost};
    pub use crate::manager::PluginManager;
    pub use crate::registry::{ObjectHandle, ObjectRegistry};
    pub use crate::spec::{PluginDependency, PluginSpec, PluginState};
    pub use coral_plugin_api::prelude::*;
}
