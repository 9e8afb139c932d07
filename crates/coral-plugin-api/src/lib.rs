//! # Coral Plugin API
//!
//! This crate provides the SDK for developing plugins for the Coral
//! extension system.
//!
//! A plugin implements the [`Plugin`] trait; the host discovers its
//! descriptor, resolves dependencies between plugins, and drives each one
//! through `initialize` → `extensions_initialized` → (optionally)
//! `delayed_initialize`, then `about_to_shutdown` on the way down.
//!
//! ## Example
//!
//! ```rust,no_run
//! use coral_plugin_api::{Plugin, PluginError, ShutdownFlag};
//! use async_trait::async_trait;
//!
//! struct MyPlugin;
//!
//! #[async_trait]
//! impl Plugin for MyPlugin {
//!     async fn initialize(&mut self, _arguments: &[String]) -> Result<(), PluginError> {
//!         // publish objects, open connections, ...
//!         Ok(())
//!     }
//!
//!     async fn about_to_shutdown(&mut self) -> ShutdownFlag {
//!         let (flag, signal) = ShutdownFlag::deferred();
//!         tokio::spawn(async move {
//!             // drain in-flight work, then:
//!             signal.finished();
//!         });
//!         flag
//!     }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod error;
pub mod plugin;

pub use error::PluginError;
pub use plugin::{Plugin, ShutdownFlag, ShutdownSignal};

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::error::PluginError;
    pub use crate::plugin::{Plugin, ShutdownFlag, ShutdownSignal};
    pub use async_trait::async_trait;
}
