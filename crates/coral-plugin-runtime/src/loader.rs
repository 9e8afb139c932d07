//! Loader seam between descriptor files and plugin code
//!
//! The runtime never maps native libraries itself. A [`LoaderHost`] turns a
//! descriptor path into a [`PluginLoader`], which exposes the parsed
//! descriptor document without loading any code and materializes the plugin
//! instance on demand. Hosts that load dynamic libraries implement these
//! traits over their platform loader; [`FactoryLoaderHost`] is the bundled
//! in-process implementation backed by a factory table, the moral
//! equivalent of statically linked plugins.

use coral_plugin_api::Plugin;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Error strings crossing the loader seam. Loader failures are user-facing
/// text recorded on the descriptor, not typed errors.
pub type LoaderResult<T> = std::result::Result<T, String>;

/// One plugin's loading resource, owned by its descriptor from read until
/// kill.
pub trait PluginLoader: Send {
    /// The parsed descriptor document (the full top-level object, including
    /// `IID` and `MetaData`). Available without loading code.
    fn metadata(&self) -> &Value;

    /// Materialize the plugin instance.
    fn load(&mut self) -> LoaderResult<Box<dyn Plugin>>;

    /// Release the underlying resource. Called when the descriptor is
    /// killed; instances already handed out stay valid until dropped.
    fn unload(&mut self);
}

/// Opens descriptor paths into loaders.
pub trait LoaderHost: Send + Sync {
    /// Open the descriptor at `path`.
    fn open(&self, path: &Path) -> LoaderResult<Box<dyn PluginLoader>>;
}

type PluginFactory = dyn Fn() -> LoaderResult<Box<dyn Plugin>> + Send + Sync;

/// A [`LoaderHost`] that parses descriptor files as JSON and creates
/// instances from a name-keyed factory table.
///
/// Factories are registered under the plugin's `MetaData.Name`; a descriptor
/// whose name has no factory reads fine but fails to load.
#[derive(Default)]
pub struct FactoryLoaderHost {
    factories: HashMap<String, Arc<PluginFactory>>,
}

impl fmt::Debug for FactoryLoaderHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryLoaderHost")
            .field("factories", &self.factories.keys())
            .finish()
    }
}

impl FactoryLoaderHost {
    /// Create an empty factory host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory that materializes the plugin named `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> LoaderResult<Box<dyn Plugin>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }
}

impl LoaderHost for FactoryLoaderHost {
    fn open(&self, path: &Path) -> LoaderResult<Box<dyn PluginLoader>> {
        let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
        let document: Value = serde_json::from_str(&content).map_err(|e| e.to_string())?;
        let factory = document
            .get("MetaData")
            .and_then(|m| m.get("Name"))
            .and_then(Value::as_str)
            .and_then(|name| self.factories.get(name))
            .cloned();
        Ok(Box::new(FactoryLoader { document, factory }))
    }
}

struct FactoryLoader {
    document: Value,
    factory: Option<Arc<PluginFactory>>,
}

impl PluginLoader for FactoryLoader {
    fn metadata(&self) -> &Value {
        &self.document
    }

    fn load(&mut self) -> LoaderResult<Box<dyn Plugin>> {
        match &self.factory {
            Some(factory) => factory(),
            None => Err("no plugin factory registered".to_string()),
        }
    }

    fn unload(&mut self) {
        self.factory = None;
    }
}
