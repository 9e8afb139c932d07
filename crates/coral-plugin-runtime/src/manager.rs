//! Plugin manager: discovery, dependency resolution and lifecycle
//!
//! The manager owns every [`PluginSpec`] in a flat table; dependency
//! bindings are indices into that table. Startup walks the load queue
//! forward through `Loaded`, `Initialized` and `Running`, then drains the
//! delayed-initialize queue; shutdown walks the queue in reverse through
//! `Stopped` (joining asynchronous finishers) and `Deleted`.

use crate::error::{Result, RuntimeError};
use crate::loader::LoaderHost;
use crate::registry::{ObjectHandle, ObjectRegistry};
use crate::settings::PluginSettings;
use crate::spec::{DependencyType, PluginDependency, PluginSpec, PluginState};
use crate::version::version_compare;
use coral_plugin_api::ShutdownFlag;
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Pause between delayed-initialize entries that reported substantive work,
/// giving the host a chance to service events.
const DELAYED_INITIALIZE_INTERVAL: Duration = Duration::from_millis(20);

type Notification = Box<dyn Fn() + Send + Sync>;

enum Resolution {
    Skip,
    Error(String),
    Resolved(HashMap<PluginDependency, usize>),
}

/// The host container driving every plugin through its lifecycle.
///
/// A process typically creates one manager and keeps it for its lifetime,
/// but managers are plain values: tests instantiate as many independent
/// ones as they need.
pub struct PluginManager {
    plugin_iid: String,
    loader_host: Box<dyn LoaderHost>,
    settings: PluginSettings,
    specs: Vec<PluginSpec>,
    registry: Arc<ObjectRegistry>,
    delayed_initialize_queue: VecDeque<usize>,
    shutdown_pending: Vec<oneshot::Receiver<()>>,
    initialization_done: bool,
    plugins_changed_subscribers: Vec<Notification>,
    initialization_done_subscribers: Vec<Notification>,
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("plugin_iid", &self.plugin_iid)
            .field("specs", &self.specs)
            .field("initialization_done", &self.initialization_done)
            .finish()
    }
}

impl PluginManager {
    /// Create a manager accepting descriptors whose `IID` equals
    /// `plugin_iid`, loading plugin code through `loader_host`.
    pub fn new(plugin_iid: impl Into<String>, loader_host: Box<dyn LoaderHost>) -> Self {
        Self {
            plugin_iid: plugin_iid.into(),
            loader_host,
            settings: PluginSettings::default(),
            specs: Vec::new(),
            registry: Arc::new(ObjectRegistry::new()),
            delayed_initialize_queue: VecDeque::new(),
            shutdown_pending: Vec::new(),
            initialization_done: false,
            plugins_changed_subscribers: Vec::new(),
            initialization_done_subscribers: Vec::new(),
        }
    }

    /// Attach user enablement settings. Must happen before
    /// [`read_plugins`](Self::read_plugins) to take effect.
    pub fn with_settings(mut self, settings: PluginSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Use an existing object registry instead of a fresh one. This is how
    /// plugin factories get a handle to the same pool the manager serves:
    /// create the registry first, hand clones to the factories, then build
    /// the manager around it.
    pub fn with_object_registry(mut self, registry: Arc<ObjectRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// The plugin interface identifier this manager accepts.
    pub fn plugin_iid(&self) -> &str {
        &self.plugin_iid
    }

    /// The active enablement settings.
    pub fn settings(&self) -> &PluginSettings {
        &self.settings
    }

    /// Every discovered plugin, in discovery order, including erroring ones.
    pub fn plugins(&self) -> &[PluginSpec] {
        &self.specs
    }

    /// Find a plugin by name.
    pub fn find_plugin(&self, name: &str) -> Option<&PluginSpec> {
        self.specs.iter().find(|s| s.name() == name)
    }

    /// Append runtime arguments for the named plugin; they are passed to its
    /// `initialize` hook.
    pub fn add_arguments<I, S>(&mut self, plugin_name: &str, arguments: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = self
            .specs
            .iter_mut()
            .find(|s| s.name() == plugin_name)
            .ok_or_else(|| RuntimeError::not_found(plugin_name))?;
        spec.add_arguments(arguments);
        Ok(())
    }

    /// The shared object registry.
    pub fn objects(&self) -> &Arc<ObjectRegistry> {
        &self.registry
    }

    /// Publish an object in the registry.
    pub fn add_object(&self, obj: ObjectHandle) -> bool {
        self.registry.add_object(obj)
    }

    /// Withdraw an object from the registry.
    pub fn remove_object(&self, obj: &ObjectHandle) -> bool {
        self.registry.remove_object(obj)
    }

    /// Snapshot of all published objects.
    pub fn all_objects(&self) -> Vec<ObjectHandle> {
        self.registry.all_objects()
    }

    /// Whether startup, including delayed initialization, has finished.
    pub fn is_initialization_done(&self) -> bool {
        self.initialization_done
    }

    /// Subscribe to changes of the plugin set.
    pub fn on_plugins_changed<F>(&mut self, subscriber: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.plugins_changed_subscribers.push(Box::new(subscriber));
    }

    /// Subscribe to the one-shot end-of-startup notification.
    pub fn on_initialization_done<F>(&mut self, subscriber: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.initialization_done_subscribers
            .push(Box::new(subscriber));
    }

    /// Discover and read plugin descriptors (`*.json`) in `search_paths`,
    /// apply enablement settings and bind the dependency graph.
    ///
    /// Directories are scanned in the given order, files within one
    /// directory in name order, so discovery order is deterministic.
    pub fn read_plugins(&mut self, search_paths: &[PathBuf]) -> Result<()> {
        for dir in search_paths {
            let entries = fs::read_dir(dir).map_err(|e| RuntimeError::ScanPath {
                path: dir.display().to_string(),
                source: e,
            })?;
            let mut files: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
                .collect();
            files.sort();
            for file in files {
                match PluginSpec::read(&file, &self.plugin_iid, self.loader_host.as_ref()) {
                    Some(spec) => {
                        debug!(plugin = %spec.name(), state = %spec.state(), "Descriptor read");
                        self.specs.push(spec);
                    }
                    None => debug!(path = %file.display(), "Skipped (not one of our plugins)"),
                }
            }
        }
        self.apply_settings();
        self.resolve_dependencies();
        self.emit_plugins_changed();
        Ok(())
    }

    fn apply_settings(&mut self) {
        for spec in &mut self.specs {
            if self.settings.is_force_enabled(spec.name()) {
                spec.set_enabled_by_settings(true);
            } else if self.settings.is_disabled(spec.name()) {
                if spec.is_required() {
                    warn!(plugin = %spec.name(), "Ignoring attempt to disable a required plugin");
                } else {
                    spec.set_enabled_by_settings(false);
                }
            }
        }
    }

    /// Bind each spec's declared dependencies to specs in the table and
    /// advance resolvable specs to `Resolved`. Effectively disabled specs
    /// are left at `Read`; their dependents fail at load time.
    fn resolve_dependencies(&mut self) {
        let resolutions: Vec<Resolution> = self
            .specs
            .iter()
            .map(|spec| self.resolve_one(spec))
            .collect();
        for (spec, resolution) in self.specs.iter_mut().zip(resolutions) {
            match resolution {
                Resolution::Skip => {}
                Resolution::Error(message) => spec.report_error(message),
                Resolution::Resolved(bindings) => spec.resolve(bindings),
            }
        }
    }

    fn resolve_one(&self, spec: &PluginSpec) -> Resolution {
        if spec.state() != PluginState::Read || spec.has_error() {
            return Resolution::Skip;
        }
        if !spec.is_effectively_enabled() {
            debug!(plugin = %spec.name(), "Plugin disabled, not resolving");
            return Resolution::Skip;
        }
        if version_compare(spec.compat_version(), spec.version()) == Ordering::Greater {
            return Resolution::Error(format!(
                "Compatibility version \"{}\" is greater than version \"{}\"",
                spec.compat_version(),
                spec.version()
            ));
        }
        let mut bindings = HashMap::new();
        for dep in spec.dependencies() {
            let found = self
                .specs
                .iter()
                .position(|candidate| candidate.provides(&dep.name, &dep.version));
            match found {
                Some(dep_index) => {
                    bindings.insert(dep.clone(), dep_index);
                }
                None if dep.dep_type == DependencyType::Required => {
                    return Resolution::Error(format!(
                        "Could not resolve dependency \"{} ({})\"",
                        dep.name, dep.version
                    ));
                }
                None => {
                    debug!(plugin = %spec.name(), dependency = %dep, "Soft dependency not present");
                }
            }
        }
        Resolution::Resolved(bindings)
    }

    /// The load queue: every discovered plugin, ordered so that each one
    /// appears after its non-test dependencies. Building the queue records
    /// cycle errors on the affected specs.
    pub fn load_queue(&mut self) -> Vec<&PluginSpec> {
        let queue = self.build_queue();
        queue.into_iter().map(|index| &self.specs[index]).collect()
    }

    fn build_queue(&mut self) -> Vec<usize> {
        let mut queue = Vec::new();
        for index in 0..self.specs.len() {
            let mut path = Vec::new();
            self.enqueue(index, &mut queue, &mut path);
        }
        // A failed traversal leaves its participants unqueued; append them
        // so the queue always enumerates every spec. Their errors make the
        // driver skip them.
        for index in 0..self.specs.len() {
            if !queue.contains(&index) {
                queue.push(index);
            }
        }
        queue
    }

    fn enqueue(&mut self, index: usize, queue: &mut Vec<usize>, path: &mut Vec<usize>) -> bool {
        if queue.contains(&index) {
            return true;
        }
        if let Some(first) = path.iter().position(|&p| p == index) {
            let mut message = String::from("Circular dependency detected:\n");
            for &p in &path[first..] {
                message.push_str(&format!(
                    "{} ({}) depends on\n",
                    self.specs[p].name(),
                    self.specs[p].version()
                ));
            }
            message.push_str(&format!(
                "{} ({})",
                self.specs[index].name(),
                self.specs[index].version()
            ));
            self.specs[index].report_error(message);
            return false;
        }
        path.push(index);
        if matches!(
            self.specs[index].state(),
            PluginState::Invalid | PluginState::Read
        ) {
            // Unresolved; enqueue anyway, the driver skips it by state.
            queue.push(index);
            return true;
        }
        let dependencies: Vec<usize> = self.specs[index]
            .dependencies()
            .iter()
            .filter(|dep| dep.dep_type != DependencyType::Test)
            .filter_map(|dep| self.specs[index].dependency_specs().get(dep).copied())
            .collect();
        for dep_index in dependencies {
            if !self.enqueue(dep_index, queue, path) {
                let message = format!(
                    "cannot load plugin because dependency failed to load: {} ({})\nReason: {}",
                    self.specs[dep_index].name(),
                    self.specs[dep_index].version(),
                    self.specs[dep_index].error_string().unwrap_or("")
                );
                self.specs[index].report_error(message);
                return false;
            }
        }
        queue.push(index);
        true
    }

    /// Advance `specs[index]` to `dest_state`, honoring the state
    /// precondition, the error short-circuit, the disabled short-circuit and
    /// the dependency gate.
    async fn load_plugin(&mut self, index: usize, dest_state: PluginState) {
        let spec = &self.specs[index];
        if spec.has_error() || Some(spec.state()) != dest_state.predecessor() {
            return;
        }
        if dest_state == PluginState::Loaded && !spec.is_effectively_enabled() {
            debug!(plugin = %spec.name(), "Plugin disabled, skipping load");
            return;
        }

        match dest_state {
            PluginState::Running => {
                self.specs[index].initialize_extensions().await;
                return;
            }
            PluginState::Deleted => {
                self.specs[index].kill();
                return;
            }
            _ => {}
        }

        // Required dependencies must have made the same transition already.
        if matches!(dest_state, PluginState::Loaded | PluginState::Initialized) {
            for dep_index in self.specs[index].required_dependency_indices() {
                if self.specs[dep_index].state() != dest_state {
                    let message = format!(
                        "cannot load plugin because dependency failed to load: {}({})\nReason: {}",
                        self.specs[dep_index].name(),
                        self.specs[dep_index].version(),
                        self.specs[dep_index].error_string().unwrap_or("")
                    );
                    self.specs[index].report_error(message);
                    return;
                }
            }
        }

        match dest_state {
            PluginState::Loaded => {
                self.specs[index].load_library();
            }
            PluginState::Initialized => {
                self.specs[index].initialize_plugin().await;
            }
            PluginState::Stopped => {
                if let ShutdownFlag::Asynchronous(receiver) = self.specs[index].stop().await {
                    info!(plugin = %self.specs[index].name(), "Plugin is shutting down asynchronously");
                    self.shutdown_pending.push(receiver);
                }
            }
            _ => {}
        }
    }

    /// Drive every plugin through `Loaded`, `Initialized` and `Running` in
    /// queue order, then drain the delayed-initialize queue.
    ///
    /// Failures never abort the whole startup: a failed plugin and its
    /// transitive dependents are left behind with errors recorded, everyone
    /// else proceeds.
    pub async fn load_plugins(&mut self) {
        let queue = self.build_queue();
        for &index in &queue {
            self.load_plugin(index, PluginState::Loaded).await;
        }
        for &index in &queue {
            self.load_plugin(index, PluginState::Initialized).await;
        }
        for &index in &queue {
            self.load_plugin(index, PluginState::Running).await;
        }
        for &index in &queue {
            if self.specs[index].state() == PluginState::Running {
                self.delayed_initialize_queue.push_back(index);
            } else {
                // Startup failed somewhere on the way; release whatever got
                // loaded.
                self.specs[index].kill();
            }
        }
        self.emit_plugins_changed();
        self.start_delayed_initialize().await;
    }

    async fn start_delayed_initialize(&mut self) {
        while let Some(index) = self.delayed_initialize_queue.pop_front() {
            let worked = self.specs[index].delayed_initialize().await;
            if worked {
                tokio::time::sleep(DELAYED_INITIALIZE_INTERVAL).await;
            }
        }
        self.initialization_done = true;
        info!("Plugin initialization done");
        for subscriber in &self.initialization_done_subscribers {
            subscriber();
        }
    }

    /// Stop every plugin in reverse queue order, wait for asynchronous
    /// finishers, then delete every plugin in reverse queue order.
    pub async fn shutdown(&mut self) {
        let queue = self.build_queue();
        for &index in queue.iter().rev() {
            self.load_plugin(index, PluginState::Stopped).await;
        }
        let pending = std::mem::take(&mut self.shutdown_pending);
        if !pending.is_empty() {
            info!(count = pending.len(), "Waiting for asynchronous shutdown to finish");
            // A dropped completion handle counts as finished; only a handle
            // kept alive forever blocks here, which is a plugin contract
            // violation the host does not compensate for.
            futures::future::join_all(pending).await;
        }
        for &index in queue.iter().rev() {
            self.load_plugin(index, PluginState::Deleted).await;
        }
    }

    fn emit_plugins_changed(&self) {
        for subscriber in &self.plugins_changed_subscribers {
            subscriber();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::FactoryLoaderHost;
    use async_trait::async_trait;
    use coral_plugin_api::{Plugin, PluginError};
    use std::fs;
    use std::path::Path;

    const IID: &str = "org.coral.plugin/1";

    struct NullPlugin;

    #[async_trait]
    impl Plugin for NullPlugin {
        async fn initialize(&mut self, _arguments: &[String]) -> std::result::Result<(), PluginError> {
            Ok(())
        }
    }

    fn write_descriptor(dir: &Path, file: &str, name: &str, version: &str, extra: &str) {
        let meta = format!(r#"{{"Name": "{name}", "Version": "{version}"{extra}}}"#);
        let json = format!(r#"{{"IID": "{IID}", "MetaData": {meta}}}"#);
        fs::write(dir.join(file), json).unwrap();
    }

    fn manager_for(dir: &Path, names: &[&str]) -> PluginManager {
        let mut host = FactoryLoaderHost::new();
        for name in names {
            host.register(*name, || Ok(Box::new(NullPlugin)));
        }
        let mut manager = PluginManager::new(IID, Box::new(host));
        manager.read_plugins(&[dir.to_path_buf()]).unwrap();
        manager
    }

    #[test]
    fn test_queue_orders_dependencies_first() {
        let dir = tempfile::tempdir().unwrap();
        // File names reverse the dependency order on purpose.
        write_descriptor(
            dir.path(),
            "a.json",
            "top",
            "1.0",
            r#", "Dependencies": [{"Name": "base", "Version": "1.0"}]"#,
        );
        write_descriptor(dir.path(), "b.json", "base", "1.0", "");

        let mut manager = manager_for(dir.path(), &["top", "base"]);
        let queue: Vec<String> = manager
            .load_queue()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(queue, vec!["base".to_string(), "top".to_string()]);
    }

    #[test]
    fn test_unresolvable_required_dependency() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(
            dir.path(),
            "a.json",
            "top",
            "1.0",
            r#", "Dependencies": [{"Name": "ghost", "Version": "1.0"}]"#,
        );

        let manager = manager_for(dir.path(), &["top"]);
        let spec = manager.find_plugin("top").unwrap();
        assert_eq!(spec.state(), PluginState::Read);
        assert_eq!(
            spec.error_string(),
            Some("Could not resolve dependency \"ghost (1.0)\"")
        );
    }

    #[test]
    fn test_version_range_binding() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(
            dir.path(),
            "a.json",
            "top",
            "1.0",
            r#", "Dependencies": [{"Name": "base", "Version": "2.1"}]"#,
        );
        write_descriptor(
            dir.path(),
            "b.json",
            "base",
            "2.4",
            r#", "CompatVersion": "2.0""#,
        );

        let manager = manager_for(dir.path(), &["top", "base"]);
        let spec = manager.find_plugin("top").unwrap();
        assert!(!spec.has_error());
        assert_eq!(spec.state(), PluginState::Resolved);
        assert_eq!(spec.dependency_specs().len(), 1);
    }

    #[test]
    fn test_compat_version_greater_than_version_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // CompatVersion is grammatically valid, just greater than Version,
        // so the reader accepts it and resolution rejects it.
        write_descriptor(
            dir.path(),
            "a.json",
            "odd",
            "1.0",
            r#", "CompatVersion": "2.0""#,
        );

        let manager = manager_for(dir.path(), &["odd"]);
        let spec = manager.find_plugin("odd").unwrap();
        assert_eq!(
            spec.error_string(),
            Some("Compatibility version \"2.0\" is greater than version \"1.0\"")
        );
    }

    #[test]
    fn test_cycle_is_annotated_with_path() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(
            dir.path(),
            "a.json",
            "alpha",
            "1.0",
            r#", "Dependencies": [{"Name": "beta", "Version": "1.0"}]"#,
        );
        write_descriptor(
            dir.path(),
            "b.json",
            "beta",
            "1.0",
            r#", "Dependencies": [{"Name": "alpha", "Version": "1.0"}]"#,
        );

        let mut manager = manager_for(dir.path(), &["alpha", "beta"]);
        let queue_len = manager.load_queue().len();
        assert_eq!(queue_len, 2);

        let alpha = manager.find_plugin("alpha").unwrap();
        let error = alpha.error_string().unwrap();
        assert!(error.starts_with("Circular dependency detected:"));
        assert!(error.contains("alpha (1.0) depends on"));
        assert!(error.contains("beta (1.0) depends on"));
        assert!(error.ends_with("alpha (1.0)"));
    }

    #[test]
    fn test_required_plugin_cannot_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(dir.path(), "a.json", "core", "1.0", r#", "Required": true"#);

        let mut host = FactoryLoaderHost::new();
        host.register("core", || Ok(Box::new(NullPlugin)));
        let mut settings = PluginSettings::default();
        settings.set_enabled("core", false, true);

        let mut manager = PluginManager::new(IID, Box::new(host)).with_settings(settings);
        manager.read_plugins(&[dir.path().to_path_buf()]).unwrap();

        let spec = manager.find_plugin("core").unwrap();
        assert!(spec.is_enabled_by_settings());
        assert_eq!(spec.state(), PluginState::Resolved);
    }

    #[test]
    fn test_force_enabled_experimental_resolves() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(
            dir.path(),
            "a.json",
            "lab",
            "1.0",
            r#", "Experimental": true"#,
        );

        let mut host = FactoryLoaderHost::new();
        host.register("lab", || Ok(Box::new(NullPlugin)));
        let mut settings = PluginSettings::default();
        settings.set_enabled("lab", true, false);

        let mut manager = PluginManager::new(IID, Box::new(host)).with_settings(settings);
        manager.read_plugins(&[dir.path().to_path_buf()]).unwrap();

        let spec = manager.find_plugin("lab").unwrap();
        assert!(spec.is_enabled_by_settings());
        assert_eq!(spec.state(), PluginState::Resolved);
    }

    #[test]
    fn test_add_arguments_to_unknown_plugin() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager_for(dir.path(), &[]);
        let err = manager.add_arguments("ghost", ["-x"]).unwrap_err();
        assert_eq!(err.to_string(), "Plugin not found: ghost");
    }

    #[test]
    fn test_scan_missing_directory_fails() {
        let mut manager = PluginManager::new(IID, Box::new(FactoryLoaderHost::new()));
        let missing = PathBuf::from("/nonexistent/coral/plugins");
        assert!(manager.read_plugins(&[missing]).is_err());
    }
}
