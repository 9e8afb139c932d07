//! Plugin descriptors
//!
//! A [`PluginSpec`] is the host-side record for one discovered plugin: the
//! metadata read from its descriptor file, its declared dependencies, its
//! position in the lifecycle state machine, and ownership of the loader
//! resource and the loaded instance.

use crate::host;
use crate::loader::{LoaderHost, PluginLoader};
use crate::version::{is_valid_version, range_matches};
use coral_plugin_api::{Plugin, ShutdownFlag};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const KEY_IID: &str = "IID";
const KEY_METADATA: &str = "MetaData";
const KEY_NAME: &str = "Name";
const KEY_VERSION: &str = "Version";
const KEY_COMPAT_VERSION: &str = "CompatVersion";
const KEY_REQUIRED: &str = "Required";
const KEY_EXPERIMENTAL: &str = "Experimental";
const KEY_DISABLED_BY_DEFAULT: &str = "DisabledByDefault";
const KEY_VENDOR: &str = "Vendor";
const KEY_COPYRIGHT: &str = "Copyright";
const KEY_LICENSE: &str = "License";
const KEY_DESCRIPTION: &str = "Description";
const KEY_LONG_DESCRIPTION: &str = "LongDescription";
const KEY_URL: &str = "Url";
const KEY_CATEGORY: &str = "Category";
const KEY_REVISION: &str = "Revision";
const KEY_PLATFORM: &str = "Platform";
const KEY_DEPENDENCIES: &str = "Dependencies";
const KEY_ARGUMENTS: &str = "Arguments";
const KEY_PARAMETER: &str = "Parameter";
const KEY_TYPE: &str = "Type";

const DEP_TYPE_REQUIRED: &str = "required";
const DEP_TYPE_OPTIONAL: &str = "optional";
const DEP_TYPE_TEST: &str = "test";

/// Position of a plugin in the lifecycle state machine.
///
/// The state advances monotonically during startup and again monotonically
/// during shutdown; a failed transition stops the plugin at its current
/// state and records the error on its spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PluginState {
    /// Descriptor created but not (successfully) parsed
    Invalid,
    /// Descriptor parsed and validated
    Read,
    /// Dependencies bound to other descriptors
    Resolved,
    /// Plugin instance materialized by the loader
    Loaded,
    /// `initialize` ran successfully
    Initialized,
    /// `extensions_initialized` ran; the plugin is live
    Running,
    /// `about_to_shutdown` was delivered
    Stopped,
    /// Instance and loader released
    Deleted,
}

impl PluginState {
    pub(crate) fn predecessor(self) -> Option<PluginState> {
        match self {
            PluginState::Invalid => None,
            PluginState::Read => Some(PluginState::Invalid),
            PluginState::Resolved => Some(PluginState::Read),
            PluginState::Loaded => Some(PluginState::Resolved),
            PluginState::Initialized => Some(PluginState::Loaded),
            PluginState::Running => Some(PluginState::Initialized),
            PluginState::Stopped => Some(PluginState::Running),
            PluginState::Deleted => Some(PluginState::Stopped),
        }
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginState::Invalid => "invalid",
            PluginState::Read => "read",
            PluginState::Resolved => "resolved",
            PluginState::Loaded => "loaded",
            PluginState::Initialized => "initialized",
            PluginState::Running => "running",
            PluginState::Stopped => "stopped",
            PluginState::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// How strongly a plugin depends on another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DependencyType {
    /// The dependency must resolve and reach each lifecycle state first.
    #[default]
    Required,
    /// Loaded first when present; silently skipped when absent.
    Optional,
    /// Only force-loaded for test runs; excluded from load ordering.
    Test,
}

/// One declared dependency of a plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PluginDependency {
    /// Name of the plugin depended upon
    pub name: String,
    /// Wanted version; empty means any
    pub version: String,
    /// Dependency strength
    pub dep_type: DependencyType,
}

impl fmt::Display for PluginDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.version)
    }
}

/// Declared command-line option of a plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginArgumentDescription {
    /// Option name, e.g. `-trace`
    pub name: String,
    /// Value placeholder shown in help output, if the option takes one
    pub parameter: String,
    /// Help text
    pub description: String,
}

/// The host-side record for one plugin.
pub struct PluginSpec {
    name: String,
    version: String,
    compat_version: String,
    vendor: String,
    category: String,
    description: String,
    long_description: String,
    url: String,
    copyright: String,
    license: String,
    revision: String,
    location: PathBuf,
    file_path: PathBuf,
    platform_pattern: Option<Regex>,
    required: bool,
    experimental: bool,
    enabled_by_default: bool,
    enabled_by_settings: bool,
    meta_data: Value,
    state: PluginState,
    dependencies: Vec<PluginDependency>,
    dependency_specs: HashMap<PluginDependency, usize>,
    arguments: Vec<String>,
    argument_descriptions: Vec<PluginArgumentDescription>,
    error_string: Option<String>,
    instance: Option<Box<dyn Plugin>>,
    loader: Option<Box<dyn PluginLoader>>,
}

impl fmt::Debug for PluginSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginSpec")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("state", &self.state)
            .field("error_string", &self.error_string)
            .finish()
    }
}

fn msg_value_missing(key: &str) -> String {
    format!("\"{key}\" is missing")
}

fn msg_value_is_empty(key: &str) -> String {
    format!("\"{key}\" is empty")
}

fn msg_not_a_string(key: &str) -> String {
    format!("Value for key \"{key}\" is not a string")
}

fn msg_not_a_bool(key: &str) -> String {
    format!("Value for key \"{key}\" is not a bool")
}

fn msg_not_an_object_array(key: &str) -> String {
    format!("Value for key \"{key}\" is not an array of objects")
}

fn msg_not_a_multiline_string(key: &str) -> String {
    format!("Value for key \"{key}\" is not a string and not an array of strings")
}

fn msg_invalid_format(key: &str, content: &str) -> String {
    format!("Value \"{content}\" for key \"{key}\" has invalid format")
}

/// A string, or an array of strings joined with newlines.
fn read_multi_line_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let lines: Option<Vec<&str>> = items.iter().map(Value::as_str).collect();
            lines.map(|l| l.join("\n"))
        }
        _ => None,
    }
}

fn opt_string(meta: &Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match meta.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(msg_not_a_string(key)),
    }
}

fn opt_bool(meta: &Map<String, Value>, key: &str) -> Result<bool, String> {
    match meta.get(key) {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(msg_not_a_bool(key)),
    }
}

fn read_single_line(meta: &Map<String, Value>, key: &str, slot: &mut String) -> Result<(), String> {
    if let Some(value) = opt_string(meta, key)? {
        *slot = value;
    }
    Ok(())
}

fn read_multi_line(meta: &Map<String, Value>, key: &str, slot: &mut String) -> Result<(), String> {
    match meta.get(key) {
        None => {}
        Some(value) => {
            *slot = read_multi_line_string(value).ok_or_else(|| msg_not_a_multiline_string(key))?;
        }
    }
    Ok(())
}

enum MetaDataOutcome {
    Ok,
    NotAPlugin,
    Invalid,
}

impl PluginSpec {
    fn new() -> Self {
        Self {
            name: String::new(),
            version: String::new(),
            compat_version: String::new(),
            vendor: String::new(),
            category: String::new(),
            description: String::new(),
            long_description: String::new(),
            url: String::new(),
            copyright: String::new(),
            license: String::new(),
            revision: String::new(),
            location: PathBuf::new(),
            file_path: PathBuf::new(),
            platform_pattern: None,
            required: false,
            experimental: false,
            enabled_by_default: true,
            enabled_by_settings: true,
            meta_data: Value::Null,
            state: PluginState::Invalid,
            dependencies: Vec::new(),
            dependency_specs: HashMap::new(),
            arguments: Vec::new(),
            argument_descriptions: Vec::new(),
            error_string: None,
            instance: None,
            loader: None,
        }
    }

    /// Read the descriptor at `path`.
    ///
    /// Returns `None` when the file is not a plugin of ours (no `IID`, or an
    /// `IID` differing from `plugin_iid`); that is a silent rejection, not
    /// an error. Files that are ours but fail validation yield a spec with
    /// the error recorded and `state` still [`PluginState::Invalid`].
    pub fn read(path: &Path, plugin_iid: &str, host: &dyn LoaderHost) -> Option<PluginSpec> {
        let mut spec = PluginSpec::new();
        spec.file_path = path.to_path_buf();
        spec.location = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut loader = match host.open(path) {
            Ok(loader) => loader,
            Err(e) => {
                spec.report_error(format!("{}: {}", path.display(), e));
                return Some(spec);
            }
        };

        let document = loader.metadata().clone();
        match spec.read_meta_data(&document, plugin_iid) {
            MetaDataOutcome::NotAPlugin => return None,
            MetaDataOutcome::Invalid => {
                spec.loader = Some(loader);
                return Some(spec);
            }
            MetaDataOutcome::Ok => {}
        }

        spec.loader = Some(loader);
        spec.state = PluginState::Read;
        Some(spec)
    }

    fn read_meta_data(&mut self, document: &Value, plugin_iid: &str) -> MetaDataOutcome {
        let iid = document.get(KEY_IID).and_then(Value::as_str);
        let Some(iid) = iid else {
            debug!(path = %self.file_path.display(), "Not a plugin (no string IID found)");
            return MetaDataOutcome::NotAPlugin;
        };
        if iid != plugin_iid {
            debug!(path = %self.file_path.display(), iid, "Plugin ignored (IID does not match)");
            return MetaDataOutcome::NotAPlugin;
        }

        let Some(meta) = document.get(KEY_METADATA).and_then(Value::as_object) else {
            return self.report_invalid("Plugin meta data not found");
        };
        self.meta_data = Value::Object(meta.clone());

        match meta.get(KEY_NAME) {
            None => return self.report_invalid(msg_value_missing(KEY_NAME)),
            Some(Value::String(name)) if name.is_empty() => {
                return self.report_invalid(msg_value_is_empty(KEY_NAME));
            }
            Some(Value::String(name)) => self.name = name.clone(),
            Some(_) => return self.report_invalid(msg_not_a_string(KEY_NAME)),
        }

        match meta.get(KEY_VERSION) {
            None => return self.report_invalid(msg_value_missing(KEY_VERSION)),
            Some(Value::String(version)) => self.version = version.clone(),
            Some(_) => return self.report_invalid(msg_not_a_string(KEY_VERSION)),
        }
        if !is_valid_version(&self.version) {
            return self.report_invalid(msg_invalid_format(KEY_VERSION, &self.version));
        }

        match opt_string(meta, KEY_COMPAT_VERSION) {
            Err(e) => return self.report_invalid(e),
            Ok(Some(compat)) => {
                if !is_valid_version(&compat) {
                    return self.report_invalid(msg_invalid_format(KEY_COMPAT_VERSION, &compat));
                }
                self.compat_version = compat;
            }
            Ok(None) => self.compat_version = self.version.clone(),
        }

        self.required = match opt_bool(meta, KEY_REQUIRED) {
            Ok(b) => b,
            Err(e) => return self.report_invalid(e),
        };
        self.experimental = match opt_bool(meta, KEY_EXPERIMENTAL) {
            Ok(b) => b,
            Err(e) => return self.report_invalid(e),
        };
        let disabled_by_default = match opt_bool(meta, KEY_DISABLED_BY_DEFAULT) {
            Ok(b) => b,
            Err(e) => return self.report_invalid(e),
        };
        self.enabled_by_default = !disabled_by_default && !self.experimental;
        self.enabled_by_settings = self.enabled_by_default;

        if let Err(e) = read_single_line(meta, KEY_VENDOR, &mut self.vendor) {
            return self.report_invalid(e);
        }
        if let Err(e) = read_single_line(meta, KEY_COPYRIGHT, &mut self.copyright) {
            return self.report_invalid(e);
        }
        if let Err(e) = read_multi_line(meta, KEY_DESCRIPTION, &mut self.description) {
            return self.report_invalid(e);
        }
        if let Err(e) = read_multi_line(meta, KEY_LONG_DESCRIPTION, &mut self.long_description) {
            return self.report_invalid(e);
        }
        if let Err(e) = read_single_line(meta, KEY_URL, &mut self.url) {
            return self.report_invalid(e);
        }
        if let Err(e) = read_single_line(meta, KEY_CATEGORY, &mut self.category) {
            return self.report_invalid(e);
        }
        if let Err(e) = read_single_line(meta, KEY_REVISION, &mut self.revision) {
            return self.report_invalid(e);
        }
        if let Err(e) = read_multi_line(meta, KEY_LICENSE, &mut self.license) {
            return self.report_invalid(e);
        }

        let platform = match opt_string(meta, KEY_PLATFORM) {
            Ok(p) => p.unwrap_or_default().trim().to_string(),
            Err(e) => return self.report_invalid(e),
        };
        if !platform.is_empty() {
            match Regex::new(&platform) {
                Ok(re) => self.platform_pattern = Some(re),
                Err(e) => {
                    return self.report_invalid(format!(
                        "Invalid platform specification \"{platform}\": {e}"
                    ));
                }
            }
        }

        if let Err(e) = self.read_dependencies(meta) {
            return self.report_invalid(e);
        }
        if let Err(e) = self.read_argument_descriptions(meta) {
            return self.report_invalid(e);
        }

        MetaDataOutcome::Ok
    }

    fn read_dependencies(&mut self, meta: &Map<String, Value>) -> Result<(), String> {
        let Some(value) = meta.get(KEY_DEPENDENCIES) else {
            return Ok(());
        };
        let Some(entries) = value.as_array() else {
            return Err(msg_not_an_object_array(KEY_DEPENDENCIES));
        };
        for entry in entries {
            let Some(object) = entry.as_object() else {
                return Err(msg_not_an_object_array(KEY_DEPENDENCIES));
            };
            let mut dep = PluginDependency::default();

            match object.get(KEY_NAME) {
                None => return Err(format!("Dependency: {}", msg_value_missing(KEY_NAME))),
                Some(Value::String(name)) => dep.name = name.clone(),
                Some(_) => return Err(format!("Dependency: {}", msg_not_a_string(KEY_NAME))),
            }

            match opt_string(object, KEY_VERSION) {
                Err(e) => return Err(format!("Dependency: {e}")),
                Ok(Some(version)) => {
                    if !version.is_empty() && !is_valid_version(&version) {
                        return Err(format!(
                            "Dependency: {}",
                            msg_invalid_format(KEY_VERSION, &version)
                        ));
                    }
                    dep.version = version;
                }
                Ok(None) => {}
            }

            match opt_string(object, KEY_TYPE) {
                Err(e) => return Err(format!("Dependency: {e}")),
                Ok(Some(type_value)) => {
                    dep.dep_type = match type_value.to_lowercase().as_str() {
                        DEP_TYPE_REQUIRED => DependencyType::Required,
                        DEP_TYPE_OPTIONAL => DependencyType::Optional,
                        DEP_TYPE_TEST => DependencyType::Test,
                        _ => {
                            return Err(format!(
                                "Dependency: \"{KEY_TYPE}\" must be \"{DEP_TYPE_REQUIRED}\", \
                                 \"{DEP_TYPE_OPTIONAL}\" or \"{DEP_TYPE_TEST}\" (is \"{type_value}\")."
                            ));
                        }
                    };
                }
                Ok(None) => {}
            }

            self.dependencies.push(dep);
        }
        Ok(())
    }

    fn read_argument_descriptions(&mut self, meta: &Map<String, Value>) -> Result<(), String> {
        let Some(value) = meta.get(KEY_ARGUMENTS) else {
            return Ok(());
        };
        let Some(entries) = value.as_array() else {
            return Err(msg_not_an_object_array(KEY_ARGUMENTS));
        };
        for entry in entries {
            let Some(object) = entry.as_object() else {
                return Err(msg_not_an_object_array(KEY_ARGUMENTS));
            };
            let mut arg = PluginArgumentDescription::default();

            match object.get(KEY_NAME) {
                None => return Err(format!("Argument: {}", msg_value_missing(KEY_NAME))),
                Some(Value::String(name)) if name.is_empty() => {
                    return Err(format!("Argument: {}", msg_value_is_empty(KEY_NAME)));
                }
                Some(Value::String(name)) => arg.name = name.clone(),
                Some(_) => return Err(format!("Argument: {}", msg_not_a_string(KEY_NAME))),
            }

            match opt_string(object, KEY_PARAMETER) {
                Err(e) => return Err(format!("Argument: {e}")),
                Ok(parameter) => arg.parameter = parameter.unwrap_or_default(),
            }
            match opt_string(object, KEY_DESCRIPTION) {
                Err(e) => return Err(format!("Argument: {e}")),
                Ok(description) => arg.description = description.unwrap_or_default(),
            }

            self.argument_descriptions.push(arg);
        }
        Ok(())
    }

    fn report_invalid(&mut self, message: impl Into<String>) -> MetaDataOutcome {
        self.report_error(message);
        MetaDataOutcome::Invalid
    }

    /// Record an error on this spec. The first error wins; later reports on
    /// an already erroring spec are dropped.
    pub(crate) fn report_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(plugin = %self.name, path = %self.file_path.display(), error = %message, "Plugin error");
        if self.error_string.is_none() {
            self.error_string = Some(message);
        }
    }

    /// Bind this spec's dependencies and advance to
    /// [`PluginState::Resolved`]. `bindings` maps declared dependencies to
    /// indices into the manager's spec table.
    pub(crate) fn resolve(&mut self, bindings: HashMap<PluginDependency, usize>) {
        self.dependency_specs = bindings;
        self.state = PluginState::Resolved;
    }

    /// Materialize the plugin instance through the loader.
    pub(crate) fn load_library(&mut self) -> bool {
        if self.has_error() {
            return false;
        }
        if self.state != PluginState::Resolved {
            if self.state == PluginState::Loaded {
                return true;
            }
            self.report_error("Loading the library failed because state != Resolved");
            return false;
        }
        let Some(loader) = self.loader.as_mut() else {
            self.report_error("Internal error: have no loader to load the plugin");
            return false;
        };
        match loader.load() {
            Ok(instance) => {
                debug!(plugin = %self.name, "Plugin loaded");
                self.instance = Some(instance);
                self.state = PluginState::Loaded;
                true
            }
            Err(e) => {
                let message = format!("{}: {}", self.file_path.display(), e);
                self.report_error(message);
                false
            }
        }
    }

    /// Deliver `initialize` to the instance.
    pub(crate) async fn initialize_plugin(&mut self) -> bool {
        if self.has_error() {
            return false;
        }
        if self.state != PluginState::Loaded {
            if self.state == PluginState::Initialized {
                return true;
            }
            self.report_error("Initializing the plugin failed because state != Loaded");
            return false;
        }
        let Some(instance) = self.instance.as_mut() else {
            self.report_error("Internal error: have no plugin instance to initialize");
            return false;
        };
        match instance.initialize(&self.arguments).await {
            Ok(()) => {
                self.state = PluginState::Initialized;
                true
            }
            Err(e) => {
                self.report_error(format!("Plugin initialization failed: {e}"));
                false
            }
        }
    }

    /// Deliver `extensions_initialized` to the instance.
    pub(crate) async fn initialize_extensions(&mut self) -> bool {
        if self.has_error() {
            return false;
        }
        if self.state != PluginState::Initialized {
            if self.state == PluginState::Running {
                return true;
            }
            self.report_error("Cannot perform extensionsInitialized because state != Initialized");
            return false;
        }
        let Some(instance) = self.instance.as_mut() else {
            self.report_error("Internal error: have no plugin instance to perform extensionsInitialized");
            return false;
        };
        instance.extensions_initialized().await;
        self.state = PluginState::Running;
        true
    }

    /// Deliver `delayed_initialize` to the instance. Returns the plugin's
    /// "did substantive work" hint.
    pub(crate) async fn delayed_initialize(&mut self) -> bool {
        if self.has_error() || self.state != PluginState::Running {
            return false;
        }
        let Some(instance) = self.instance.as_mut() else {
            self.report_error("Internal error: have no plugin instance to perform delayedInitialize");
            return false;
        };
        instance.delayed_initialize().await
    }

    /// Deliver `about_to_shutdown` and advance to
    /// [`PluginState::Stopped`].
    pub(crate) async fn stop(&mut self) -> ShutdownFlag {
        let Some(instance) = self.instance.as_mut() else {
            return ShutdownFlag::Synchronous;
        };
        self.state = PluginState::Stopped;
        instance.about_to_shutdown().await
    }

    /// Release the instance and the loader resource.
    pub(crate) fn kill(&mut self) {
        if self.instance.is_none() {
            return;
        }
        self.instance = None;
        if let Some(mut loader) = self.loader.take() {
            loader.unload();
        }
        self.state = PluginState::Deleted;
    }

    /// Append runtime arguments addressed to this plugin; they are handed to
    /// `initialize`.
    pub fn add_arguments<I, S>(&mut self, arguments: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
    }

    /// Whether this plugin carrying `(name, compat_version ..= version)`
    /// satisfies a dependency on `dep_name` at `wanted`.
    pub fn provides(&self, dep_name: &str, wanted: &str) -> bool {
        if dep_name != self.name {
            return false;
        }
        range_matches(&self.compat_version, wanted, &self.version)
    }

    /// Whether the host platform passes this plugin's platform pattern.
    pub fn is_available_for_host_platform(&self) -> bool {
        match &self.platform_pattern {
            None => true,
            Some(re) => re.is_match(&host::platform_name()),
        }
    }

    /// Platform match AND enabled in settings. Experimental plugins start
    /// out disabled in settings, so an explicit opt-in is part of this.
    pub fn is_effectively_enabled(&self) -> bool {
        self.is_available_for_host_platform() && self.enabled_by_settings
    }

    pub(crate) fn set_enabled_by_settings(&mut self, enabled: bool) {
        self.enabled_by_settings = enabled;
    }

    /// Indices of the resolved Required dependencies, in declaration order.
    pub(crate) fn required_dependency_indices(&self) -> Vec<usize> {
        self.dependencies
            .iter()
            .filter(|d| d.dep_type == DependencyType::Required)
            .filter_map(|d| self.dependency_specs.get(d).copied())
            .collect()
    }

    /// Plugin name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Plugin version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Oldest version this plugin is a drop-in replacement for. Defaults to
    /// [`version`](Self::version).
    pub fn compat_version(&self) -> &str {
        &self.compat_version
    }

    /// Vendor.
    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    /// Display category for UIs grouping plugins.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// One-line description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Multi-paragraph description.
    pub fn long_description(&self) -> &str {
        &self.long_description
    }

    /// Homepage URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Copyright line.
    pub fn copyright(&self) -> &str {
        &self.copyright
    }

    /// License text.
    pub fn license(&self) -> &str {
        &self.license
    }

    /// VCS revision the plugin was built from, if the descriptor carries one.
    pub fn revision(&self) -> &str {
        &self.revision
    }

    /// Directory the descriptor was found in.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Path of the descriptor file.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// The platform gate pattern, if any.
    pub fn platform_pattern(&self) -> Option<&str> {
        self.platform_pattern.as_ref().map(|re| re.as_str())
    }

    /// Whether the plugin is required (users cannot disable it).
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Whether the plugin is experimental (disabled unless opted in).
    pub fn is_experimental(&self) -> bool {
        self.experimental
    }

    /// Enablement default from the descriptor.
    pub fn is_enabled_by_default(&self) -> bool {
        self.enabled_by_default
    }

    /// Enablement after user settings were applied.
    pub fn is_enabled_by_settings(&self) -> bool {
        self.enabled_by_settings
    }

    /// The raw `MetaData` object from the descriptor.
    pub fn meta_data(&self) -> &Value {
        &self.meta_data
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PluginState {
        self.state
    }

    /// Declared dependencies, in declaration order.
    pub fn dependencies(&self) -> &[PluginDependency] {
        &self.dependencies
    }

    /// Resolved dependencies: declared dependency → index into the
    /// manager's plugin table. Unresolved Optional/Test dependencies have no
    /// entry.
    pub fn dependency_specs(&self) -> &HashMap<PluginDependency, usize> {
        &self.dependency_specs
    }

    /// Runtime arguments accumulated for this plugin.
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Declared command-line options.
    pub fn argument_descriptions(&self) -> &[PluginArgumentDescription] {
        &self.argument_descriptions
    }

    /// The recorded error, if any transition against this spec failed.
    pub fn error_string(&self) -> Option<&str> {
        self.error_string.as_deref()
    }

    /// Whether this spec is in error.
    pub fn has_error(&self) -> bool {
        self.error_string.is_some()
    }

    /// The loaded plugin instance, if the spec reached
    /// [`PluginState::Loaded`].
    pub fn plugin(&self) -> Option<&dyn Plugin> {
        self.instance.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::FactoryLoaderHost;
    use std::fs;

    const IID: &str = "org.coral.plugin/1";

    fn read_descriptor(json: &str) -> Option<PluginSpec> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugin.json");
        fs::write(&path, json).unwrap();
        PluginSpec::read(&path, IID, &FactoryLoaderHost::new())
    }

    fn descriptor(meta: &str) -> String {
        format!(r#"{{"IID": "{IID}", "MetaData": {meta}}}"#)
    }

    #[test]
    fn test_read_full_descriptor() {
        let spec = read_descriptor(&descriptor(
            r#"{
                "Name": "editor",
                "Version": "2.1.0",
                "CompatVersion": "2.0.0",
                "Vendor": "Coral Project",
                "Copyright": "(C) 2026 Coral Project",
                "Category": "Core",
                "Description": "Text editing",
                "LongDescription": ["Line one.", "Line two."],
                "License": ["MIT", "See LICENSE."],
                "Url": "https://example.org/editor",
                "Dependencies": [
                    {"Name": "core", "Version": "1.0.0"},
                    {"Name": "search", "Version": "1.0.0", "Type": "optional"},
                    {"Name": "testbed", "Type": "Test"}
                ],
                "Arguments": [
                    {"Name": "-scheme", "Parameter": "name", "Description": "Color scheme"}
                ]
            }"#,
        ))
        .unwrap();

        assert_eq!(spec.state(), PluginState::Read);
        assert!(!spec.has_error());
        assert_eq!(spec.name(), "editor");
        assert_eq!(spec.version(), "2.1.0");
        assert_eq!(spec.compat_version(), "2.0.0");
        assert_eq!(spec.vendor(), "Coral Project");
        assert_eq!(spec.category(), "Core");
        assert_eq!(spec.long_description(), "Line one.\nLine two.");
        assert_eq!(spec.license(), "MIT\nSee LICENSE.");
        assert_eq!(spec.dependencies().len(), 3);
        assert_eq!(spec.dependencies()[0].dep_type, DependencyType::Required);
        assert_eq!(spec.dependencies()[1].dep_type, DependencyType::Optional);
        assert_eq!(spec.dependencies()[2].dep_type, DependencyType::Test);
        assert_eq!(spec.dependencies()[2].version, "");
        assert_eq!(spec.argument_descriptions().len(), 1);
        assert_eq!(spec.argument_descriptions()[0].name, "-scheme");
        assert_eq!(spec.argument_descriptions()[0].parameter, "name");
    }

    #[test]
    fn test_foreign_iid_is_silently_rejected() {
        let json = r#"{"IID": "somebody.else/9", "MetaData": {"Name": "x", "Version": "1"}}"#;
        assert!(read_descriptor(json).is_none());

        let json = r#"{"MetaData": {"Name": "x", "Version": "1"}}"#;
        assert!(read_descriptor(json).is_none());
    }

    #[test]
    fn test_missing_metadata_is_an_error() {
        let spec = read_descriptor(&format!(r#"{{"IID": "{IID}"}}"#)).unwrap();
        assert_eq!(spec.state(), PluginState::Invalid);
        assert_eq!(spec.error_string(), Some("Plugin meta data not found"));
    }

    #[test]
    fn test_missing_name_and_version() {
        let spec = read_descriptor(&descriptor(r#"{"Version": "1.0"}"#)).unwrap();
        assert_eq!(spec.error_string(), Some("\"Name\" is missing"));
        assert_eq!(spec.state(), PluginState::Invalid);

        let spec = read_descriptor(&descriptor(r#"{"Name": "x"}"#)).unwrap();
        assert_eq!(spec.error_string(), Some("\"Version\" is missing"));

        let spec = read_descriptor(&descriptor(r#"{"Name": "", "Version": "1.0"}"#)).unwrap();
        assert_eq!(spec.error_string(), Some("\"Name\" is empty"));
    }

    #[test]
    fn test_invalid_version_format() {
        let spec = read_descriptor(&descriptor(r#"{"Name": "x", "Version": "1.0-rc1"}"#)).unwrap();
        assert_eq!(
            spec.error_string(),
            Some("Value \"1.0-rc1\" for key \"Version\" has invalid format")
        );
    }

    #[test]
    fn test_compat_version_defaults_to_version() {
        let spec = read_descriptor(&descriptor(r#"{"Name": "x", "Version": "3.1.4"}"#)).unwrap();
        assert_eq!(spec.compat_version(), "3.1.4");
    }

    #[test]
    fn test_wrongly_typed_fields() {
        let spec = read_descriptor(&descriptor(r#"{"Name": 7, "Version": "1.0"}"#)).unwrap();
        assert_eq!(
            spec.error_string(),
            Some("Value for key \"Name\" is not a string")
        );

        let spec =
            read_descriptor(&descriptor(r#"{"Name": "x", "Version": "1.0", "Required": "yes"}"#))
                .unwrap();
        assert_eq!(
            spec.error_string(),
            Some("Value for key \"Required\" is not a bool")
        );

        let spec = read_descriptor(&descriptor(
            r#"{"Name": "x", "Version": "1.0", "License": {"spdx": "MIT"}}"#,
        ))
        .unwrap();
        assert_eq!(
            spec.error_string(),
            Some("Value for key \"License\" is not a string and not an array of strings")
        );
    }

    #[test]
    fn test_experimental_forces_disabled_by_default() {
        let spec = read_descriptor(&descriptor(
            r#"{"Name": "x", "Version": "1.0", "Experimental": true}"#,
        ))
        .unwrap();
        assert!(spec.is_experimental());
        assert!(!spec.is_enabled_by_default());
        assert!(!spec.is_enabled_by_settings());
        assert!(!spec.is_effectively_enabled());
    }

    #[test]
    fn test_disabled_by_default() {
        let spec = read_descriptor(&descriptor(
            r#"{"Name": "x", "Version": "1.0", "DisabledByDefault": true}"#,
        ))
        .unwrap();
        assert!(!spec.is_enabled_by_default());
    }

    #[test]
    fn test_invalid_platform_pattern() {
        let spec = read_descriptor(&descriptor(
            r#"{"Name": "x", "Version": "1.0", "Platform": "(unclosed"}"#,
        ))
        .unwrap();
        assert!(spec.has_error());
        assert!(spec
            .error_string()
            .unwrap()
            .starts_with("Invalid platform specification \"(unclosed\":"));
    }

    #[test]
    fn test_platform_pattern_gates_enablement() {
        let spec = read_descriptor(&descriptor(
            r#"{"Name": "x", "Version": "1.0", "Platform": "NoSuchOS.*"}"#,
        ))
        .unwrap();
        assert!(!spec.has_error());
        assert!(!spec.is_available_for_host_platform());
        assert!(!spec.is_effectively_enabled());
    }

    #[test]
    fn test_unknown_dependency_type() {
        let spec = read_descriptor(&descriptor(
            r#"{"Name": "x", "Version": "1.0",
                "Dependencies": [{"Name": "core", "Type": "sometimes"}]}"#,
        ))
        .unwrap();
        assert_eq!(
            spec.error_string(),
            Some(
                "Dependency: \"Type\" must be \"required\", \"optional\" or \"test\" \
                 (is \"sometimes\")."
            )
        );
    }

    #[test]
    fn test_dependency_version_empty_means_any() {
        let spec = read_descriptor(&descriptor(
            r#"{"Name": "x", "Version": "1.0",
                "Dependencies": [{"Name": "core", "Version": ""}]}"#,
        ))
        .unwrap();
        assert!(!spec.has_error());
        assert_eq!(spec.dependencies()[0].version, "");
    }

    #[test]
    fn test_argument_with_empty_name() {
        let spec = read_descriptor(&descriptor(
            r#"{"Name": "x", "Version": "1.0", "Arguments": [{"Name": ""}]}"#,
        ))
        .unwrap();
        assert_eq!(spec.error_string(), Some("Argument: \"Name\" is empty"));
    }

    #[test]
    fn test_reading_twice_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugin.json");
        fs::write(
            &path,
            descriptor(r#"{"Name": "twice", "Version": "1.2", "Vendor": "V"}"#),
        )
        .unwrap();

        let host = FactoryLoaderHost::new();
        let first = PluginSpec::read(&path, IID, &host).unwrap();
        let second = PluginSpec::read(&path, IID, &host).unwrap();

        assert_eq!(first.state(), PluginState::Read);
        assert_eq!(second.state(), PluginState::Read);
        assert_eq!(first.name(), second.name());
        assert_eq!(first.version(), second.version());
        assert_eq!(first.compat_version(), second.compat_version());
        assert_eq!(first.vendor(), second.vendor());
        assert_eq!(first.meta_data(), second.meta_data());
    }

    #[test]
    fn test_provides_respects_compat_range() {
        let spec = read_descriptor(&descriptor(
            r#"{"Name": "core", "Version": "2.2", "CompatVersion": "2.0"}"#,
        ))
        .unwrap();
        assert!(spec.provides("core", "2.0"));
        assert!(spec.provides("core", "2.1"));
        assert!(spec.provides("core", "2.2"));
        assert!(spec.provides("core", ""));
        assert!(!spec.provides("core", "1.9"));
        assert!(!spec.provides("core", "2.3"));
        assert!(!spec.provides("other", "2.1"));
    }

    #[test]
    fn test_dependency_display() {
        let dep = PluginDependency {
            name: "core".to_string(),
            version: "1.0".to_string(),
            dep_type: DependencyType::Required,
        };
        assert_eq!(dep.to_string(), "core (1.0)");
    }
}
