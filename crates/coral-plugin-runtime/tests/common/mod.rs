//! Shared harness for lifecycle integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use coral_plugin_api::{Plugin, PluginError, ShutdownFlag};
use coral_plugin_runtime::{FactoryLoaderHost, PluginManager};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const IID: &str = "org.coral.plugin/1";

/// Chronological record of plugin hook invocations across all plugins.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.0.lock().unwrap().iter().any(|e| e == event)
    }
}

/// A plugin that records every hook invocation in an [`EventLog`].
pub struct RecordingPlugin {
    name: String,
    log: EventLog,
    fail_initialize: bool,
    delayed_work: bool,
    async_shutdown: bool,
}

impl RecordingPlugin {
    pub fn new(name: impl Into<String>, log: EventLog) -> Self {
        Self {
            name: name.into(),
            log,
            fail_initialize: false,
            delayed_work: false,
            async_shutdown: false,
        }
    }

    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    pub fn with_delayed_work(mut self) -> Self {
        self.delayed_work = true;
        self
    }

    pub fn with_async_shutdown(mut self) -> Self {
        self.async_shutdown = true;
        self
    }
}

#[async_trait]
impl Plugin for RecordingPlugin {
    async fn initialize(&mut self, arguments: &[String]) -> Result<(), PluginError> {
        self.log.push(format!("initialize {}", self.name));
        if !arguments.is_empty() {
            self.log
                .push(format!("arguments {} {}", self.name, arguments.join(" ")));
        }
        if self.fail_initialize {
            return Err(PluginError::new("does not want to start"));
        }
        Ok(())
    }

    async fn extensions_initialized(&mut self) {
        self.log.push(format!("extensions {}", self.name));
    }

    async fn delayed_initialize(&mut self) -> bool {
        self.log.push(format!("delayed {}", self.name));
        self.delayed_work
    }

    async fn about_to_shutdown(&mut self) -> ShutdownFlag {
        self.log.push(format!("shutdown {}", self.name));
        if !self.async_shutdown {
            return ShutdownFlag::Synchronous;
        }
        let (flag, signal) = ShutdownFlag::deferred();
        let log = self.log.clone();
        let name = self.name.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            log.push(format!("async-finished {name}"));
            signal.finished();
        });
        flag
    }
}

/// Write a descriptor file carrying our IID and the given `MetaData` body.
pub fn write_descriptor(dir: &Path, file: &str, meta: &str) {
    let json = format!(r#"{{"IID": "{IID}", "MetaData": {meta}}}"#);
    fs::write(dir.join(file), json).unwrap();
}

/// A manager over `dir` whose factories produce [`RecordingPlugin`]s for
/// each of `names`, all recording into `log`.
pub fn recording_manager(dir: &Path, log: &EventLog, names: &[&str]) -> PluginManager {
    let mut host = FactoryLoaderHost::new();
    for name in names {
        let name = name.to_string();
        let log = log.clone();
        host.register(name.clone(), move || {
            Ok(Box::new(RecordingPlugin::new(name.clone(), log.clone())))
        });
    }
    let mut manager = PluginManager::new(IID, Box::new(host));
    manager.read_plugins(&[dir.to_path_buf()]).unwrap();
    manager
}
