//! Persisted plugin enablement settings
//!
//! Users can disable plugins that are enabled by default and force-enable
//! plugins that are not (experimental plugins in particular). Only the
//! deviations from the descriptor defaults are stored; the file stays empty
//! for a stock configuration.

use crate::error::{Result, RuntimeError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// User overrides for plugin enablement, persisted as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSettings {
    /// Plugins the user disabled although they are enabled by default
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled_plugins: Vec<String>,

    /// Plugins the user enabled although they are disabled by default
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub force_enabled_plugins: Vec<String>,
}

impl PluginSettings {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "No plugin settings file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| RuntimeError::settings(format!("{}: {}", path.display(), e)))
    }

    /// Save settings to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Whether the user disabled `name`.
    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled_plugins.iter().any(|n| n == name)
    }

    /// Whether the user force-enabled `name`.
    pub fn is_force_enabled(&self, name: &str) -> bool {
        self.force_enabled_plugins.iter().any(|n| n == name)
    }

    /// Record the user's choice for a plugin whose descriptor default is
    /// `enabled_by_default`. Choices matching the default are removed rather
    /// than stored.
    pub fn set_enabled(&mut self, name: &str, enabled: bool, enabled_by_default: bool) {
        self.disabled_plugins.retain(|n| n != name);
        self.force_enabled_plugins.retain(|n| n != name);
        if enabled == enabled_by_default {
            return;
        }
        if enabled {
            self.force_enabled_plugins.push(name.to_string());
        } else {
            self.disabled_plugins.push(name.to_string());
        }
    }
}
