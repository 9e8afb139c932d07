//! Runtime error types

use std::fmt;

/// Host-side error type for runtime operations
///
/// Per-plugin lifecycle failures are not reported through this type: they
/// are recorded on the owning [`PluginSpec`](crate::spec::PluginSpec)'s
/// error slot so startup can proceed with unaffected plugins.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// A plugin search path could not be enumerated
    #[error("Failed to scan plugin path {path}: {source}")]
    ScanPath {
        /// The directory that failed to enumerate
        path: String,
        /// The underlying I/O error
        source: std::io::Error,
    },

    /// Plugin not found
    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    /// Settings file error
    #[error("Settings error: {0}")]
    Settings(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

impl RuntimeError {
    /// Create a new plugin not found error
    pub fn not_found(name: impl fmt::Display) -> Self {
        Self::PluginNotFound(name.to_string())
    }

    /// Create a new settings error
    pub fn settings(msg: impl fmt::Display) -> Self {
        Self::Settings(msg.to_string())
    }
}
