//! Plugin-side error type

/// Error returned by plugin lifecycle hooks.
///
/// The message is user-facing surface: the host prefixes it with context
/// (for example `"Plugin initialization failed: ..."`) and records it on the
/// plugin's descriptor, so it should describe the failure without naming the
/// hook it came from.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct PluginError {
    message: String,
}

/// Result type for plugin operations
pub type Result<T> = std::result::Result<T, PluginError>;

impl PluginError {
    /// Create a new plugin error with the given message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for PluginError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for PluginError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}
