//! Core plugin trait and the shutdown handshake

use crate::error::PluginError;
use async_trait::async_trait;
use tokio::sync::oneshot;

/// How a plugin intends to shut down.
///
/// Returned from [`Plugin::about_to_shutdown`]. A plugin that still has work
/// in flight (open connections to drain, background tasks to join) returns
/// the asynchronous variant and signals completion later; the host blocks
/// final deletion until every such signal has fired.
#[derive(Debug)]
pub enum ShutdownFlag {
    /// The plugin is done once `about_to_shutdown` returns.
    Synchronous,

    /// The plugin will signal completion later through the paired
    /// [`ShutdownSignal`]. The host waits on this receiver.
    Asynchronous(oneshot::Receiver<()>),
}

impl ShutdownFlag {
    /// Create an asynchronous shutdown flag together with its completion
    /// handle.
    ///
    /// The plugin keeps the [`ShutdownSignal`] (typically moving it into a
    /// spawned teardown task) and returns the flag from
    /// [`Plugin::about_to_shutdown`].
    pub fn deferred() -> (Self, ShutdownSignal) {
        let (tx, rx) = oneshot::channel();
        (Self::Asynchronous(rx), ShutdownSignal(tx))
    }
}

/// Completion handle for an asynchronous shutdown.
///
/// Dropping the signal without calling [`finished`](Self::finished) also
/// releases the host; holding it forever blocks shutdown indefinitely, which
/// is a plugin contract violation the host does not compensate for.
#[derive(Debug)]
pub struct ShutdownSignal(oneshot::Sender<()>);

impl ShutdownSignal {
    /// Signal that asynchronous shutdown has finished.
    pub fn finished(self) {
        let _ = self.0.send(());
    }
}

/// The capability set every loaded plugin exposes to the host.
///
/// Only [`initialize`](Self::initialize) is mandatory; the remaining hooks
/// default to no-ops. Hooks are invoked on the host's main dispatch task, in
/// dependency order during startup and reverse dependency order during
/// shutdown.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// First lifecycle hook, called once the plugin's dependencies have been
    /// initialized. `arguments` are the runtime options addressed to this
    /// plugin.
    ///
    /// Returning an error marks the plugin (and transitively its dependents)
    /// as failed; no further hooks are called on it.
    async fn initialize(&mut self, arguments: &[String]) -> Result<(), PluginError>;

    /// Called after every plugin has been initialized, again in dependency
    /// order. This is the place to wire up objects other plugins published
    /// during their `initialize`.
    async fn extensions_initialized(&mut self) {}

    /// Optional third startup phase, run after all plugins are running. The
    /// host interleaves these calls with event processing; return `true` to
    /// indicate substantive work was done and the host should yield before
    /// the next plugin's turn.
    async fn delayed_initialize(&mut self) -> bool {
        false
    }

    /// Called in reverse dependency order when the host shuts down.
    async fn about_to_shutdown(&mut self) -> ShutdownFlag {
        ShutdownFlag::Synchronous
    }
}
