//! Termination signal handling.
//!
//! A watcher thread waits for SIGTERM, SIGINT or SIGHUP. On the first one it
//! cancels every in-flight wait, stops the access point and then hands the
//! signal to an exit hook. Cancelling first lets a `start` blocked in a poll
//! loop unwind and release the lifecycle lock.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use thiserror::Error;
use tracing::{info, warn};

use crate::lifecycle::{SoftapLifecycle, StopOutcome};
use crate::poll::Cancellation;

const SHUTDOWN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::shutdown");

/// Signals that end the daemon.
pub const SHUTDOWN_SIGNALS: [i32; 3] = [SIGTERM, SIGINT, SIGHUP];

/// Errors raised while installing the watcher.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// The signal handlers could not be registered.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The watcher thread could not be spawned.
    #[error("failed to spawn signal watcher: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Cancels `cancel` and stops `lifecycle` after `signal`.
pub fn shut_down(lifecycle: &SoftapLifecycle, cancel: &Cancellation, signal: i32) {
    info!(target: SHUTDOWN_TARGET, signal, "shutdown signal received");
    cancel.cancel();
    match lifecycle.stop() {
        Ok(StopOutcome::Stopped) => info!(target: SHUTDOWN_TARGET, "softap stopped for shutdown"),
        Ok(StopOutcome::AlreadyStopped) => {}
        Err(error) => warn!(target: SHUTDOWN_TARGET, error = %error, "shutdown stop failed"),
    }
}

/// Running signal watcher. Dropping it leaves the thread running; call
/// [`ShutdownWatch::close`] to end it.
#[derive(Debug)]
pub struct ShutdownWatch {
    handle: Handle,
    thread: JoinHandle<()>,
}

impl ShutdownWatch {
    /// Registers handlers for [`SHUTDOWN_SIGNALS`] and spawns the watcher.
    ///
    /// After the first signal the watcher runs [`shut_down`] and then calls
    /// `on_exit` with the signal number.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] if the handlers cannot be registered or the
    /// thread cannot be spawned.
    pub fn spawn<F>(
        lifecycle: Arc<SoftapLifecycle>,
        cancel: Cancellation,
        on_exit: F,
    ) -> Result<Self, ShutdownError>
    where
        F: FnOnce(i32) + Send + 'static,
    {
        let mut signals =
            Signals::new(SHUTDOWN_SIGNALS).map_err(|source| ShutdownError::Install { source })?;
        let handle = signals.handle();
        let thread = thread::Builder::new()
            .name("softapd-signals".to_owned())
            .spawn(move || {
                if let Some(signal) = signals.forever().next() {
                    shut_down(&lifecycle, &cancel, signal);
                    on_exit(signal);
                }
            })
            .map_err(|source| ShutdownError::Spawn { source })?;
        Ok(Self { handle, thread })
    }

    /// Unregisters the handlers and waits for the watcher to finish.
    pub fn close(self) {
        self.handle.close();
        if self.thread.join().is_err() {
            warn!(target: SHUTDOWN_TARGET, "signal watcher panicked");
        }
    }
}
