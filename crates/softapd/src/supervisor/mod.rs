//! Start and stop of the access point daemon through the OS supervisor.
//!
//! The supervised daemon never signals readiness, so both directions issue a
//! request and then poll the supervisor's status for the expected state.
//! A generation marker captured before the start request tells a daemon that
//! has not been launched yet apart from one that launched and died.

mod systemd;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use softap_config::{Config, PollPolicy, Timings};

use crate::poll::{Cancellation, WaitError, wait_until};
use crate::session::CLIENT_SOCKET_PREFIX;

pub use systemd::SystemdServiceManager;

const SUPERVISOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::supervisor");

/// Run state reported by the OS supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonRunState {
    /// Not running.
    Stopped,
    /// Launch in progress.
    Starting,
    /// Running and serving.
    Running,
    /// Shutdown in progress.
    Stopping,
}

impl fmt::Display for DaemonRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(label)
    }
}

/// One read of the supervisor's status signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    /// Reported run state.
    pub state: DaemonRunState,
    /// Marker that changes every time the service is launched.
    pub generation: Option<String>,
}

impl ServiceStatus {
    /// A stopped service with no recorded launch.
    #[must_use]
    pub const fn stopped() -> Self {
        Self {
            state: DaemonRunState::Stopped,
            generation: None,
        }
    }
}

/// Requests and status reads against the OS process supervisor.
#[cfg_attr(test, mockall::automock)]
pub trait ServiceManager: Send {
    /// Asks the supervisor to launch `service`.
    fn request_start(&mut self, service: &str) -> io::Result<()>;

    /// Asks the supervisor to stop `service`.
    fn request_stop(&mut self, service: &str) -> io::Result<()>;

    /// Reads the current status of `service`.
    fn status(&mut self, service: &str) -> io::Result<ServiceStatus>;
}

/// Errors reported by the daemon supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The expected state was not observed before the deadline.
    #[error("daemon did not finish {action} within {waited:?}")]
    Timeout {
        /// `start` or `stop`.
        action: &'static str,
        /// Time spent polling.
        waited: Duration,
    },
    /// The daemon was launched but stopped before reporting running.
    #[error("daemon stopped before reporting running")]
    CrashedOnStart,
    /// The supervisor rejected a request or a status read.
    #[error("supervisor {action} request failed: {source}")]
    Request {
        /// `start`, `stop` or `status`.
        action: &'static str,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A wait was interrupted.
    #[error("daemon supervision cancelled")]
    Cancelled,
}

/// Daemon operations the lifecycle depends on.
#[cfg_attr(test, mockall::automock)]
pub trait DaemonControl: Send {
    /// Launches the daemon serving `iface` and waits until it runs.
    fn start(&mut self, iface: &str) -> Result<(), SupervisorError>;

    /// Stops the daemon and waits until it has stopped.
    fn stop(&mut self) -> Result<(), SupervisorError>;

    /// Single status read; an unreadable status counts as not running.
    fn is_running(&mut self) -> bool;
}

/// [`DaemonControl`] implementation polling a [`ServiceManager`].
pub struct DaemonSupervisor<S> {
    manager: S,
    service: String,
    ctrl_dir: PathBuf,
    client_dir: PathBuf,
    start_policy: PollPolicy,
    stop_policy: PollPolicy,
    cancel: Cancellation,
}

impl<S: ServiceManager> DaemonSupervisor<S> {
    /// Supervises the configured daemon service through `manager`.
    pub fn new(manager: S, config: &Config, timings: &Timings, cancel: Cancellation) -> Self {
        Self {
            manager,
            service: config.hostapd_service.clone(),
            ctrl_dir: config.ctrl_dir().as_std_path().to_path_buf(),
            client_dir: config.client_dir.as_std_path().to_path_buf(),
            start_policy: timings.daemon_start,
            stop_policy: timings.daemon_stop,
            cancel,
        }
    }

    fn read_status(&mut self) -> Result<ServiceStatus, SupervisorError> {
        self.manager
            .status(&self.service)
            .map_err(|source| SupervisorError::Request {
                action: "status",
                source,
            })
    }

    /// Removes control sockets left behind by a previous daemon run.
    fn clear_stale_sockets(&self, iface: &str) {
        remove_stale(&self.ctrl_dir.join(iface));
        let entries = match fs::read_dir(&self.client_dir) {
            Ok(entries) => entries,
            Err(error) => {
                debug!(
                    target: SUPERVISOR_TARGET,
                    dir = %self.client_dir.display(),
                    error = %error,
                    "client socket directory unreadable"
                );
                return;
            }
        };
        for entry in entries.flatten() {
            if entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(CLIENT_SOCKET_PREFIX))
            {
                remove_stale(&entry.path());
            }
        }
    }

    fn await_state<F>(
        &mut self,
        action: &'static str,
        policy: PollPolicy,
        mut done: F,
    ) -> Result<(), SupervisorError>
    where
        F: FnMut(&ServiceStatus) -> Result<bool, SupervisorError>,
    {
        debug!(
            target: SUPERVISOR_TARGET,
            action,
            attempts = policy.attempts(),
            "waiting for daemon state"
        );
        let manager = &mut self.manager;
        let service = self.service.as_str();
        let outcome = wait_until(policy, &self.cancel, || {
            let status = manager
                .status(service)
                .map_err(|source| SupervisorError::Request {
                    action: "status",
                    source,
                })?;
            Ok(done(&status)?.then_some(()))
        });
        match outcome {
            Ok(()) => Ok(()),
            Err(WaitError::Timeout { waited }) => Err(SupervisorError::Timeout { action, waited }),
            Err(WaitError::Cancelled) => Err(SupervisorError::Cancelled),
            Err(WaitError::Aborted(error)) => Err(error),
        }
    }
}

impl<S: ServiceManager> DaemonControl for DaemonSupervisor<S> {
    fn start(&mut self, iface: &str) -> Result<(), SupervisorError> {
        let before = self.read_status()?;
        if before.state == DaemonRunState::Running {
            debug!(target: SUPERVISOR_TARGET, service = %self.service, "daemon already running");
            return Ok(());
        }
        self.clear_stale_sockets(iface);
        let captured = before.generation;
        self.manager
            .request_start(&self.service)
            .map_err(|source| SupervisorError::Request {
                action: "start",
                source,
            })?;
        info!(target: SUPERVISOR_TARGET, service = %self.service, "daemon start requested");
        let policy = self.start_policy;
        self.await_state("start", policy, |status| match status.state {
            DaemonRunState::Running => Ok(true),
            DaemonRunState::Stopped if status.generation != captured => {
                Err(SupervisorError::CrashedOnStart)
            }
            _ => Ok(false),
        })?;
        info!(target: SUPERVISOR_TARGET, service = %self.service, "daemon running");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SupervisorError> {
        if self.read_status()?.state == DaemonRunState::Stopped {
            debug!(target: SUPERVISOR_TARGET, service = %self.service, "daemon already stopped");
            return Ok(());
        }
        self.manager
            .request_stop(&self.service)
            .map_err(|source| SupervisorError::Request {
                action: "stop",
                source,
            })?;
        let policy = self.stop_policy;
        self.await_state("stop", policy, |status| {
            Ok(status.state == DaemonRunState::Stopped)
        })?;
        info!(target: SUPERVISOR_TARGET, service = %self.service, "daemon stopped");
        Ok(())
    }

    fn is_running(&mut self) -> bool {
        match self.read_status() {
            Ok(status) => status.state == DaemonRunState::Running,
            Err(error) => {
                warn!(target: SUPERVISOR_TARGET, error = %error, "daemon status unreadable");
                false
            }
        }
    }
}

fn remove_stale(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(target: SUPERVISOR_TARGET, path = %path.display(), "removed stale socket"),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => warn!(
            target: SUPERVISOR_TARGET,
            path = %path.display(),
            error = %error,
            "failed to remove stale socket"
        ),
    }
}
