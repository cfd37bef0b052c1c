//! The SoftAP state machine.
//!
//! Every public operation takes the lifecycle mutex for its whole duration,
//! so a `stop` can never interleave with the steps of an in-flight `start`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use softap_config::Config;

use super::error::{LifecycleError, StepError};
use super::state::{
    LifecycleState, ReconfigureOutcome, SoftapStatus, StartOutcome, StopOutcome,
};
use crate::driver::{DriverControl, DriverMode};
use crate::hostapd::{ApConfig, ConfigSink};
use crate::interface::InterfaceControl;
use crate::session::SessionControl;
use crate::supervisor::DaemonControl;
use crate::wake_lock::{HOTSPOT_WAKE_LOCK, WakeLock, WakeLockGuard};

const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// The external systems the lifecycle sequences.
pub struct Collaborators {
    /// Radio power and driver mode.
    pub driver: Box<dyn DriverControl>,
    /// Administrative interface state.
    pub interface: Box<dyn InterfaceControl>,
    /// Daemon supervision.
    pub daemon: Box<dyn DaemonControl>,
    /// Control-protocol session.
    pub session: Box<dyn SessionControl>,
    /// Daemon configuration destination.
    pub config_sink: Box<dyn ConfigSink>,
    /// System wake lock.
    pub wake_lock: Arc<dyn WakeLock>,
}

struct LifecycleInner {
    state: LifecycleState,
    iface: Option<String>,
    pending: Option<ApConfig>,
    wake_guard: Option<WakeLockGuard>,
    parts: Collaborators,
}

impl LifecycleInner {
    fn advance(&mut self, iface: &str, ctrl_dir: &Path) -> Result<LifecycleState, StepError> {
        match self.state {
            LifecycleState::Idle => {
                self.parts.driver.bind_access_point(iface)?;
                Ok(LifecycleState::DriverUp)
            }
            LifecycleState::DriverUp => {
                self.parts.interface.bring_up(iface)?;
                self.parts.daemon.start(iface)?;
                Ok(LifecycleState::DaemonStarting)
            }
            LifecycleState::DaemonStarting => {
                self.parts
                    .session
                    .connect(iface, self.parts.daemon.as_mut())?;
                Ok(LifecycleState::Connected)
            }
            LifecycleState::Connected => {
                let guard =
                    WakeLockGuard::acquire(Arc::clone(&self.parts.wake_lock), HOTSPOT_WAKE_LOCK)?;
                self.wake_guard = Some(guard);
                if let Some(config) = self.pending.take() {
                    self.parts.config_sink.write(&config.render(ctrl_dir))?;
                    self.parts.session.reload()?;
                }
                Ok(LifecycleState::Active)
            }
            // An interrupted stop is finished before starting afresh.
            LifecycleState::Stopping => {
                let from = self.state;
                if let Some(error) = self.teardown(from) {
                    warn!(target: LIFECYCLE_TARGET, error = %error, "teardown left over from stop failed");
                }
                Ok(LifecycleState::Idle)
            }
            LifecycleState::Active => Ok(LifecycleState::Active),
        }
    }

    /// Undoes whatever `from` implies has been done. Every step runs even when
    /// an earlier one fails; the first failure is returned.
    fn teardown(&mut self, from: LifecycleState) -> Option<StepError> {
        let mut first: Option<StepError> = None;
        let mut record = |error: StepError| {
            warn!(target: LIFECYCLE_TARGET, error = %error, "teardown step failed");
            first.get_or_insert(error);
        };
        self.parts.session.close();
        if from >= LifecycleState::DriverUp {
            if let Err(error) = self.parts.daemon.stop() {
                record(error.into());
            }
            let iface = self.iface.as_deref().unwrap_or_default();
            if let Err(error) = self.parts.driver.unbind(iface) {
                record(error.into());
            }
        }
        self.wake_guard = None;
        first
    }

    /// Tears an `Active` lifecycle down to `Idle` unless the daemon is
    /// running, the session is attached and the driver is in access-point
    /// mode.
    fn repair(&mut self) {
        if self.state != LifecycleState::Active {
            return;
        }
        let daemon_running = self.parts.daemon.is_running();
        let session_live = self.parts.session.is_connected();
        let driver_mode = self.parts.driver.mode();
        if daemon_running && session_live && driver_mode == Some(DriverMode::AccessPoint) {
            return;
        }
        warn!(
            target: LIFECYCLE_TARGET,
            daemon_running,
            session_live,
            driver_mode = ?driver_mode,
            "active softap is no longer backed; tearing down"
        );
        self.state = LifecycleState::Stopping;
        if let Some(error) = self.teardown(LifecycleState::Active) {
            debug!(target: LIFECYCLE_TARGET, error = %error, "repair teardown incomplete");
        }
        self.state = LifecycleState::Idle;
        self.iface = None;
    }

    fn write_config(&mut self, config: &ApConfig, ctrl_dir: &Path) -> Result<(), StepError> {
        self.parts.config_sink.write(&config.render(ctrl_dir))?;
        Ok(())
    }
}

/// Orchestrates the driver, daemon, session and wake lock into `start`,
/// `stop`, `reconfigure` and `status`.
pub struct SoftapLifecycle {
    inner: Mutex<LifecycleInner>,
    ctrl_dir: PathBuf,
}

impl SoftapLifecycle {
    /// Creates an idle lifecycle over `parts`. Rendered configurations point
    /// the daemon's control interface at `ctrl_dir`.
    pub fn new(parts: Collaborators, ctrl_dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Mutex::new(LifecycleInner {
                state: LifecycleState::Idle,
                iface: None,
                pending: None,
                wake_guard: None,
                parts,
            }),
            ctrl_dir: ctrl_dir.into(),
        }
    }

    /// Creates an idle lifecycle using the control directory from `config`.
    pub fn with_config(parts: Collaborators, config: &Config) -> Self {
        Self::new(parts, config.ctrl_dir().as_std_path())
    }

    fn lock(&self) -> MutexGuard<'_, LifecycleInner> {
        // The inner state stays coherent across a panic: the step loop
        // resumes from whatever state was last recorded.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.lock().state
    }

    /// True iff the access point is active. An active lifecycle whose daemon,
    /// session or driver mode has gone is torn down first.
    #[must_use]
    pub fn is_softap_started(&self) -> bool {
        let mut inner = self.lock();
        inner.repair();
        inner.state == LifecycleState::Active
    }

    /// Brings the access point up on `iface`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Start`] after unwinding every completed step;
    /// the lifecycle is idle with the radio off and no wake lock held.
    pub fn start(&self, iface: &str) -> Result<StartOutcome, LifecycleError> {
        let mut inner = self.lock();
        inner.repair();
        if inner.state == LifecycleState::Active {
            debug!(target: LIFECYCLE_TARGET, "start ignored; softap already active");
            return Ok(StartOutcome::AlreadyRunning);
        }
        info!(target: LIFECYCLE_TARGET, iface, "starting softap");
        inner.iface = Some(iface.to_owned());
        while inner.state != LifecycleState::Active {
            match inner.advance(iface, &self.ctrl_dir) {
                Ok(next) => {
                    debug!(target: LIFECYCLE_TARGET, from = %inner.state, to = %next, "state transition");
                    inner.state = next;
                }
                Err(error) => {
                    warn!(
                        target: LIFECYCLE_TARGET,
                        state = %inner.state,
                        error = %error,
                        "start failed; unwinding"
                    );
                    let reached = inner.state;
                    if let Some(cleanup) = inner.teardown(reached) {
                        debug!(target: LIFECYCLE_TARGET, error = %cleanup, "unwind incomplete");
                    }
                    inner.state = LifecycleState::Idle;
                    inner.iface = None;
                    return Err(LifecycleError::Start(error));
                }
            }
        }
        info!(target: LIFECYCLE_TARGET, iface, "softap active");
        Ok(StartOutcome::Started)
    }

    /// Tears the access point down.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Stop`] with the first failing step. The
    /// lifecycle is idle either way.
    pub fn stop(&self) -> Result<StopOutcome, LifecycleError> {
        let mut inner = self.lock();
        if inner.state == LifecycleState::Idle {
            debug!(target: LIFECYCLE_TARGET, "stop ignored; softap idle");
            return Ok(StopOutcome::AlreadyStopped);
        }
        let from = inner.state;
        inner.state = LifecycleState::Stopping;
        info!(target: LIFECYCLE_TARGET, from = %from, "stopping softap");
        let failure = inner.teardown(from);
        inner.state = LifecycleState::Idle;
        inner.iface = None;
        match failure {
            Some(error) => Err(LifecycleError::Stop(error)),
            None => {
                info!(target: LIFECYCLE_TARGET, "softap stopped");
                Ok(StopOutcome::Stopped)
            }
        }
    }

    /// Renders and persists `config`, reloading the daemon when a session is
    /// attached.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Stopping`] during teardown and
    /// [`LifecycleError::Reconfigure`] when writing or reloading fails.
    pub fn reconfigure(&self, config: ApConfig) -> Result<ReconfigureOutcome, LifecycleError> {
        let ssid = config.ssid.clone();
        let mut inner = self.lock();
        inner.repair();
        let outcome = match inner.state {
            LifecycleState::Stopping => return Err(LifecycleError::Stopping),
            LifecycleState::DaemonStarting => {
                inner.pending = Some(config);
                ReconfigureOutcome::Queued
            }
            LifecycleState::Idle | LifecycleState::DriverUp => {
                inner
                    .write_config(&config, &self.ctrl_dir)
                    .map_err(LifecycleError::Reconfigure)?;
                ReconfigureOutcome::Saved
            }
            LifecycleState::Connected | LifecycleState::Active => {
                inner
                    .write_config(&config, &self.ctrl_dir)
                    .map_err(LifecycleError::Reconfigure)?;
                if let Err(error) = inner.parts.session.reload() {
                    // The daemon may have taken the session down with it.
                    inner.repair();
                    return Err(LifecycleError::Reconfigure(error.into()));
                }
                ReconfigureOutcome::Applied
            }
        };
        info!(
            target: LIFECYCLE_TARGET,
            ssid = %ssid,
            outcome = ?outcome,
            "softap configuration accepted"
        );
        Ok(outcome)
    }

    /// Rebinds the driver in `mode` on `iface`. An active access point left
    /// without an access-point driver is torn down afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Stopping`] during teardown and
    /// [`LifecycleError::FirmwareReload`] when the driver cannot be bound; the
    /// radio is off in that case.
    pub fn reload_firmware(&self, iface: &str, mode: DriverMode) -> Result<(), LifecycleError> {
        let mut inner = self.lock();
        if inner.state == LifecycleState::Stopping {
            return Err(LifecycleError::Stopping);
        }
        info!(target: LIFECYCLE_TARGET, iface, mode = %mode, "reloading driver firmware");
        let bound = inner
            .parts
            .driver
            .bind_mode(mode, iface)
            .map_err(|error| LifecycleError::FirmwareReload(error.into()));
        inner.repair();
        bound
    }

    /// Reports the current state, repairing it first if the daemon, the
    /// session or the access-point driver disappeared while active.
    #[must_use]
    pub fn status(&self) -> SoftapStatus {
        let mut inner = self.lock();
        inner.repair();
        let daemon_running = inner.parts.daemon.is_running();
        let radio = match inner.parts.driver.radio_state() {
            Ok(radio) => Some(radio),
            Err(error) => {
                debug!(target: LIFECYCLE_TARGET, error = %error, "radio state unreadable");
                None
            }
        };
        SoftapStatus {
            state: inner.state,
            iface: inner.iface.clone(),
            radio,
            daemon_running,
        }
    }
}
