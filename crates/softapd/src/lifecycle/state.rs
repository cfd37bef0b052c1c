//! Lifecycle states and status snapshots.

use std::fmt;

use crate::power::RadioPowerState;

/// Position of the access point in its start/stop cycle.
///
/// `Connected` is only ever observed inside a `start` call; callers see
/// `Idle` or `Active`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    /// Nothing is running and the radio is left off.
    #[default]
    Idle,
    /// The driver is bound in access-point mode.
    DriverUp,
    /// The daemon start has been requested.
    DaemonStarting,
    /// A control session is attached.
    Connected,
    /// The access point is serving clients.
    Active,
    /// Teardown is in progress.
    Stopping,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::DriverUp => "driver-up",
            Self::DaemonStarting => "daemon-starting",
            Self::Connected => "connected",
            Self::Active => "active",
            Self::Stopping => "stopping",
        };
        f.write_str(label)
    }
}

/// Result of a `start` request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The access point was brought up by this call.
    Started,
    /// The access point was already active; nothing was touched.
    AlreadyRunning,
}

/// Result of a `stop` request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The access point was torn down by this call.
    Stopped,
    /// Nothing was running.
    AlreadyStopped,
}

/// What a `reconfigure` request did with the new configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconfigureOutcome {
    /// Written for the next start.
    Saved,
    /// Written and reloaded by the running daemon.
    Applied,
    /// Held until the control session attaches.
    Queued,
}

/// Point-in-time view of the access point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftapStatus {
    /// Lifecycle state after any invariant repair.
    pub state: LifecycleState,
    /// Interface passed to the last `start`, while it is in use.
    pub iface: Option<String>,
    /// Radio rail state, when readable.
    pub radio: Option<RadioPowerState>,
    /// Whether the supervisor reports the daemon running.
    pub daemon_running: bool,
}

impl SoftapStatus {
    /// True when the access point is active.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.state == LifecycleState::Active
    }
}

impl fmt::Display for SoftapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_started() {
            f.write_str("Softap service is running")?;
        } else {
            f.write_str("Softap service is not running")?;
        }
        write!(f, " (state={}", self.state)?;
        if let Some(iface) = &self.iface {
            write!(f, " iface={iface}")?;
        }
        match self.radio {
            Some(radio) => write!(f, " radio={radio}")?,
            None => f.write_str(" radio=unknown")?,
        }
        let daemon = if self.daemon_running { "running" } else { "stopped" };
        write!(f, " daemon={daemon})")
    }
}
