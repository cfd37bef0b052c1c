//! Error surface of the lifecycle and its mapping onto response codes.

use thiserror::Error;

use crate::command::ResponseCode;
use crate::driver::DriverError;
use crate::hostapd::ConfigWriteError;
use crate::interface::InterfaceError;
use crate::session::SessionError;
use crate::supervisor::SupervisorError;
use crate::wake_lock::WakeLockError;

/// Failure of one collaborator call made by the lifecycle.
#[derive(Debug, Error)]
pub enum StepError {
    /// Driver binding or unbinding failed.
    #[error(transparent)]
    Driver(#[from] DriverError),
    /// The interface could not be brought up.
    #[error(transparent)]
    Interface(#[from] InterfaceError),
    /// The daemon could not be started or stopped.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    /// The control session could not be opened or used.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// The daemon configuration could not be written.
    #[error(transparent)]
    ConfigWrite(#[from] ConfigWriteError),
    /// The wake lock could not be taken.
    #[error(transparent)]
    WakeLock(#[from] WakeLockError),
}

/// Errors returned by [`SoftapLifecycle`](super::SoftapLifecycle).
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// `start` failed; completed steps were unwound and the state is idle.
    #[error("failed to start softap: {0}")]
    Start(#[source] StepError),
    /// `stop` hit a failing step; the state is idle regardless.
    #[error("softap stopped with errors: {0}")]
    Stop(#[source] StepError),
    /// The new configuration could not be written or applied.
    #[error("failed to apply softap configuration: {0}")]
    Reconfigure(#[source] StepError),
    /// The driver could not be rebound for a firmware reload.
    #[error("failed to reload driver firmware: {0}")]
    FirmwareReload(#[source] StepError),
    /// Configuration and firmware changes are refused while tearing down.
    #[error("softap is stopping; request rejected")]
    Stopping,
}

impl LifecycleError {
    /// Coarse response code reported to the command caller.
    #[must_use]
    pub const fn response_code(&self) -> ResponseCode {
        match self {
            Self::Start(_) => ResponseCode::ServiceStartFailed,
            Self::Stop(_) | Self::Reconfigure(_) | Self::FirmwareReload(_) | Self::Stopping => {
                ResponseCode::OperationFailed
            }
        }
    }
}
