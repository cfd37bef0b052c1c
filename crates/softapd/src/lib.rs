//! SoftAP lifecycle controller.
//!
//! `softapd` turns a device's Wi-Fi radio into an access point and back. The
//! [`SoftapLifecycle`] state machine sequences five collaborators, each behind
//! a trait so tests can substitute fakes:
//!
//! - [`power::RadioPower`] gates the radio rail through rfkill.
//! - [`driver::DriverControl`] moves the driver between station and
//!   access-point mode, either by reloading the kernel module or by renaming
//!   the interface.
//! - [`supervisor::DaemonControl`] starts and stops hostapd through the OS
//!   service manager.
//! - [`session::SessionControl`] attaches to the daemon's control socket.
//! - [`wake_lock::WakeLock`] keeps the system awake while the AP is up.
//!
//! Commands arrive as text lines (`softap start athap0`) and are answered
//! with numeric response codes by [`command::handle_line`]. A termination
//! signal stops the access point before the process exits
//! ([`shutdown::ShutdownWatch`]).

pub mod bootstrap;
pub mod command;
pub mod driver;
pub mod hostapd;
pub mod interface;
pub mod lifecycle;
pub mod poll;
pub mod power;
pub mod session;
pub mod shutdown;
pub mod supervisor;
pub mod telemetry;
pub mod wake_lock;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;

pub use bootstrap::{
    BootstrapError, ConfigLoader, StaticConfigLoader, SystemConfigLoader, build_lifecycle, run,
    serve,
};
pub use command::{CommandError, FirmwareMode, Response, ResponseCode, SoftapCommand};
pub use lifecycle::{Collaborators, LifecycleError, LifecycleState, SoftapLifecycle, SoftapStatus};
pub use telemetry::{TelemetryError, TelemetryHandle};
