//! Administrative state of the access point interface.

use std::ffi::OsString;
use std::io;
use std::process::Command;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::poll::{Cancellation, settle};

const INTERFACE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::interface");

/// Errors raised while bringing an interface up.
#[derive(Debug, Error)]
pub enum InterfaceError {
    /// The link tool could not be run.
    #[error("failed to run link tool for {iface}: {source}")]
    Spawn {
        /// Interface name.
        iface: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The link tool ran but reported failure.
    #[error("link tool could not bring {iface} up: {detail}")]
    Rejected {
        /// Interface name.
        iface: String,
        /// Exit status and diagnostic output.
        detail: String,
    },
    /// The settle delay was interrupted.
    #[error("interface bring-up cancelled")]
    Cancelled,
}

/// Brings network interfaces administratively up.
#[cfg_attr(test, mockall::automock)]
pub trait InterfaceControl: Send {
    /// Marks `iface` up and waits for it to settle.
    fn bring_up(&mut self, iface: &str) -> Result<(), InterfaceError>;
}

/// [`InterfaceControl`] running `ip link set dev <iface> up`.
#[derive(Debug)]
pub struct IpLinkInterface {
    program: OsString,
    settle_delay: Duration,
    cancel: Cancellation,
}

impl IpLinkInterface {
    /// Uses `ip` from `PATH`.
    #[must_use]
    pub fn new(settle_delay: Duration, cancel: Cancellation) -> Self {
        Self::with_program("ip", settle_delay, cancel)
    }

    /// Uses `program` in place of `ip`.
    #[must_use]
    pub fn with_program(
        program: impl Into<OsString>,
        settle_delay: Duration,
        cancel: Cancellation,
    ) -> Self {
        Self {
            program: program.into(),
            settle_delay,
            cancel,
        }
    }
}

impl InterfaceControl for IpLinkInterface {
    fn bring_up(&mut self, iface: &str) -> Result<(), InterfaceError> {
        let output = Command::new(&self.program)
            .args(["link", "set", "dev", iface, "up"])
            .output()
            .map_err(|source| InterfaceError::Spawn {
                iface: iface.to_owned(),
                source,
            })?;
        if !output.status.success() {
            return Err(InterfaceError::Rejected {
                iface: iface.to_owned(),
                detail: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        info!(target: INTERFACE_TARGET, iface, "interface up");
        if !settle(self.settle_delay, &self.cancel) {
            return Err(InterfaceError::Cancelled);
        }
        Ok(())
    }
}
