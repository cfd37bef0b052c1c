//! Radio power gate backed by the rfkill device-class tree.
//!
//! The radio's hardware enable line is exposed as a single-character `state`
//! file (`'0'` or `'1'`) under one of the numbered `rfkill<N>` entries. The
//! gate locates the entry whose `type` is `wlan` on first use and caches the
//! path for the life of the instance.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::poll::{Cancellation, settle};

const POWER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::power");

/// Hardware power state of the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioPowerState {
    /// The rail is disabled.
    Off,
    /// The rail is enabled.
    On,
}

impl RadioPowerState {
    const fn as_byte(self) -> u8 {
        match self {
            Self::Off => b'0',
            Self::On => b'1',
        }
    }
}

impl fmt::Display for RadioPowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("off"),
            Self::On => f.write_str("on"),
        }
    }
}

/// Errors reported by the power gate. They are never retried internally.
#[derive(Debug, Error)]
pub enum PowerError {
    /// The rfkill entry or its state file could not be located or opened.
    #[error("radio power control unavailable at {path:?}: {source}")]
    DeviceUnavailable {
        /// Path that could not be located or opened.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Reading or writing the state file failed.
    #[error("radio power state IO failed at {path:?}: {source}")]
    IoFailure {
        /// State file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The settle delay was interrupted.
    #[error("radio power change cancelled")]
    Cancelled,
}

/// Controls and queries the radio's hardware power rail.
pub trait RadioPower: Send {
    /// Reads the current rail state from the hardware.
    fn query_power(&mut self) -> Result<RadioPowerState, PowerError>;

    /// Enables the rail; a no-op when it is already on.
    fn power_on(&mut self) -> Result<(), PowerError>;

    /// Disables the rail; a no-op when it is already off.
    fn power_off(&mut self) -> Result<(), PowerError>;
}

/// [`RadioPower`] implementation writing the rfkill `state` file.
#[derive(Debug)]
pub struct RfkillPowerGate {
    root: PathBuf,
    state_path: Option<PathBuf>,
    settle_delay: Duration,
    cancel: Cancellation,
}

impl RfkillPowerGate {
    /// Creates a gate scanning `root` (usually `/sys/class/rfkill`).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, settle_delay: Duration, cancel: Cancellation) -> Self {
        Self {
            root: root.into(),
            state_path: None,
            settle_delay,
            cancel,
        }
    }

    fn state_path(&mut self) -> Result<PathBuf, PowerError> {
        if let Some(path) = &self.state_path {
            return Ok(path.clone());
        }
        let path = discover_wlan_state(&self.root)?;
        debug!(target: POWER_TARGET, path = %path.display(), "located wlan rfkill entry");
        self.state_path = Some(path.clone());
        Ok(path)
    }

    fn set_power(&mut self, target: RadioPowerState) -> Result<(), PowerError> {
        let path = self.state_path()?;
        if read_state(&path)? == target {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|source| PowerError::DeviceUnavailable {
                path: path.clone(),
                source,
            })?;
        // Rapid toggles destabilise the rail; give it time before the change.
        if !settle(self.settle_delay, &self.cancel) {
            return Err(PowerError::Cancelled);
        }
        file.write_all(&[target.as_byte()])
            .map_err(|source| PowerError::IoFailure {
                path: path.clone(),
                source,
            })?;
        info!(target: POWER_TARGET, state = %target, "radio power changed");
        Ok(())
    }
}

impl RadioPower for RfkillPowerGate {
    fn query_power(&mut self) -> Result<RadioPowerState, PowerError> {
        let path = self.state_path()?;
        read_state(&path)
    }

    fn power_on(&mut self) -> Result<(), PowerError> {
        self.set_power(RadioPowerState::On)
    }

    fn power_off(&mut self) -> Result<(), PowerError> {
        self.set_power(RadioPowerState::Off)
    }
}

fn discover_wlan_state(root: &Path) -> Result<PathBuf, PowerError> {
    for id in 0_u32.. {
        let entry = root.join(format!("rfkill{id}"));
        let type_path = entry.join("type");
        let kind = match fs::read_to_string(&type_path) {
            Ok(kind) => kind,
            Err(source) => {
                return Err(PowerError::DeviceUnavailable {
                    path: type_path,
                    source,
                });
            }
        };
        if kind.starts_with("wlan") {
            return Ok(entry.join("state"));
        }
    }
    Err(PowerError::DeviceUnavailable {
        path: root.to_path_buf(),
        source: io::Error::new(io::ErrorKind::NotFound, "rfkill index space exhausted"),
    })
}

fn read_state(path: &Path) -> Result<RadioPowerState, PowerError> {
    let mut file = fs::File::open(path).map_err(|source| PowerError::DeviceUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    let mut byte = [0_u8; 1];
    file.read_exact(&mut byte)
        .map_err(|source| PowerError::IoFailure {
            path: path.to_path_buf(),
            source,
        })?;
    match byte {
        [b'1'] => Ok(RadioPowerState::On),
        [b'0'] => Ok(RadioPowerState::Off),
        [other] => Err(PowerError::IoFailure {
            path: path.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected rfkill state byte {other:#04x}"),
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct RfkillTree {
        dir: TempDir,
    }

    impl RfkillTree {
        fn add(&self, id: u32, kind: &str, state: &str) {
            let entry = self.dir.path().join(format!("rfkill{id}"));
            fs::create_dir_all(&entry).expect("create rfkill entry");
            fs::write(entry.join("type"), kind).expect("write type");
            fs::write(entry.join("state"), state).expect("write state");
        }

        fn state(&self, id: u32) -> String {
            fs::read_to_string(self.dir.path().join(format!("rfkill{id}/state")))
                .expect("read state")
        }

        fn gate(&self) -> RfkillPowerGate {
            RfkillPowerGate::new(self.dir.path(), Duration::ZERO, Cancellation::new())
        }
    }

    #[fixture]
    fn tree() -> RfkillTree {
        let tree = RfkillTree {
            dir: TempDir::new().expect("create rfkill root"),
        };
        tree.add(0, "bluetooth\n", "1");
        tree.add(1, "wlan\n", "0");
        tree
    }

    #[rstest]
    fn discovers_the_wlan_entry(tree: RfkillTree) {
        let mut gate = tree.gate();
        assert_eq!(gate.query_power().expect("query"), RadioPowerState::Off);
    }

    #[rstest]
    fn power_on_writes_state(tree: RfkillTree) {
        let mut gate = tree.gate();
        gate.power_on().expect("power on");
        assert_eq!(tree.state(1), "1");
        assert_eq!(tree.state(0), "1", "bluetooth entry must be untouched");
        assert_eq!(gate.query_power().expect("query"), RadioPowerState::On);
    }

    #[rstest]
    fn unchanged_state_is_not_rewritten(tree: RfkillTree) {
        let mut gate = tree.gate();
        gate.power_off().expect("power off");
        assert_eq!(tree.state(1), "0");
    }

    #[rstest]
    fn query_rereads_the_hardware(tree: RfkillTree) {
        let mut gate = tree.gate();
        assert_eq!(gate.query_power().expect("query"), RadioPowerState::Off);
        fs::write(tree.dir.path().join("rfkill1/state"), "1").expect("flip state");
        assert_eq!(gate.query_power().expect("query"), RadioPowerState::On);
    }

    #[test]
    fn missing_wlan_entry_is_unavailable() {
        let tree = RfkillTree {
            dir: TempDir::new().expect("create rfkill root"),
        };
        tree.add(0, "bluetooth\n", "1");
        let error = tree.gate().power_on().expect_err("no wlan entry");
        assert!(matches!(error, PowerError::DeviceUnavailable { .. }));
    }

    #[rstest]
    fn garbage_state_is_an_io_failure(tree: RfkillTree) {
        fs::write(tree.dir.path().join("rfkill1/state"), "x").expect("corrupt state");
        let error = tree.gate().query_power().expect_err("garbage state");
        assert!(matches!(error, PowerError::IoFailure { .. }));
    }

    #[rstest]
    fn cancelled_settle_leaves_state_untouched(tree: RfkillTree) {
        let cancel = Cancellation::new();
        cancel.cancel();
        let mut gate = RfkillPowerGate::new(tree.dir.path(), Duration::from_secs(3), cancel);
        let error = gate.power_on().expect_err("cancelled");
        assert!(matches!(error, PowerError::Cancelled));
        assert_eq!(tree.state(1), "0");
    }
}
