//! Moves the wireless driver between station and access-point mode.
//!
//! A mode change is only safe with the radio rail settled, so every switch
//! is bracketed by the power gate: off, switch, on. How the switch itself is
//! performed depends on the build (see [`DriverStrategy`]): either the driver
//! module is reloaded with mode-specific arguments, or the live interface is
//! renamed through a driver parameter.

mod config_file;
mod switch;

use std::fmt;
use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;
use tracing::{info, warn};

use softap_config::{Config, DriverStrategy, Timings};

use crate::poll::Cancellation;
use crate::power::{PowerError, RadioPower, RadioPowerState};

pub use config_file::ConfigFileSpec;
pub use switch::{
    InterfaceRename, KernelModules, ModeSwitch, ModuleReload, SwitchOutcome, SystemKernelModules,
};

pub(crate) const DRIVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::driver");

/// Operating mode of the wireless driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverMode {
    /// Client mode.
    Station,
    /// Access-point mode.
    AccessPoint,
}

impl fmt::Display for DriverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Station => f.write_str("station"),
            Self::AccessPoint => f.write_str("access-point"),
        }
    }
}

/// Low-level reason a bind attempt failed.
#[derive(Debug, Error)]
pub enum BindFailure {
    /// The power gate failed while bracketing the switch.
    #[error(transparent)]
    Power(#[from] PowerError),
    /// The driver's interface-name parameter could not be read or written.
    #[error("failed to access driver parameter {path:?}: {source}")]
    Parameter {
        /// Parameter file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The module image could not be read.
    #[error("failed to read module image {path:?}: {source}")]
    ModuleImage {
        /// Module image path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The kernel rejected the module load.
    #[error("kernel rejected module {name}: {source}")]
    ModuleLoad {
        /// Module name.
        name: String,
        /// Errno reported by the kernel.
        #[source]
        source: Errno,
    },
    /// A settle delay was interrupted.
    #[error("mode switch cancelled")]
    Cancelled,
}

/// Errors reported by the driver binder.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The power sequence or the mode switch failed.
    #[error("failed to bind driver in {mode} mode: {source}")]
    BindFailed {
        /// Mode that was requested.
        mode: DriverMode,
        /// Underlying failure.
        #[source]
        source: BindFailure,
    },
    /// Neither the daemon configuration nor its template could be put in place.
    #[error("daemon configuration {path:?} is missing: {source}")]
    ConfigMissing {
        /// Canonical configuration path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Driver operations the lifecycle depends on.
pub trait DriverControl: Send {
    /// Runs the power-off, switch, power-on sequence for `target`. Binding in
    /// access-point mode also ensures the daemon configuration exists.
    ///
    /// Every failure leaves the radio powered off.
    fn bind_mode(&mut self, target: DriverMode, iface: &str) -> Result<(), DriverError>;

    /// Binds the driver in access-point mode.
    fn bind_access_point(&mut self, iface: &str) -> Result<(), DriverError> {
        self.bind_mode(DriverMode::AccessPoint, iface)
    }

    /// Returns the driver to station naming and leaves the radio off.
    fn unbind(&mut self, iface: &str) -> Result<(), DriverError>;

    /// Reads the radio rail state.
    fn radio_state(&mut self) -> Result<RadioPowerState, PowerError>;

    /// Mode the driver is in, or `None` when it cannot be told.
    fn mode(&mut self) -> Option<DriverMode>;
}

/// [`DriverControl`] implementation bracketing a [`ModeSwitch`] with a
/// [`RadioPower`] gate.
pub struct DriverBinder<P> {
    power: P,
    switch: Box<dyn ModeSwitch>,
    config_file: ConfigFileSpec,
    bound: Option<DriverMode>,
}

impl<P: RadioPower> DriverBinder<P> {
    /// Assembles a binder from its parts.
    pub fn new(power: P, switch: Box<dyn ModeSwitch>, config_file: ConfigFileSpec) -> Self {
        Self {
            power,
            switch,
            config_file,
            bound: None,
        }
    }

    /// Builds the binder selected by the configured [`DriverStrategy`].
    pub fn from_config(
        power: P,
        config: &Config,
        timings: &Timings,
        cancel: &Cancellation,
    ) -> Self {
        let switch: Box<dyn ModeSwitch> = match config.driver_strategy {
            DriverStrategy::Module => Box::new(ModuleReload::new(
                SystemKernelModules,
                config,
                timings,
                cancel.clone(),
            )),
            DriverStrategy::Rename => Box::new(InterfaceRename::new(
                config.driver_ifname_param.as_std_path(),
                &config.ap_interface,
                &config.sta_interface,
                timings.rename_settle,
                cancel.clone(),
            )),
        };
        Self::new(power, switch, ConfigFileSpec::from_config(config))
    }

    fn sequence(&mut self, target: DriverMode) -> Result<(), DriverError> {
        self.power_off_for(target)?;
        self.switch_for(target)?;
        if let Err(error) = self.power.power_on() {
            return Err(self.fail(target, error.into()));
        }
        if target == DriverMode::AccessPoint
            && let Err(error) = self.config_file.ensure_exists()
        {
            self.force_off();
            return Err(error);
        }
        Ok(())
    }

    fn power_off_for(&mut self, mode: DriverMode) -> Result<(), DriverError> {
        self.power
            .power_off()
            .map_err(|error| DriverError::BindFailed {
                mode,
                source: error.into(),
            })
    }

    fn switch_for(&mut self, mode: DriverMode) -> Result<(), DriverError> {
        match self.switch.switch(mode) {
            Ok(SwitchOutcome::Switched) => Ok(()),
            Ok(SwitchOutcome::AlreadyInMode) => {
                info!(target: DRIVER_TARGET, mode = %mode, "driver already in requested mode");
                Ok(())
            }
            Err(failure) => Err(self.fail(mode, failure)),
        }
    }

    fn fail(&mut self, mode: DriverMode, source: BindFailure) -> DriverError {
        self.force_off();
        DriverError::BindFailed { mode, source }
    }

    fn force_off(&mut self) {
        if let Err(error) = self.power.power_off() {
            warn!(
                target: DRIVER_TARGET,
                error = %error,
                "failed to leave radio powered off after bind failure"
            );
        }
    }
}

impl<P: RadioPower> DriverControl for DriverBinder<P> {
    fn bind_mode(&mut self, target: DriverMode, iface: &str) -> Result<(), DriverError> {
        info!(target: DRIVER_TARGET, mode = %target, iface, "binding driver");
        // A failed sequence may stop anywhere between the two modes.
        self.bound = None;
        self.sequence(target)?;
        self.bound = Some(target);
        info!(target: DRIVER_TARGET, mode = %target, "driver bound");
        Ok(())
    }

    fn unbind(&mut self, iface: &str) -> Result<(), DriverError> {
        info!(target: DRIVER_TARGET, iface, "returning driver to station mode");
        self.bound = None;
        self.power_off_for(DriverMode::Station)?;
        self.switch_for(DriverMode::Station)?;
        self.bound = Some(DriverMode::Station);
        Ok(())
    }

    fn radio_state(&mut self) -> Result<RadioPowerState, PowerError> {
        self.power.query_power()
    }

    fn mode(&mut self) -> Option<DriverMode> {
        self.switch.current().or(self.bound)
    }
}
