//! The two mode-switch mechanisms supported by the driver.

use std::ffi::CString;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::errno::Errno;
use nix::kmod::{DeleteModuleFlags, delete_module, init_module};
use tracing::{debug, info, warn};

use softap_config::{Config, PollPolicy, Timings};

use super::{BindFailure, DRIVER_TARGET, DriverMode};
use crate::poll::{Cancellation, WaitError, settle, wait_until};

/// Result of a mode switch that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The driver changed mode.
    Switched,
    /// The driver was already in the requested mode.
    AlreadyInMode,
}

/// Performs the mode change itself; power sequencing is the caller's job.
pub trait ModeSwitch: Send {
    /// Moves the driver into `target` mode.
    fn switch(&mut self, target: DriverMode) -> Result<SwitchOutcome, BindFailure>;

    /// Mode the driver reports, when the mechanism can observe it.
    fn current(&mut self) -> Option<DriverMode> {
        None
    }
}

/// Kernel module loading primitives.
#[cfg_attr(test, mockall::automock)]
pub trait KernelModules: Send {
    /// Removes a loaded module without blocking on its users.
    fn unload(&mut self, name: &str) -> Result<(), Errno>;

    /// Loads a module image with the given argument string.
    fn load(&mut self, image: &[u8], args: &str) -> Result<(), Errno>;
}

/// [`KernelModules`] backed by the `delete_module` and `init_module` syscalls.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemKernelModules;

impl KernelModules for SystemKernelModules {
    fn unload(&mut self, name: &str) -> Result<(), Errno> {
        let c_name = CString::new(name).map_err(|_| Errno::EINVAL)?;
        delete_module(&c_name, DeleteModuleFlags::O_NONBLOCK)
    }

    fn load(&mut self, image: &[u8], args: &str) -> Result<(), Errno> {
        let c_args = CString::new(args).map_err(|_| Errno::EINVAL)?;
        init_module(image, &c_args)
    }
}

/// Reloads the driver module with mode-specific arguments.
pub struct ModuleReload<K> {
    modules: K,
    name: String,
    image: PathBuf,
    ap_args: String,
    sta_args: String,
    unload_policy: PollPolicy,
    settle_delay: Duration,
    cancel: Cancellation,
}

impl<K: KernelModules> ModuleReload<K> {
    /// Builds the switch from the configured module name, image and
    /// arguments.
    pub fn new(modules: K, config: &Config, timings: &Timings, cancel: Cancellation) -> Self {
        Self {
            modules,
            name: config.driver_module_name.clone(),
            image: config.driver_module_path.clone().into_std_path_buf(),
            ap_args: config.driver_module_ap_args.clone(),
            sta_args: config.driver_module_sta_args.clone(),
            unload_policy: timings.module_unload,
            settle_delay: timings.module_settle,
            cancel,
        }
    }

    fn unload(&mut self) -> Result<(), BindFailure> {
        let name = self.name.clone();
        let modules = &mut self.modules;
        let result = wait_until(self.unload_policy, &self.cancel, || {
            match modules.unload(&name) {
                Ok(()) | Err(Errno::ENOENT) => Ok(Some(())),
                Err(Errno::EAGAIN) => Ok(None),
                Err(errno) => Err(errno),
            }
        });
        match result {
            Ok(()) => Ok(()),
            Err(WaitError::Cancelled) => Err(BindFailure::Cancelled),
            // A module that refuses to unload surfaces as a load failure.
            Err(WaitError::Timeout { .. }) => {
                warn!(target: DRIVER_TARGET, module = %self.name, "driver module stayed busy");
                Ok(())
            }
            Err(WaitError::Aborted(errno)) => {
                warn!(
                    target: DRIVER_TARGET,
                    module = %self.name,
                    error = %errno,
                    "failed to unload driver module"
                );
                Ok(())
            }
        }
    }
}

impl<K: KernelModules> ModeSwitch for ModuleReload<K> {
    fn switch(&mut self, target: DriverMode) -> Result<SwitchOutcome, BindFailure> {
        self.unload()?;
        let image = fs::read(&self.image).map_err(|source| BindFailure::ModuleImage {
            path: self.image.clone(),
            source,
        })?;
        let args = match target {
            DriverMode::AccessPoint => self.ap_args.as_str(),
            DriverMode::Station => self.sta_args.as_str(),
        };
        self.modules
            .load(&image, args)
            .map_err(|source| BindFailure::ModuleLoad {
                name: self.name.clone(),
                source,
            })?;
        info!(target: DRIVER_TARGET, module = %self.name, args, "driver module loaded");
        if !settle(self.settle_delay, &self.cancel) {
            return Err(BindFailure::Cancelled);
        }
        Ok(SwitchOutcome::Switched)
    }
}

/// Renames the live interface through the driver's `ifname` parameter.
#[derive(Debug)]
pub struct InterfaceRename {
    param: PathBuf,
    ap_name: String,
    sta_name: String,
    settle_delay: Duration,
    cancel: Cancellation,
}

impl InterfaceRename {
    /// Builds the switch for the given parameter file and interface names.
    pub fn new(
        param: &Path,
        ap_name: &str,
        sta_name: &str,
        settle_delay: Duration,
        cancel: Cancellation,
    ) -> Self {
        Self {
            param: param.to_path_buf(),
            ap_name: ap_name.to_owned(),
            sta_name: sta_name.to_owned(),
            settle_delay,
            cancel,
        }
    }

    fn parameter_error(&self, source: std::io::Error) -> BindFailure {
        BindFailure::Parameter {
            path: self.param.clone(),
            source,
        }
    }
}

impl ModeSwitch for InterfaceRename {
    fn switch(&mut self, target: DriverMode) -> Result<SwitchOutcome, BindFailure> {
        let wanted = match target {
            DriverMode::AccessPoint => self.ap_name.as_str(),
            DriverMode::Station => self.sta_name.as_str(),
        };
        let contents =
            fs::read_to_string(&self.param).map_err(|source| self.parameter_error(source))?;
        let current = contents.trim();
        if current == wanted {
            return Ok(SwitchOutcome::AlreadyInMode);
        }
        debug!(target: DRIVER_TARGET, from = current, to = wanted, "renaming interface");
        // Same open flags as a shell redirect, which sysfs attributes accept.
        OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.param)
            .and_then(|mut file| file.write_all(wanted.as_bytes()))
            .map_err(|source| self.parameter_error(source))?;
        info!(target: DRIVER_TARGET, iface = wanted, mode = %target, "interface renamed");
        if !settle(self.settle_delay, &self.cancel) {
            return Err(BindFailure::Cancelled);
        }
        Ok(SwitchOutcome::Switched)
    }

    fn current(&mut self) -> Option<DriverMode> {
        let contents = match fs::read_to_string(&self.param) {
            Ok(contents) => contents,
            Err(error) => {
                debug!(target: DRIVER_TARGET, error = %error, "driver parameter unreadable");
                return None;
            }
        };
        let name = contents.trim();
        if name == self.ap_name {
            Some(DriverMode::AccessPoint)
        } else if name == self.sta_name {
            Some(DriverMode::Station)
        } else {
            None
        }
    }
}
