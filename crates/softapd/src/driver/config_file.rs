//! Guarantees the daemon configuration exists before the daemon is started.

use std::fs;
use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use nix::unistd::{AccessFlags, access};
use tracing::{info, warn};

use softap_config::Config;

use super::{DRIVER_TARGET, DriverError};
use crate::hostapd::{CONFIG_MODE, apply_mode_and_owner};

/// Location, template and ownership of the daemon configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFileSpec {
    path: PathBuf,
    template: PathBuf,
    owner: Option<(u32, u32)>,
}

impl ConfigFileSpec {
    /// Describes the configuration file at `path`, seeded from `template`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, template: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            template: template.into(),
            owner: None,
        }
    }

    /// Applies `uid:gid` ownership to freshly copied files.
    #[must_use]
    pub const fn with_owner(mut self, owner: Option<(u32, u32)>) -> Self {
        self.owner = owner;
        self
    }

    pub(crate) fn from_config(config: &Config) -> Self {
        Self::new(
            config.hostapd_config_path.as_std_path(),
            config.hostapd_config_template.as_std_path(),
        )
        .with_owner(config.config_owner())
    }

    /// Leaves an accessible file at the canonical path, copying the template
    /// when necessary.
    pub(crate) fn ensure_exists(&self) -> Result<(), DriverError> {
        match access(&self.path, AccessFlags::R_OK | AccessFlags::W_OK) {
            Ok(()) => return Ok(()),
            Err(Errno::ENOENT) => {}
            Err(errno) => return Err(self.missing(io::Error::from(errno))),
        }
        if let Err(source) = self.copy_template() {
            if let Err(error) = fs::remove_file(&self.path)
                && error.kind() != io::ErrorKind::NotFound
            {
                warn!(
                    target: DRIVER_TARGET,
                    path = %self.path.display(),
                    error = %error,
                    "failed to remove partial configuration copy"
                );
            }
            return Err(self.missing(source));
        }
        info!(
            target: DRIVER_TARGET,
            path = %self.path.display(),
            template = %self.template.display(),
            "daemon configuration seeded from template"
        );
        Ok(())
    }

    fn copy_template(&self) -> io::Result<()> {
        fs::copy(&self.template, &self.path)?;
        apply_mode_and_owner(&self.path, CONFIG_MODE, self.owner)
    }

    fn missing(&self, source: io::Error) -> DriverError {
        DriverError::ConfigMissing {
            path: self.path.clone(),
            source,
        }
    }
}
