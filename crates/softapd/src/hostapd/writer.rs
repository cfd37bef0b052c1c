//! Atomic persistence of the rendered daemon configuration.

use std::fs::{self, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use nix::unistd::{Gid, Uid, chown};
use tempfile::Builder;
use thiserror::Error;
use tracing::debug;

use softap_config::Config;

const HOSTAPD_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::hostapd");

/// Mode applied to the daemon configuration: owner and group read/write.
pub(crate) const CONFIG_MODE: u32 = 0o660;

/// Errors raised while persisting the daemon configuration.
#[derive(Debug, Error)]
pub enum ConfigWriteError {
    /// The configuration could not be written into place.
    #[error("failed to write daemon configuration {path:?}: {source}")]
    Write {
        /// Canonical configuration path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Destination for rendered daemon configurations.
#[cfg_attr(test, mockall::automock)]
pub trait ConfigSink: Send {
    /// Replaces the configuration with `rendered`.
    fn write(&mut self, rendered: &str) -> Result<(), ConfigWriteError>;
}

/// [`ConfigSink`] that replaces the configuration file atomically.
#[derive(Debug, Clone)]
pub struct HostapdConfigWriter {
    path: PathBuf,
    owner: Option<(u32, u32)>,
}

impl HostapdConfigWriter {
    /// Writes to `path` without changing ownership.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            owner: None,
        }
    }

    /// Builds the writer for the configured path and ownership.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            path: config.hostapd_config_path().as_std_path().to_path_buf(),
            owner: config.config_owner(),
        }
    }

    fn write_atomically(&self, contents: &[u8]) -> io::Result<()> {
        let directory = self.path.parent().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "configuration path has no parent directory",
            )
        })?;
        let prefix = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("hostapd.conf");

        let mut file = Builder::new()
            .prefix(prefix)
            .suffix(".tmp")
            .permissions(Permissions::from_mode(CONFIG_MODE))
            .tempfile_in(directory)?;
        file.write_all(contents)?;
        apply_mode_and_owner(file.path(), CONFIG_MODE, self.owner)?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|error| error.error)?;
        Ok(())
    }
}

impl ConfigSink for HostapdConfigWriter {
    fn write(&mut self, rendered: &str) -> Result<(), ConfigWriteError> {
        self.write_atomically(rendered.as_bytes())
            .map_err(|source| ConfigWriteError::Write {
                path: self.path.clone(),
                source,
            })?;
        debug!(
            target: HOSTAPD_TARGET,
            path = %self.path.display(),
            bytes = rendered.len(),
            "daemon configuration written"
        );
        Ok(())
    }
}

/// Sets `mode` on `path` and, when given, its `uid:gid` ownership.
///
/// The mode is applied explicitly because creation modes are filtered
/// through the process umask.
pub(crate) fn apply_mode_and_owner(
    path: &Path,
    mode: u32,
    owner: Option<(u32, u32)>,
) -> io::Result<()> {
    fs::set_permissions(path, Permissions::from_mode(mode))?;
    if let Some((uid, gid)) = owner {
        chown(path, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid)))
            .map_err(io::Error::from)?;
    }
    Ok(())
}
