//! Daemon start-up: configuration, telemetry, production wiring and the
//! command loop.

use std::io::{self, BufRead, Write};
use std::process;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tracing::{info, warn};

use softap_config::Config;

use crate::command::handle_line;
use crate::driver::DriverBinder;
use crate::hostapd::HostapdConfigWriter;
use crate::interface::IpLinkInterface;
use crate::lifecycle::{Collaborators, SoftapLifecycle};
use crate::poll::Cancellation;
use crate::power::RfkillPowerGate;
use crate::session::ControlSession;
use crate::shutdown::{ShutdownError, ShutdownWatch};
use crate::supervisor::{DaemonSupervisor, SystemdServiceManager};
use crate::telemetry::{self, TelemetryError};
use crate::wake_lock::SysfsWakeLock;

const BOOTSTRAP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bootstrap");

/// Source of the daemon configuration.
pub trait ConfigLoader: Send + Sync {
    /// Loads the configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader merging defaults, file, `SOFTAP_*` environment and CLI flags.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors that end the daemon.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry could not be installed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The termination signal watcher could not be installed.
    #[error("failed to watch for termination signals: {source}")]
    Shutdown {
        /// Watcher error.
        #[source]
        source: ShutdownError,
    },
    /// The command stream could not be read or answered.
    #[error("command stream failed: {source}")]
    Io {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Wires the Linux implementations of every collaborator from `config`.
#[must_use]
pub fn build_lifecycle(config: &Config, cancel: &Cancellation) -> SoftapLifecycle {
    let timings = config.timings();
    let power = RfkillPowerGate::new(
        config.rfkill_root.as_std_path(),
        timings.power_settle,
        cancel.clone(),
    );
    let parts = Collaborators {
        driver: Box::new(DriverBinder::from_config(power, config, &timings, cancel)),
        interface: Box::new(IpLinkInterface::new(
            timings.interface_settle,
            cancel.clone(),
        )),
        daemon: Box::new(DaemonSupervisor::new(
            SystemdServiceManager::default(),
            config,
            &timings,
            cancel.clone(),
        )),
        session: Box::new(ControlSession::new(config, &timings, cancel.clone())),
        config_sink: Box::new(HostapdConfigWriter::from_config(config)),
        wake_lock: Arc::new(SysfsWakeLock::new(config.wake_lock_dir.as_std_path())),
    };
    SoftapLifecycle::with_config(parts, config)
}

/// Answers each command line on `input` with one line on `output`.
///
/// At end of input an access point that is still running is stopped.
///
/// # Errors
///
/// Returns the first IO error from either stream. The access point is still
/// stopped in that case.
pub fn serve<R, W>(lifecycle: &SoftapLifecycle, input: R, output: W) -> io::Result<()>
where
    R: BufRead,
    W: Write,
{
    let outcome = answer_lines(lifecycle, input, output);
    if lifecycle.is_softap_started() {
        info!(target: BOOTSTRAP_TARGET, "command stream closed; stopping softap");
        if let Err(error) = lifecycle.stop() {
            warn!(target: BOOTSTRAP_TARGET, error = %error, "shutdown stop failed");
        }
    }
    outcome
}

fn answer_lines<R: BufRead, W: Write>(
    lifecycle: &SoftapLifecycle,
    input: R,
    mut output: W,
) -> io::Result<()> {
    for line in input.lines() {
        let text = line?;
        if text.trim().is_empty() {
            continue;
        }
        writeln!(output, "{}", handle_line(lifecycle, &text))?;
        output.flush()?;
    }
    Ok(())
}

/// Loads configuration, installs telemetry and serves commands until `input`
/// ends.
///
/// A termination signal cancels any in-flight operation, stops the access
/// point and exits the process.
///
/// # Errors
///
/// Returns [`BootstrapError`] when start-up fails or a stream breaks.
pub fn run<R, W>(loader: &dyn ConfigLoader, input: R, output: W) -> Result<(), BootstrapError>
where
    R: BufRead,
    W: Write,
{
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    info!(
        target: BOOTSTRAP_TARGET,
        service = %config.hostapd_service,
        strategy = %config.driver_strategy,
        "softapd ready"
    );
    let cancel = Cancellation::new();
    let lifecycle = Arc::new(build_lifecycle(&config, &cancel));
    let watch = ShutdownWatch::spawn(Arc::clone(&lifecycle), cancel, |_| process::exit(0))
        .map_err(|source| BootstrapError::Shutdown { source })?;
    let served = serve(&lifecycle, input, output);
    watch.close();
    served.map_err(|source| BootstrapError::Io { source })
}
