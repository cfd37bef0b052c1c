//! Layered configuration for the SoftAP lifecycle controller.
//!
//! [`Config`] is loaded through `ortho_config`, which merges built-in
//! defaults, an optional configuration file, `SOFTAP_*` environment
//! variables and command-line flags (in increasing precedence). The crate
//! also owns the named polling policies ([`Timings`]) so the lifecycle and
//! its tests agree on every bound.

mod defaults;
mod modes;
mod timing;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_AP_INTERFACE, DEFAULT_CTRL_DIR, DEFAULT_DAEMON_START_TIMEOUT_MS,
    DEFAULT_DAEMON_STOP_TIMEOUT_MS, DEFAULT_HOSTAPD_CONFIG_PATH, DEFAULT_HOSTAPD_SERVICE,
    DEFAULT_LOG_FILTER, DEFAULT_POWER_SETTLE_MS, DEFAULT_STA_INTERFACE, default_log_filter,
    default_log_filter_string, default_log_format,
};
pub use modes::{DriverStrategy, LogFormat, SocketFallback};
pub use timing::{PollPolicy, Timings};

/// Runtime configuration shared by the binary and the lifecycle wiring.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SOFTAP")]
pub struct Config {
    /// Tracing filter expression.
    #[serde(default = "defaults::default_log_filter_string")]
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Telemetry output format.
    #[serde(default = "defaults::default_log_format")]
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
    /// Name under which the OS supervisor starts and stops the AP daemon.
    #[serde(default = "defaults::default_hostapd_service")]
    #[ortho_config(default = defaults::default_hostapd_service())]
    pub hostapd_service: String,
    /// Canonical path of the rendered daemon configuration.
    #[serde(default = "defaults::default_hostapd_config_path")]
    #[ortho_config(default = defaults::default_hostapd_config_path())]
    pub hostapd_config_path: Utf8PathBuf,
    /// Template copied into place when the canonical file is missing.
    #[serde(default = "defaults::default_hostapd_config_template")]
    #[ortho_config(default = defaults::default_hostapd_config_template())]
    pub hostapd_config_template: Utf8PathBuf,
    /// Directory in which the daemon publishes control sockets.
    #[serde(default = "defaults::default_ctrl_dir")]
    #[ortho_config(default = defaults::default_ctrl_dir())]
    pub ctrl_dir: Utf8PathBuf,
    /// Directory holding client-side control socket files.
    #[serde(default = "defaults::default_client_dir")]
    #[ortho_config(default = defaults::default_client_dir())]
    pub client_dir: Utf8PathBuf,
    /// Behaviour when the per-interface control file never appears.
    #[serde(default = "defaults::default_socket_fallback")]
    #[ortho_config(default = defaults::default_socket_fallback())]
    pub socket_fallback: SocketFallback,
    /// Root of the rfkill device-class tree.
    #[serde(default = "defaults::default_rfkill_root")]
    #[ortho_config(default = defaults::default_rfkill_root())]
    pub rfkill_root: Utf8PathBuf,
    /// How the driver switches between station and AP mode.
    #[serde(default = "defaults::default_driver_strategy")]
    #[ortho_config(default = defaults::default_driver_strategy())]
    pub driver_strategy: DriverStrategy,
    /// Kernel module name used by the `module` strategy.
    #[serde(default = "defaults::default_driver_module_name")]
    #[ortho_config(default = defaults::default_driver_module_name())]
    pub driver_module_name: String,
    /// Kernel module image used by the `module` strategy.
    #[serde(default = "defaults::default_driver_module_path")]
    #[ortho_config(default = defaults::default_driver_module_path())]
    pub driver_module_path: Utf8PathBuf,
    /// Module arguments for AP mode.
    #[serde(default = "defaults::default_driver_module_ap_args")]
    #[ortho_config(default = defaults::default_driver_module_ap_args())]
    pub driver_module_ap_args: String,
    /// Module arguments for station mode.
    #[serde(default)]
    #[ortho_config(default = String::new())]
    pub driver_module_sta_args: String,
    /// Driver parameter file naming the live interface.
    #[serde(default = "defaults::default_driver_ifname_param")]
    #[ortho_config(default = defaults::default_driver_ifname_param())]
    pub driver_ifname_param: Utf8PathBuf,
    /// Interface name exposed by the driver in AP mode.
    #[serde(default = "defaults::default_ap_interface")]
    #[ortho_config(default = defaults::default_ap_interface())]
    pub ap_interface: String,
    /// Interface name exposed by the driver in station mode.
    #[serde(default = "defaults::default_sta_interface")]
    #[ortho_config(default = defaults::default_sta_interface())]
    pub sta_interface: String,
    /// Owner applied to the daemon configuration file, when set.
    #[serde(default)]
    pub config_owner_uid: Option<u32>,
    /// Group applied to the daemon configuration file, when set.
    #[serde(default)]
    pub config_owner_gid: Option<u32>,
    /// Directory holding `wake_lock` and `wake_unlock`.
    #[serde(default = "defaults::default_wake_lock_dir")]
    #[ortho_config(default = defaults::default_wake_lock_dir())]
    pub wake_lock_dir: Utf8PathBuf,
    /// Settle delay before the rfkill state is written, in milliseconds.
    #[serde(default = "defaults::default_power_settle_ms")]
    #[ortho_config(default = defaults::default_power_settle_ms())]
    pub power_settle_ms: u64,
    /// Bound on waiting for the daemon to report running, in milliseconds.
    #[serde(default = "defaults::default_daemon_start_timeout_ms")]
    #[ortho_config(default = defaults::default_daemon_start_timeout_ms())]
    pub daemon_start_timeout_ms: u64,
    /// Bound on waiting for the daemon to report stopped, in milliseconds.
    #[serde(default = "defaults::default_daemon_stop_timeout_ms")]
    #[ortho_config(default = defaults::default_daemon_stop_timeout_ms())]
    pub daemon_stop_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            hostapd_service: defaults::default_hostapd_service(),
            hostapd_config_path: defaults::default_hostapd_config_path(),
            hostapd_config_template: defaults::default_hostapd_config_template(),
            ctrl_dir: defaults::default_ctrl_dir(),
            client_dir: defaults::default_client_dir(),
            socket_fallback: defaults::default_socket_fallback(),
            rfkill_root: defaults::default_rfkill_root(),
            driver_strategy: defaults::default_driver_strategy(),
            driver_module_name: defaults::default_driver_module_name(),
            driver_module_path: defaults::default_driver_module_path(),
            driver_module_ap_args: defaults::default_driver_module_ap_args(),
            driver_module_sta_args: String::new(),
            driver_ifname_param: defaults::default_driver_ifname_param(),
            ap_interface: defaults::default_ap_interface(),
            sta_interface: defaults::default_sta_interface(),
            config_owner_uid: None,
            config_owner_gid: None,
            wake_lock_dir: defaults::default_wake_lock_dir(),
            power_settle_ms: defaults::default_power_settle_ms(),
            daemon_start_timeout_ms: defaults::default_daemon_start_timeout_ms(),
            daemon_stop_timeout_ms: defaults::default_daemon_stop_timeout_ms(),
        }
    }
}

impl Config {
    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Telemetry output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Canonical path of the rendered daemon configuration.
    #[must_use]
    pub fn hostapd_config_path(&self) -> &Utf8Path {
        &self.hostapd_config_path
    }

    /// Directory in which the daemon publishes control sockets.
    #[must_use]
    pub fn ctrl_dir(&self) -> &Utf8Path {
        &self.ctrl_dir
    }

    /// Ownership to apply to the daemon configuration, when both ids are set.
    #[must_use]
    pub const fn config_owner(&self) -> Option<(u32, u32)> {
        match (self.config_owner_uid, self.config_owner_gid) {
            (Some(uid), Some(gid)) => Some((uid, gid)),
            _ => None,
        }
    }

    /// Builds the polling policies, applying the tunable overrides on top of
    /// the documented defaults.
    #[must_use]
    pub fn timings(&self) -> Timings {
        let mut timings = Timings::default();
        timings.power_settle = Duration::from_millis(self.power_settle_ms);
        timings.daemon_start.timeout = Duration::from_millis(self.daemon_start_timeout_ms);
        timings.daemon_stop.timeout = Duration::from_millis(self.daemon_stop_timeout_ms);
        timings
    }
}
