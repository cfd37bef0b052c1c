//! Default values shared by the configuration loader and the daemon wiring.

use camino::Utf8PathBuf;

use crate::modes::{DriverStrategy, LogFormat, SocketFallback};

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Service name under which the OS supervisor knows the AP daemon.
pub const DEFAULT_HOSTAPD_SERVICE: &str = "hostapd";

/// Canonical location of the rendered daemon configuration.
pub const DEFAULT_HOSTAPD_CONFIG_PATH: &str = "/var/lib/softap/hostapd.conf";

/// Template copied into place when the canonical configuration is absent.
pub const DEFAULT_HOSTAPD_CONFIG_TEMPLATE: &str = "/usr/share/softap/hostapd.conf";

/// Directory in which the daemon publishes per-interface control sockets.
pub const DEFAULT_CTRL_DIR: &str = "/var/run/hostapd";

/// Directory holding the client end of control sessions.
pub const DEFAULT_CLIENT_DIR: &str = "/tmp";

/// Root of the rfkill device-class tree.
pub const DEFAULT_RFKILL_ROOT: &str = "/sys/class/rfkill";

/// Driver module unloaded and reloaded by the `module` strategy.
pub const DEFAULT_DRIVER_MODULE_NAME: &str = "ar6000";

/// Module image loaded by the `module` strategy.
pub const DEFAULT_DRIVER_MODULE_PATH: &str = "/lib/modules/ar6000.ko";

/// Module arguments used when loading the driver in AP mode.
pub const DEFAULT_DRIVER_MODULE_AP_ARGS: &str = "ifname=athap0 wowenable=0";

/// Module parameter file naming the live interface for the `rename` strategy.
pub const DEFAULT_DRIVER_IFNAME_PARAM: &str = "/sys/module/ar6000/parameters/ifname";

/// Interface name the driver exposes in AP mode.
pub const DEFAULT_AP_INTERFACE: &str = "athap0";

/// Interface name the driver exposes in station mode.
pub const DEFAULT_STA_INTERFACE: &str = "wlan0";

/// Directory holding the kernel wake-lock control files.
pub const DEFAULT_WAKE_LOCK_DIR: &str = "/sys/power";

/// Settle delay before the rfkill state is written.
pub const DEFAULT_POWER_SETTLE_MS: u64 = 3_000;

/// Bound on waiting for the daemon to report running.
pub const DEFAULT_DAEMON_START_TIMEOUT_MS: u64 = 30_000;

/// Bound on waiting for the daemon to report stopped.
pub const DEFAULT_DAEMON_STOP_TIMEOUT_MS: u64 = 5_000;

/// Default log filter expression used by the binary.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binary.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

pub(crate) fn default_hostapd_service() -> String {
    DEFAULT_HOSTAPD_SERVICE.to_owned()
}

pub(crate) fn default_hostapd_config_path() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_HOSTAPD_CONFIG_PATH)
}

pub(crate) fn default_hostapd_config_template() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_HOSTAPD_CONFIG_TEMPLATE)
}

pub(crate) fn default_ctrl_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_CTRL_DIR)
}

pub(crate) fn default_client_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_CLIENT_DIR)
}

pub(crate) fn default_socket_fallback() -> SocketFallback {
    SocketFallback::BareName
}

pub(crate) fn default_rfkill_root() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_RFKILL_ROOT)
}

pub(crate) fn default_driver_strategy() -> DriverStrategy {
    DriverStrategy::Rename
}

pub(crate) fn default_driver_module_name() -> String {
    DEFAULT_DRIVER_MODULE_NAME.to_owned()
}

pub(crate) fn default_driver_module_path() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_DRIVER_MODULE_PATH)
}

pub(crate) fn default_driver_module_ap_args() -> String {
    DEFAULT_DRIVER_MODULE_AP_ARGS.to_owned()
}

pub(crate) fn default_driver_ifname_param() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_DRIVER_IFNAME_PARAM)
}

pub(crate) fn default_ap_interface() -> String {
    DEFAULT_AP_INTERFACE.to_owned()
}

pub(crate) fn default_sta_interface() -> String {
    DEFAULT_STA_INTERFACE.to_owned()
}

pub(crate) fn default_wake_lock_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_WAKE_LOCK_DIR)
}

pub(crate) const fn default_power_settle_ms() -> u64 {
    DEFAULT_POWER_SETTLE_MS
}

pub(crate) const fn default_daemon_start_timeout_ms() -> u64 {
    DEFAULT_DAEMON_START_TIMEOUT_MS
}

pub(crate) const fn default_daemon_stop_timeout_ms() -> u64 {
    DEFAULT_DAEMON_STOP_TIMEOUT_MS
}
