//! Enumerated configuration switches.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How the driver is moved between station and access-point mode.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum DriverStrategy {
    /// Unload the driver module and load it again with mode-specific arguments.
    Module,
    /// Rename the live interface through the driver's `ifname` parameter.
    #[default]
    Rename,
}

/// What to do when the daemon never publishes its per-interface control file.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum SocketFallback {
    /// Fail the session with an unreachable error.
    None,
    /// Retry with the bare interface name, as daemon builds using
    /// abstract-namespace sockets expect.
    #[default]
    BareName,
}

/// Output format of the telemetry subscriber.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Single-line human-readable events.
    Compact,
}
