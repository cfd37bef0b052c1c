//! Access point parameters and their rendering into a daemon configuration.
//!
//! [`ApConfig`] is built from the `softap set` argument tail, rendered once
//! into `key=value` lines and handed to a [`ConfigSink`].

mod writer;

use std::fmt::{self, Write as _};
use std::path::Path;

use thiserror::Error;

use crate::session::SessionError;

pub use writer::{ConfigSink, ConfigWriteError, HostapdConfigWriter};
pub(crate) use writer::{CONFIG_MODE, apply_mode_and_owner};

/// Channel used when the requested one is not a positive integer.
pub const DEFAULT_CHANNEL: u32 = 6;

/// Whether the SSID is advertised in beacons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Visibility {
    /// SSID is broadcast.
    #[default]
    Broadcast,
    /// SSID is hidden.
    Hidden,
}

impl Visibility {
    /// Case-insensitive `hidden` means [`Visibility::Hidden`]; every other
    /// token means [`Visibility::Broadcast`].
    #[must_use]
    pub fn parse(token: &str) -> Self {
        if token.eq_ignore_ascii_case("hidden") {
            Self::Hidden
        } else {
            Self::Broadcast
        }
    }

    const fn ignore_broadcast_ssid(self) -> u8 {
        match self {
            Self::Broadcast => 0,
            Self::Hidden => 1,
        }
    }
}

/// Link security applied to the access point.
#[derive(Clone, PartialEq, Eq)]
pub enum Security {
    /// No authentication.
    Open,
    /// WPA2-personal with CCMP.
    Wpa2Psk {
        /// Pre-shared passphrase, written verbatim.
        passphrase: String,
    },
}

impl fmt::Debug for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("Open"),
            Self::Wpa2Psk { .. } => f
                .debug_struct("Wpa2Psk")
                .field("passphrase", &"<redacted>")
                .finish(),
        }
    }
}

/// Errors raised while building an [`ApConfig`] from command arguments.
#[derive(Debug, Error)]
pub enum ApConfigError {
    /// A required positional argument was not supplied.
    #[error("missing {0} argument")]
    MissingArgument(&'static str),
    /// The security token is not one the renderer understands.
    #[error(transparent)]
    Security(#[from] SessionError),
}

/// Parameters of one access point configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApConfig {
    /// Interface the daemon serves.
    pub iface: String,
    /// Network name.
    pub ssid: String,
    /// Radio channel.
    pub channel: u32,
    /// SSID visibility.
    pub visibility: Visibility,
    /// Link security.
    pub security: Security,
}

impl ApConfig {
    /// Parses `<iface> <ssid> <hidden|broadcast> <channel> [open|wpa2-psk
    /// [passphrase]]`.
    ///
    /// # Errors
    ///
    /// Returns [`ApConfigError::MissingArgument`] when a positional argument
    /// (or the WPA2 passphrase) is absent, and wraps
    /// [`SessionError::UnsupportedSecurity`] for unknown security tokens.
    pub fn from_set_arguments<S: AsRef<str>>(args: &[S]) -> Result<Self, ApConfigError> {
        let mut tokens = args.iter().map(AsRef::<str>::as_ref);
        let iface = tokens.next().ok_or(ApConfigError::MissingArgument("interface"))?;
        let ssid = tokens.next().ok_or(ApConfigError::MissingArgument("ssid"))?;
        let visibility = tokens
            .next()
            .ok_or(ApConfigError::MissingArgument("visibility"))?;
        let channel = tokens.next().ok_or(ApConfigError::MissingArgument("channel"))?;
        let security = match tokens.next() {
            None | Some("open") => Security::Open,
            Some("wpa2-psk") => {
                let passphrase = tokens
                    .next()
                    .ok_or(ApConfigError::MissingArgument("passphrase"))?;
                Security::Wpa2Psk {
                    passphrase: passphrase.to_owned(),
                }
            }
            Some(token) => {
                return Err(SessionError::UnsupportedSecurity {
                    token: token.to_owned(),
                }
                .into());
            }
        };
        Ok(Self {
            iface: iface.to_owned(),
            ssid: ssid.to_owned(),
            channel: parse_channel(channel),
            visibility: Visibility::parse(visibility),
            security,
        })
    }

    /// Renders the daemon configuration, pointing its control interface at
    /// `ctrl_dir`.
    #[must_use]
    pub fn render(&self, ctrl_dir: &Path) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ignored = self.render_into(&mut out, ctrl_dir);
        out
    }

    fn render_into(&self, out: &mut String, ctrl_dir: &Path) -> fmt::Result {
        writeln!(out, "interface={}", self.iface)?;
        writeln!(out, "ctrl_interface={}", ctrl_dir.display())?;
        writeln!(out, "ssid={}", self.ssid)?;
        writeln!(out, "channel={}", self.channel)?;
        writeln!(
            out,
            "ignore_broadcast_ssid={}",
            self.visibility.ignore_broadcast_ssid()
        )?;
        out.push_str("auth_algs=1\nmax_num_sta=8\nbeacon_int=100\ndtim_period=1\n");
        if let Security::Wpa2Psk { passphrase } = &self.security {
            out.push_str("wpa=2\nwpa_key_mgmt=WPA-PSK\nwpa_pairwise=CCMP\n");
            writeln!(out, "wpa_passphrase={passphrase}")?;
        }
        Ok(())
    }
}

/// Positive integers are taken as-is; anything else yields
/// [`DEFAULT_CHANNEL`].
#[must_use]
pub fn parse_channel(token: &str) -> u32 {
    match token.trim().parse::<u32>() {
        Ok(channel) if channel > 0 => channel,
        _ => DEFAULT_CHANNEL,
    }
}
