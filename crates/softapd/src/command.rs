//! The `softap` command surface.
//!
//! Commands arrive as whitespace-separated tokens and every command yields
//! exactly one [`Response`]: a numeric [`ResponseCode`] followed by a human
//! readable message.

use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

use crate::driver::DriverMode;
use crate::hostapd::{ApConfig, ApConfigError};
use crate::lifecycle::{ReconfigureOutcome, SoftapLifecycle, StartOutcome, StopOutcome};

const COMMAND_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::command");

/// Arguments `set` needs before the optional security tail.
const SET_REQUIRED_ARGUMENTS: usize = 4;

/// Coarse result code reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    /// The command succeeded; the message carries the status.
    SoftapStatusResult,
    /// A stop, set or fwreload step failed.
    OperationFailed,
    /// The access point could not be started.
    ServiceStartFailed,
    /// The command line could not be parsed.
    CommandSyntaxError,
    /// An argument was present but not an accepted value.
    CommandParameterError,
}

impl ResponseCode {
    /// Numeric wire value.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::SoftapStatusResult => 214,
            Self::OperationFailed => 400,
            Self::ServiceStartFailed => 402,
            Self::CommandSyntaxError => 500,
            Self::CommandParameterError => 501,
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Result code.
    pub code: ResponseCode,
    /// Message following the code.
    pub message: String,
}

impl Response {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            code: ResponseCode::SoftapStatusResult,
            message: message.into(),
        }
    }

    fn failed(code: ResponseCode, error: &dyn std::error::Error) -> Self {
        Self {
            code,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message)
    }
}

/// Command lines that cannot be run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The line held no command.
    #[error("missing command")]
    Empty,
    /// The command verb is not recognised.
    #[error("unknown command '{0}'")]
    Unknown(String),
    /// A required argument was absent.
    #[error("'{command}' requires {argument}")]
    MissingArgument {
        /// Command verb.
        command: &'static str,
        /// Description of the absent argument.
        argument: &'static str,
    },
    /// `fwreload` named a firmware other than `AP`, `P2P` or `STA`.
    #[error("unknown firmware mode '{0}'")]
    UnknownFirmwareMode(String),
}

impl CommandError {
    /// Code reported for this error.
    #[must_use]
    pub const fn response_code(&self) -> ResponseCode {
        match self {
            Self::UnknownFirmwareMode(_) => ResponseCode::CommandParameterError,
            Self::Empty | Self::Unknown(_) | Self::MissingArgument { .. } => {
                ResponseCode::CommandSyntaxError
            }
        }
    }
}

/// Firmware image selected by `fwreload`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareMode {
    /// Access-point firmware.
    AccessPoint,
    /// Wi-Fi Direct firmware.
    PeerToPeer,
    /// Client firmware.
    Station,
}

impl FirmwareMode {
    /// Parses the exact tokens `AP`, `P2P` and `STA`.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "AP" => Some(Self::AccessPoint),
            "P2P" => Some(Self::PeerToPeer),
            "STA" => Some(Self::Station),
            _ => None,
        }
    }

    /// Driver mode serving this firmware. Wi-Fi Direct runs on the client
    /// driver.
    #[must_use]
    pub const fn driver_mode(self) -> DriverMode {
        match self {
            Self::AccessPoint => DriverMode::AccessPoint,
            Self::PeerToPeer | Self::Station => DriverMode::Station,
        }
    }
}

/// A parsed `softap` command.
#[derive(Clone, PartialEq, Eq)]
pub enum SoftapCommand {
    /// Bring the access point up on `iface`.
    Start {
        /// Interface to serve.
        iface: String,
    },
    /// Tear the access point down.
    Stop,
    /// Report the current state.
    Status,
    /// Replace the access point configuration.
    Set {
        /// Argument tail, starting at the interface name.
        args: Vec<String>,
    },
    /// Rebind the driver for another firmware image.
    FwReload {
        /// Interface being reloaded.
        iface: String,
        /// Requested firmware.
        mode: FirmwareMode,
    },
}

impl SoftapCommand {
    /// Parses a tokenised command line. A leading `softap` token is optional.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] for empty lines, unknown verbs, missing
    /// arguments and unknown firmware modes. Surplus arguments are ignored.
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Result<Self, CommandError> {
        let mut words = tokens.iter().map(AsRef::<str>::as_ref).peekable();
        if words.peek() == Some(&"softap") {
            words.next();
        }
        let verb = words.next().ok_or(CommandError::Empty)?;
        match verb {
            "start" => {
                let iface = words.next().ok_or(CommandError::MissingArgument {
                    command: "start",
                    argument: "an interface",
                })?;
                Ok(Self::Start {
                    iface: iface.to_owned(),
                })
            }
            "stop" => Ok(Self::Stop),
            "status" => Ok(Self::Status),
            "set" => {
                let args: Vec<String> = words.map(str::to_owned).collect();
                if args.len() < SET_REQUIRED_ARGUMENTS {
                    return Err(CommandError::MissingArgument {
                        command: "set",
                        argument: "<iface> <ssid> <hidden|broadcast> <channel>",
                    });
                }
                Ok(Self::Set { args })
            }
            "fwreload" => {
                let (Some(iface), Some(token)) = (words.next(), words.next()) else {
                    return Err(CommandError::MissingArgument {
                        command: "fwreload",
                        argument: "<iface> <AP|P2P|STA>",
                    });
                };
                let mode = FirmwareMode::parse(token)
                    .ok_or_else(|| CommandError::UnknownFirmwareMode(token.to_owned()))?;
                Ok(Self::FwReload {
                    iface: iface.to_owned(),
                    mode,
                })
            }
            other => Err(CommandError::Unknown(other.to_owned())),
        }
    }

    /// The command verb.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Stop => "stop",
            Self::Status => "status",
            Self::Set { .. } => "set",
            Self::FwReload { .. } => "fwreload",
        }
    }
}

// `set` arguments may carry a passphrase.
impl fmt::Debug for SoftapCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start { iface } => f.debug_struct("Start").field("iface", iface).finish(),
            Self::Stop => f.write_str("Stop"),
            Self::Status => f.write_str("Status"),
            Self::Set { args } => f
                .debug_struct("Set")
                .field("args", &args.len())
                .finish_non_exhaustive(),
            Self::FwReload { iface, mode } => f
                .debug_struct("FwReload")
                .field("iface", iface)
                .field("mode", mode)
                .finish(),
        }
    }
}

/// Runs `command` against `lifecycle` and builds its response.
#[must_use]
pub fn dispatch(lifecycle: &SoftapLifecycle, command: SoftapCommand) -> Response {
    debug!(target: COMMAND_TARGET, command = command.verb(), "dispatching command");
    let response = match command {
        SoftapCommand::Start { iface } => match lifecycle.start(&iface) {
            Ok(StartOutcome::Started) => Response::ok("Softap service started"),
            Ok(StartOutcome::AlreadyRunning) => Response::ok("Softap service is already running"),
            Err(error) => Response::failed(error.response_code(), &error),
        },
        SoftapCommand::Stop => match lifecycle.stop() {
            Ok(StopOutcome::Stopped) => Response::ok("Softap service stopped"),
            Ok(StopOutcome::AlreadyStopped) => Response::ok("Softap service is not running"),
            Err(error) => Response::failed(error.response_code(), &error),
        },
        SoftapCommand::Status => Response::ok(lifecycle.status().to_string()),
        SoftapCommand::Set { args } => match ApConfig::from_set_arguments(args.as_slice()) {
            Ok(config) => match lifecycle.reconfigure(config) {
                Ok(ReconfigureOutcome::Saved) => Response::ok("Softap configuration saved"),
                Ok(ReconfigureOutcome::Applied) => Response::ok("Softap configuration applied"),
                Ok(ReconfigureOutcome::Queued) => Response::ok("Softap configuration queued"),
                Err(error) => Response::failed(error.response_code(), &error),
            },
            Err(error @ ApConfigError::MissingArgument(_)) => {
                Response::failed(ResponseCode::CommandSyntaxError, &error)
            }
            Err(error @ ApConfigError::Security(_)) => {
                Response::failed(ResponseCode::OperationFailed, &error)
            }
        },
        SoftapCommand::FwReload { iface, mode } => {
            match lifecycle.reload_firmware(&iface, mode.driver_mode()) {
                Ok(()) => Response::ok("Softap firmware reloaded"),
                Err(error) => Response::failed(error.response_code(), &error),
            }
        }
    };
    if response.code != ResponseCode::SoftapStatusResult {
        warn!(target: COMMAND_TARGET, code = response.code.code(), message = %response.message, "command failed");
    }
    response
}

/// Parses and runs one command line.
#[must_use]
pub fn handle_line(lifecycle: &SoftapLifecycle, line: &str) -> Response {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match SoftapCommand::parse(&tokens) {
        Ok(command) => dispatch(lifecycle, command),
        Err(error) => Response::failed(error.response_code(), &error),
    }
}
