//! Control-protocol session with the access point daemon.
//!
//! The daemon publishes one datagram socket per interface under its control
//! directory once it is ready. A client binds its own socket, connects to the
//! published one and sends `ATTACH` so the daemon treats it as a listener.
//! Only one session is live at a time; opening a new one closes the old.


use std::fs;
use std::io;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use nix::unistd::{AccessFlags, access};
use socket2::{Domain, SockAddr, Socket, Type};
use thiserror::Error;
use tracing::{debug, info, warn};

use softap_config::{Config, PollPolicy, SocketFallback, Timings};

use crate::poll::{Cancellation, WaitError, wait_until};
use crate::supervisor::DaemonControl;

const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// File name prefix of client-side control sockets.
pub const CLIENT_SOCKET_PREFIX: &str = "softap_ctrl_";

const REPLY_CAPACITY: usize = 4096;

static CLIENT_SEQUENCE: AtomicUsize = AtomicUsize::new(0);

/// Errors raised by the control session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The supervisor does not report the daemon as running.
    #[error("access point daemon is not running")]
    DaemonNotRunning,
    /// The control socket could not be located or opened.
    #[error("control socket {path:?} unreachable: {source}")]
    Unreachable {
        /// Control socket path.
        path: PathBuf,
        /// Last IO error observed.
        #[source]
        source: io::Error,
    },
    /// The daemon did not accept the listener handshake.
    #[error("attach to {path:?} failed: {reason}")]
    AttachFailed {
        /// Control socket path.
        path: PathBuf,
        /// Reply or IO failure describing the rejection.
        reason: String,
    },
    /// A request was made with no live session.
    #[error("no control session is open")]
    NoSession,
    /// Sending a request or receiving its reply failed.
    #[error("control request {command} failed: {source}")]
    Request {
        /// Command that was sent.
        command: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The daemon answered a request with something other than `OK`.
    #[error("control request {command} rejected: {reply}")]
    Rejected {
        /// Command that was sent.
        command: String,
        /// Reply received.
        reply: String,
    },
    /// The security mode is not one the configuration renderer supports.
    #[error("unsupported security mode {token:?}")]
    UnsupportedSecurity {
        /// Token supplied by the caller.
        token: String,
    },
    /// A wait was interrupted.
    #[error("control session setup cancelled")]
    Cancelled,
}

/// An attached control socket. The client socket file is removed on drop.
#[derive(Debug)]
pub struct ControlSessionHandle {
    socket: UnixDatagram,
    local: PathBuf,
    remote: PathBuf,
}

impl ControlSessionHandle {
    /// Binds a fresh client socket in `client_dir` and connects it to
    /// `remote`.
    ///
    /// # Errors
    ///
    /// Returns the IO error from binding, connecting or configuring the
    /// socket.
    pub fn open(remote: &Path, client_dir: &Path, reply_timeout: Duration) -> io::Result<Self> {
        let sequence = CLIENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let local = client_dir.join(format!(
            "{CLIENT_SOCKET_PREFIX}{}-{sequence}",
            process::id()
        ));
        let socket = Socket::new(Domain::UNIX, Type::DGRAM, None)?;
        socket.bind(&SockAddr::unix(&local)?)?;
        // From here on the bound file exists and is owned by the handle.
        let handle = Self {
            socket: UnixDatagram::from(socket),
            local,
            remote: remote.to_path_buf(),
        };
        handle.socket.connect(remote)?;
        handle.socket.set_read_timeout(Some(reply_timeout))?;
        Ok(handle)
    }

    /// Path of the daemon-side socket.
    #[must_use]
    pub fn remote(&self) -> &Path {
        &self.remote
    }

    /// Sends `command` and returns its reply, skipping unsolicited events.
    ///
    /// # Errors
    ///
    /// Returns the IO error from sending or receiving, including the read
    /// timeout.
    pub fn request(&self, command: &str) -> io::Result<String> {
        self.socket.send(command.as_bytes())?;
        let mut buffer = [0_u8; REPLY_CAPACITY];
        loop {
            let received = self.socket.recv(&mut buffer)?;
            let reply = String::from_utf8_lossy(buffer.get(..received).unwrap_or_default());
            if reply.starts_with('<') {
                debug!(target: SESSION_TARGET, event = %reply.trim_end(), "skipped daemon event");
                continue;
            }
            return Ok(reply.trim_end().to_owned());
        }
    }
}

impl Drop for ControlSessionHandle {
    fn drop(&mut self) {
        if let Err(error) = fs::remove_file(&self.local)
            && error.kind() != io::ErrorKind::NotFound
        {
            warn!(
                target: SESSION_TARGET,
                path = %self.local.display(),
                error = %error,
                "failed to remove client socket"
            );
        }
    }
}

/// Session operations the lifecycle depends on.
pub trait SessionControl: Send {
    /// Opens and attaches a session for `iface`, replacing any live one.
    fn connect(
        &mut self,
        iface: &str,
        daemon: &mut dyn DaemonControl,
    ) -> Result<(), SessionError>;

    /// Asks the daemon to reload its configuration.
    fn reload(&mut self) -> Result<(), SessionError>;

    /// Closes the live session, if any.
    fn close(&mut self);

    /// True while a session is attached.
    fn is_connected(&self) -> bool;
}

/// Owner of the single live [`ControlSessionHandle`].
#[derive(Debug)]
pub struct ControlSession {
    handle: Option<ControlSessionHandle>,
    ctrl_dir: PathBuf,
    client_dir: PathBuf,
    fallback: SocketFallback,
    file_policy: PollPolicy,
    open_policy: PollPolicy,
    reply_timeout: Duration,
    cancel: Cancellation,
}

impl ControlSession {
    /// Builds an unconnected session using the configured directories and
    /// fallback.
    #[must_use]
    pub fn new(config: &Config, timings: &Timings, cancel: Cancellation) -> Self {
        Self {
            handle: None,
            ctrl_dir: config.ctrl_dir().as_std_path().to_path_buf(),
            client_dir: config.client_dir.as_std_path().to_path_buf(),
            fallback: config.socket_fallback,
            file_policy: timings.socket_file,
            open_policy: timings.socket_open,
            reply_timeout: timings.reply,
            cancel,
        }
    }

    /// Sends `command` on the live session and returns the reply.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoSession`] without a live session and
    /// [`SessionError::Request`] when the exchange fails.
    pub fn request(&self, command: &str) -> Result<String, SessionError> {
        let handle = self.handle.as_ref().ok_or(SessionError::NoSession)?;
        handle
            .request(command)
            .map_err(|source| SessionError::Request {
                command: command.to_owned(),
                source,
            })
    }

    fn resolve_socket_path(&self, iface: &str) -> Result<PathBuf, SessionError> {
        let published = self.ctrl_dir.join(iface);
        let appeared = wait_until(self.file_policy, &self.cancel, || {
            Ok::<_, ()>(access(&published, AccessFlags::W_OK).is_ok().then_some(()))
        });
        match appeared {
            Ok(()) => Ok(published),
            Err(WaitError::Cancelled) => Err(SessionError::Cancelled),
            Err(WaitError::Timeout { .. } | WaitError::Aborted(())) => {
                self.fall_back(iface, published)
            }
        }
    }

    fn fall_back(&self, iface: &str, published: PathBuf) -> Result<PathBuf, SessionError> {
        match self.fallback {
            SocketFallback::BareName => {
                warn!(
                    target: SESSION_TARGET,
                    expected = %published.display(),
                    "control socket never appeared; using bare interface name"
                );
                Ok(PathBuf::from(iface))
            }
            SocketFallback::None => Err(SessionError::Unreachable {
                path: published,
                source: io::Error::new(
                    io::ErrorKind::NotFound,
                    "control socket was not published",
                ),
            }),
        }
    }

    fn open_with_retry(&self, path: &Path) -> Result<ControlSessionHandle, SessionError> {
        let mut last_error = None;
        let opened = wait_until(self.open_policy, &self.cancel, || {
            match ControlSessionHandle::open(path, &self.client_dir, self.reply_timeout) {
                Ok(handle) => Ok::<_, ()>(Some(handle)),
                Err(error) => {
                    debug!(target: SESSION_TARGET, error = %error, "control socket not ready");
                    last_error = Some(error);
                    Ok(None)
                }
            }
        });
        match opened {
            Ok(handle) => Ok(handle),
            Err(WaitError::Cancelled) => Err(SessionError::Cancelled),
            Err(WaitError::Timeout { .. } | WaitError::Aborted(())) => {
                Err(SessionError::Unreachable {
                    path: path.to_path_buf(),
                    source: last_error.unwrap_or_else(|| {
                        io::Error::new(io::ErrorKind::TimedOut, "no open attempt completed")
                    }),
                })
            }
        }
    }
}

impl SessionControl for ControlSession {
    fn connect(
        &mut self,
        iface: &str,
        daemon: &mut dyn DaemonControl,
    ) -> Result<(), SessionError> {
        if !daemon.is_running() {
            return Err(SessionError::DaemonNotRunning);
        }
        self.close();
        let path = self.resolve_socket_path(iface)?;
        let handle = self.open_with_retry(&path)?;
        match handle.request("ATTACH") {
            Ok(reply) if reply == "OK" => {}
            Ok(reply) => {
                return Err(SessionError::AttachFailed {
                    path,
                    reason: format!("unexpected reply {reply:?}"),
                });
            }
            Err(error) => {
                return Err(SessionError::AttachFailed {
                    path,
                    reason: error.to_string(),
                });
            }
        }
        info!(target: SESSION_TARGET, path = %path.display(), "attached to control socket");
        self.handle = Some(handle);
        Ok(())
    }

    fn reload(&mut self) -> Result<(), SessionError> {
        let reply = self.request("RELOAD")?;
        if reply != "OK" {
            return Err(SessionError::Rejected {
                command: "RELOAD".to_owned(),
                reply,
            });
        }
        info!(target: SESSION_TARGET, "daemon configuration reloaded");
        Ok(())
    }

    fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!(target: SESSION_TARGET, path = %handle.remote().display(), "closing control session");
        }
    }

    fn is_connected(&self) -> bool {
        self.handle.is_some()
    }
}
