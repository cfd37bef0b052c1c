//! [`ServiceManager`] backed by `systemctl`.

use std::ffi::OsString;
use std::io;
use std::process::{Command, Output};

use super::{DaemonRunState, ServiceManager, ServiceStatus};

/// Drives services through `systemctl`.
///
/// Start requests are queued with `--no-block`; readiness is observed by
/// polling `ActiveState`. The unit's `InvocationID` serves as the launch
/// generation.
#[derive(Debug, Clone)]
pub struct SystemdServiceManager {
    program: OsString,
}

impl Default for SystemdServiceManager {
    fn default() -> Self {
        Self {
            program: OsString::from("systemctl"),
        }
    }
}

impl SystemdServiceManager {
    /// Uses `program` in place of `systemctl`.
    #[must_use]
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&str]) -> io::Result<Output> {
        let output = Command::new(&self.program).args(args).output()?;
        if output.status.success() {
            return Ok(output);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(io::Error::other(format!(
            "{} {} exited with {}: {}",
            self.program.to_string_lossy(),
            args.join(" "),
            output.status,
            stderr.trim()
        )))
    }
}

impl ServiceManager for SystemdServiceManager {
    fn request_start(&mut self, service: &str) -> io::Result<()> {
        self.run(&["--no-block", "start", service]).map(drop)
    }

    fn request_stop(&mut self, service: &str) -> io::Result<()> {
        self.run(&["--no-block", "stop", service]).map(drop)
    }

    fn status(&mut self, service: &str) -> io::Result<ServiceStatus> {
        let output = self.run(&["show", "--property=ActiveState,InvocationID", service])?;
        Ok(parse_show(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn parse_show(text: &str) -> ServiceStatus {
    let mut status = ServiceStatus::stopped();
    for line in text.lines() {
        match line.split_once('=') {
            Some(("ActiveState", value)) => status.state = map_active_state(value.trim()),
            Some(("InvocationID", value)) if !value.trim().is_empty() => {
                status.generation = Some(value.trim().to_owned());
            }
            _ => {}
        }
    }
    status
}

fn map_active_state(value: &str) -> DaemonRunState {
    match value {
        "active" => DaemonRunState::Running,
        "activating" | "reloading" => DaemonRunState::Starting,
        "deactivating" => DaemonRunState::Stopping,
        _ => DaemonRunState::Stopped,
    }
}
