//! `softapd` entrypoint: answers `softap` commands read from stdin.

use std::io::{self, Write};
use std::process::ExitCode;

use softapd::{SystemConfigLoader, run};

fn main() -> ExitCode {
    let stdin = io::stdin().lock();
    let stdout = io::stdout().lock();
    match run(&SystemConfigLoader, stdin, stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(target: concat!(env!("CARGO_PKG_NAME"), "::main"), error = %error, "softapd failed");
            // Telemetry may not be installed yet.
            let mut stderr = io::stderr().lock();
            if writeln!(stderr, "softapd: {error}").is_err() {
                return ExitCode::from(2);
            }
            ExitCode::FAILURE
        }
    }
}
