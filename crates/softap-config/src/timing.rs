//! Named polling policies for every bounded wait in the lifecycle.
//!
//! None of the collaborators offer a synchronous readiness signal, so each
//! wait is expressed as an interval and a deadline. Keeping them together makes
//! each one individually tunable and testable.

use std::time::Duration;

/// An `(interval, deadline)` pair governing one polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause between consecutive probes.
    pub interval: Duration,
    /// Total time allowed before the wait gives up.
    pub timeout: Duration,
}

impl PollPolicy {
    /// Builds a policy from an interval and a deadline.
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Builds a policy allowing `attempts` probes spaced by `interval`.
    #[must_use]
    pub const fn attempts_of(interval: Duration, attempts: u32) -> Self {
        Self {
            interval,
            timeout: interval.saturating_mul(attempts),
        }
    }

    /// Number of probes the deadline allows, never less than one.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        if self.interval.is_zero() {
            return 1;
        }
        let count = self.timeout.as_nanos() / self.interval.as_nanos();
        u32::try_from(count).unwrap_or(u32::MAX).max(1)
    }
}

/// Every delay and polling bound used while bringing the access point up or
/// down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Pause before writing a new rfkill state.
    pub power_settle: Duration,
    /// Pause after renaming the driver interface.
    pub rename_settle: Duration,
    /// Pause after loading the driver module.
    pub module_settle: Duration,
    /// Retries while the kernel reports the module busy.
    pub module_unload: PollPolicy,
    /// Pause after bringing the AP interface administratively up.
    pub interface_settle: Duration,
    /// Wait for the daemon to report running.
    pub daemon_start: PollPolicy,
    /// Wait for the daemon to report stopped.
    pub daemon_stop: PollPolicy,
    /// Wait for the daemon to publish its control file.
    pub socket_file: PollPolicy,
    /// Retries while opening the control socket.
    pub socket_open: PollPolicy,
    /// Receive timeout for a single control-protocol reply.
    pub reply: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            power_settle: Duration::from_secs(3),
            rename_settle: Duration::from_millis(500),
            module_settle: Duration::from_secs(1),
            module_unload: PollPolicy::attempts_of(Duration::from_millis(500), 10),
            interface_settle: Duration::from_secs(1),
            daemon_start: PollPolicy::new(Duration::from_millis(100), Duration::from_secs(30)),
            daemon_stop: PollPolicy::new(Duration::from_millis(100), Duration::from_secs(5)),
            socket_file: PollPolicy::new(Duration::from_millis(50), Duration::from_secs(8)),
            socket_open: PollPolicy::attempts_of(Duration::from_millis(100), 15),
            reply: Duration::from_secs(2),
        }
    }
}

impl Timings {
    /// Timings with every delay collapsed, for exercising control flow in
    /// tests without sleeping.
    #[must_use]
    pub fn immediate() -> Self {
        let tick = Duration::from_millis(1);
        Self {
            power_settle: Duration::ZERO,
            rename_settle: Duration::ZERO,
            module_settle: Duration::ZERO,
            module_unload: PollPolicy::attempts_of(tick, 3),
            interface_settle: Duration::ZERO,
            daemon_start: PollPolicy::attempts_of(tick, 20),
            daemon_stop: PollPolicy::attempts_of(tick, 20),
            socket_file: PollPolicy::attempts_of(tick, 20),
            socket_open: PollPolicy::attempts_of(tick, 3),
            reply: Duration::from_millis(500),
        }
    }
}
