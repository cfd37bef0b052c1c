//! Bounded polling shared by every wait in the lifecycle.
//!
//! The radio, the driver and the daemon expose no push notification, so each
//! readiness check is a sleep-and-probe loop bounded by a [`PollPolicy`].
//! Every loop also observes a [`Cancellation`] token so a stuck collaborator
//! cannot hang the process.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use softap_config::PollPolicy;

const CANCEL_SLICE: Duration = Duration::from_millis(50);

/// Cooperative cancellation shared between the lifecycle and its waits.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    /// Creates a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that every wait observing this token stops early.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`Cancellation::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Why a bounded wait ended without producing a value.
#[derive(Debug)]
pub enum WaitError<E> {
    /// The deadline elapsed.
    Timeout {
        /// Time spent waiting.
        waited: Duration,
    },
    /// The cancellation token fired.
    Cancelled,
    /// The probe reported a terminal failure.
    Aborted(E),
}

/// Probes `condition` every `policy.interval` until it yields a value, fails
/// terminally, the deadline elapses or `cancel` fires.
///
/// The condition returns `Ok(Some(value))` to finish, `Ok(None)` to keep
/// polling and `Err(error)` to abort. The condition always runs at least once,
/// so a zero deadline still performs a single probe.
pub fn wait_until<T, E, F>(
    policy: PollPolicy,
    cancel: &Cancellation,
    mut condition: F,
) -> Result<T, WaitError<E>>
where
    F: FnMut() -> Result<Option<T>, E>,
{
    let started = Instant::now();
    let deadline = started + policy.timeout;
    loop {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled);
        }
        if let Some(value) = condition().map_err(WaitError::Aborted)? {
            return Ok(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(WaitError::Timeout {
                waited: now.duration_since(started),
            });
        }
        let remaining = deadline.saturating_duration_since(now);
        if !settle(policy.interval.min(remaining), cancel) {
            return Err(WaitError::Cancelled);
        }
    }
}

/// Sleeps for `duration` in short slices, returning false if `cancel` fired
/// before the delay elapsed.
pub fn settle(duration: Duration, cancel: &Cancellation) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return true;
        }
        thread::sleep(remaining.min(CANCEL_SLICE));
    }
}
