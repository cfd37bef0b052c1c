//! Sequencing of the access point lifecycle.
//!
//! [`SoftapLifecycle`] advances through [`LifecycleState`] one collaborator
//! call at a time: bind the driver, bring the interface up, start the daemon,
//! attach a control session, then take the wake lock. A failure at any step
//! unwinds the completed steps in reverse so the lifecycle always settles in
//! `Idle` or `Active`.

mod controller;
mod error;
mod state;
#[cfg(test)]
mod tests;

pub use controller::{Collaborators, SoftapLifecycle};
pub use error::{LifecycleError, StepError};
pub use state::{LifecycleState, ReconfigureOutcome, SoftapStatus, StartOutcome, StopOutcome};
