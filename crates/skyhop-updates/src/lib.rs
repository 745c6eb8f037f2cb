//! Periodic refresh scheduling for the Skyhop VPN client core
//!
//! Each refreshable resource (server list, app config, bug-report
//! policy, streaming catalog, translations) registers an async update
//! action under a stable key, with one or more cadence specs gated by
//! liveness signals. The manager guarantees per-key mutual exclusion
//! between periodic and forced runs.

mod manager;
mod spec;

pub use manager::{PeriodicUpdateManager, UpdateHandle};
pub use spec::{PeriodicActionResult, PeriodicUpdateSpec};
