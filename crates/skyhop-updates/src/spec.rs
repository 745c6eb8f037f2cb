//! Cadence and result types for periodic updates

use std::time::Duration;
use tokio::sync::watch;

/// Cadence policy for one refreshable resource.
///
/// Periodic execution is attempted only while every liveness signal
/// currently holds true; forced execution ignores the signals.
#[derive(Clone)]
pub struct PeriodicUpdateSpec {
    pub interval: Duration,
    /// Shorter cadence used after a failed attempt, until success
    pub retry_interval: Option<Duration>,
    pub signals: Vec<watch::Receiver<bool>>,
}

impl PeriodicUpdateSpec {
    pub fn new(interval: Duration, signals: Vec<watch::Receiver<bool>>) -> Self {
        Self {
            interval,
            retry_interval: None,
            signals,
        }
    }

    pub fn with_retry(
        interval: Duration,
        retry_interval: Duration,
        signals: Vec<watch::Receiver<bool>>,
    ) -> Self {
        Self {
            interval,
            retry_interval: Some(retry_interval),
            signals,
        }
    }

    /// All liveness signals currently hold
    pub(crate) fn is_active(&self) -> bool {
        self.signals.iter().all(|signal| *signal.borrow())
    }
}

/// Outcome of one update attempt
pub struct PeriodicActionResult<R> {
    pub result: R,
    pub success: bool,
    /// Lets an action override the delay to its own next attempt
    pub next_call_delay_override: Option<Duration>,
}

impl<R> PeriodicActionResult<R> {
    pub fn ok(result: R) -> Self {
        Self {
            result,
            success: true,
            next_call_delay_override: None,
        }
    }

    pub fn failure(result: R) -> Self {
        Self {
            result,
            success: false,
            next_call_delay_override: None,
        }
    }

    pub fn with_next_delay(mut self, delay: Duration) -> Self {
        self.next_call_delay_override = Some(delay);
        self
    }
}
