//! Wall clock abstraction for testable timestamps

use parking_lot::Mutex;
use std::sync::Arc;

/// Source of wall-clock time in milliseconds since the Unix epoch
pub trait WallClock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Real system clock
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually advanced clock for tests
#[derive(Clone)]
pub struct FakeClock {
    now: Arc<Mutex<i64>>,
}

impl FakeClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: Arc::new(Mutex::new(start_ms)),
        }
    }

    pub fn advance_ms(&self, delta: i64) {
        *self.now.lock() += delta;
    }
}

impl WallClock for FakeClock {
    fn now_ms(&self) -> i64 {
        *self.now.lock()
    }
}
