//! Manually advanced clock.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use http_push::Clock;

/// A [`Clock`] that only moves when told to.
///
/// Clones share the same time, so a test can keep one while the engine owns
/// another.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_millis)),
        }
    }

    pub fn now(&self) -> u64 { self.now.load(Ordering::SeqCst) }

    /// Move the clock forward by `millis`, returning the new time.
    pub fn advance(&self, millis: u64) -> u64 { self.now.fetch_add(millis, Ordering::SeqCst) + millis }

    pub fn set(&self, millis: u64) { self.now.store(millis, Ordering::SeqCst); }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 { self.now() }
}
