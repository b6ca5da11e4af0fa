//! Clock abstractions used by token buckets and tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Thread-safe time source abstraction.
///
/// The return value is nanoseconds since the implementer's origin.
/// Implementers must document whether the origin is wall-clock or monotonic
/// process time; callers only compare readings from the same instance.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time in nanoseconds relative to the implementer's origin.
    fn now_nanos(&self) -> u64;
}

/// Monotonic clock backed by `Instant::now()`.
///
/// Clones share the same epoch (instant captured at creation). Independently
/// created instances have different epochs and their readings are not
/// directly comparable.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    /// Create a new monotonic clock starting at `Instant::now()`.
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    /// Nanoseconds elapsed since this instance's epoch; saturates at
    /// `u64::MAX` (more than 584 years in).
    fn now_nanos(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

/// Test clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let by = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(by, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn monotonic_non_decreasing() {
        let clock = MonotonicClock::new();
        let first = clock.now_nanos();
        let second = clock.now_nanos();
        assert!(second >= first);
    }

    #[test]
    fn clones_share_epoch() {
        let clock = MonotonicClock::new();
        let clone = clock.clone();
        thread::sleep(Duration::from_millis(2));
        let a = clock.now_nanos();
        let b = clone.now_nanos();
        assert!(a.abs_diff(b) < Duration::from_millis(50).as_nanos() as u64);
    }

    #[test]
    fn manual_clock_only_moves_on_advance() {
        let clock = ManualClock::new();
        assert_eq!(clock.now_nanos(), 0);
        thread::sleep(Duration::from_millis(2));
        assert_eq!(clock.now_nanos(), 0);
        clock.advance(Duration::from_millis(5));
        assert_eq!(clock.now_nanos(), 5_000_000);
    }

    #[test]
    fn trait_object_usage() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new());
        assert_eq!(clock.now_nanos(), 0);
    }
}
