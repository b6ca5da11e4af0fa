//! Coalesced activity signalling between hot paths and idle watchers.

use std::sync::atomic::{AtomicBool, Ordering};

/// Activity feedback from token acquisition paths to the cold watcher that
/// decides whether a bucket is still in use.
///
/// Both operations are non-blocking: `report_activity` is called on every
/// take, `activity_detected` once per idle period.
pub trait ActivityReporter {
    /// Record that the resource was used. Never blocks, never allocates.
    fn report_activity(&self);

    /// Read-and-clear: whether any activity occurred since the last call.
    fn activity_detected(&self) -> bool;
}

/// Single-slot latch backed by an atomic flag.
///
/// Any number of concurrent `report_activity` calls coalesce into at most one
/// observable event per intervening `activity_detected`.
#[derive(Debug, Default)]
pub struct ActivitySignal {
    touched: AtomicBool,
}

impl ActivitySignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_activity(&self) {
        self.touched.store(true, Ordering::Release);
    }

    pub fn activity_detected(&self) -> bool {
        self.touched.swap(false, Ordering::AcqRel)
    }
}

impl ActivityReporter for ActivitySignal {
    fn report_activity(&self) {
        ActivitySignal::report_activity(self);
    }

    fn activity_detected(&self) -> bool {
        ActivitySignal::activity_detected(self)
    }
}
