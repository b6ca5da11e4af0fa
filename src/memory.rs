//! In-process token bucket back-end.
//!
//! Token state is a single virtual-schedule pointer: the instant at which
//! the next unconsumed token matures. Tokens mature one every
//! `1e9 / fill_rate` nanoseconds; the pointer runs behind the clock while
//! tokens are banked (bounded by the burst window) and ahead of it while
//! grants are scheduled into the future. A take waits until its first token
//! matures, so requests that arrive while tokens are banked are granted
//! immediately even when they dip into future refill, and requests that
//! arrive at an empty bucket inherit the accumulated debt.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::activity::{ActivityReporter, ActivitySignal};
use crate::bucket::{fully_qualified_name, Bucket, BucketFactory, Decision};
use crate::clock::{Clock, MonotonicClock};
use crate::config::{BucketConfig, ServiceConfig};
use crate::error::QuotaError;

const NANOS_PER_SEC: i128 = 1_000_000_000;
const NANOS_PER_MILLI: i128 = 1_000_000;

/// Factory for process-local buckets.
///
/// The clock is the factory-shared resource: every bucket built here reads
/// the same time source, and destroying a bucket leaves it untouched.
#[derive(Debug)]
pub struct MemoryBucketFactory {
    clock: Arc<dyn Clock>,
}

impl MemoryBucketFactory {
    pub fn new() -> Self {
        Self { clock: Arc::new(MonotonicClock::new()) }
    }

    /// Build buckets against an injected time source. Tests pair this with
    /// [`crate::clock::ManualClock`] for deterministic wait arithmetic.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Default for MemoryBucketFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BucketFactory for MemoryBucketFactory {
    fn init(&self, _cfg: &ServiceConfig) -> Result<(), QuotaError> {
        Ok(())
    }

    fn new_bucket(
        &self,
        namespace: &str,
        name: &str,
        cfg: BucketConfig,
        dynamic: bool,
    ) -> Arc<dyn Bucket> {
        Arc::new(MemoryBucket::new(namespace, name, cfg, dynamic, Arc::clone(&self.clock)))
    }
}

struct Schedule {
    /// Maturity instant of the next unconsumed token, in clock nanos.
    next_token: i128,
}

/// Process-local token bucket.
pub struct MemoryBucket {
    namespace: String,
    name: String,
    config: BucketConfig,
    dynamic: bool,
    activity: ActivitySignal,
    clock: Arc<dyn Clock>,
    nanos_per_token: i128,
    max_debt_nanos: i128,
    state: Mutex<Schedule>,
}

impl MemoryBucket {
    fn new(
        namespace: &str,
        name: &str,
        config: BucketConfig,
        dynamic: bool,
        clock: Arc<dyn Clock>,
    ) -> Self {
        // Rates above one token per nanosecond degrade to that spacing.
        let nanos_per_token = (NANOS_PER_SEC / config.fill_rate.max(1) as i128).max(1);
        let now = clock.now_nanos() as i128;
        // A fresh bucket banks its full burst: `size` tokens matured, the
        // oldest of them `size - 1` spacings ago.
        let next_token = now - (config.size as i128 - 1) * nanos_per_token;
        let max_debt_nanos = config.max_debt_millis as i128 * NANOS_PER_MILLI;
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            config,
            dynamic,
            activity: ActivitySignal::new(),
            clock,
            nanos_per_token,
            max_debt_nanos,
            state: Mutex::new(Schedule { next_token }),
        }
    }

    fn burst_floor(&self, now: i128) -> i128 {
        now - (self.config.size as i128 - 1) * self.nanos_per_token
    }
}

#[async_trait]
impl Bucket for MemoryBucket {
    async fn take(&self, num_tokens: i64, max_wait: Duration) -> Result<Decision, QuotaError> {
        self.activity.report_activity();

        let now = self.clock.now_nanos() as i128;
        let mut schedule = self.state.lock().unwrap();

        // Refill, bounded by the burst window.
        let floor = self.burst_floor(now);
        if schedule.next_token < floor {
            schedule.next_token = floor;
        }

        let cost = num_tokens as i128 * self.nanos_per_token;

        if num_tokens <= 0 {
            // Returned tokens rewind the schedule; the burst clamp above
            // bounds the credit on the next take.
            schedule.next_token += cost;
            return Ok(Decision::Granted { wait: Duration::ZERO });
        }

        let wait_nanos = (schedule.next_token - now).max(0);

        if !max_wait.is_zero() && wait_nanos as u128 > max_wait.as_nanos() {
            return Ok(Decision::Rejected);
        }
        if self.max_debt_nanos > 0 && schedule.next_token + cost - now > self.max_debt_nanos {
            return Ok(Decision::Rejected);
        }

        schedule.next_token += cost;
        let wait = Duration::from_nanos(u64::try_from(wait_nanos).unwrap_or(u64::MAX));
        Ok(Decision::Granted { wait })
    }

    fn config(&self) -> &BucketConfig {
        &self.config
    }

    fn dynamic(&self) -> bool {
        self.dynamic
    }

    fn destroy(&self) {
        // No back-end resources beyond the factory-shared clock.
        debug!(bucket = %fully_qualified_name(&self.namespace, &self.name), "destroying in-memory bucket");
    }
}

impl ActivityReporter for MemoryBucket {
    fn report_activity(&self) {
        self.activity.report_activity();
    }

    fn activity_detected(&self) -> bool {
        self.activity.activity_detected()
    }
}
