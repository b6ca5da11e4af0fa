//! Shared helpers for container and service tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use turnstile::{
    ActivityReporter, Bucket, BucketConfig, BucketFactory, Clock, Decision, ManualClock,
    MemoryBucketFactory, QuotaError, ServiceConfig,
};

/// Wraps the in-memory factory, counting bucket constructions and
/// destructions so eviction tests can observe the watcher's work.
pub struct CountingFactory {
    inner: MemoryBucketFactory,
    created: AtomicUsize,
    destroyed: Arc<AtomicUsize>,
}

impl CountingFactory {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(ManualClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: MemoryBucketFactory::with_clock(clock),
            created: AtomicUsize::new(0),
            destroyed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl BucketFactory for CountingFactory {
    fn init(&self, cfg: &ServiceConfig) -> Result<(), QuotaError> {
        self.inner.init(cfg)
    }

    fn new_bucket(
        &self,
        namespace: &str,
        name: &str,
        cfg: BucketConfig,
        dynamic: bool,
    ) -> Arc<dyn Bucket> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Arc::new(CountingBucket {
            inner: self.inner.new_bucket(namespace, name, cfg, dynamic),
            destroyed: Arc::clone(&self.destroyed),
        })
    }
}

struct CountingBucket {
    inner: Arc<dyn Bucket>,
    destroyed: Arc<AtomicUsize>,
}

#[async_trait]
impl Bucket for CountingBucket {
    async fn take(&self, num_tokens: i64, max_wait: Duration) -> Result<Decision, QuotaError> {
        self.inner.take(num_tokens, max_wait).await
    }

    fn config(&self) -> &BucketConfig {
        self.inner.config()
    }

    fn dynamic(&self) -> bool {
        self.inner.dynamic()
    }

    fn destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        self.inner.destroy();
    }
}

impl ActivityReporter for CountingBucket {
    fn report_activity(&self) {
        self.inner.report_activity();
    }

    fn activity_detected(&self) -> bool {
        self.inner.activity_detected()
    }
}
