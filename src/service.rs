//! Stateless façade over the container: resolve, take, classify.

use std::sync::Arc;
use std::time::Duration;

use crate::bucket::{BucketFactory, Decision};
use crate::config::ServiceConfig;
use crate::container::BucketContainer;
use crate::error::QuotaError;

/// A successful token acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    /// Tokens granted (echoes the request).
    pub tokens: i64,
    /// How long the caller should sleep before using them.
    pub wait: Duration,
}

/// The quota arbitration entry point.
///
/// Holds no per-request state: each call resolves a bucket through the
/// container and delegates the accounting to it. Retrying is the caller's
/// concern.
pub struct QuotaService {
    container: BucketContainer,
    default_max_wait: Duration,
}

impl QuotaService {
    /// Build the container from `cfg` with `factory` as its back-end.
    pub fn new(cfg: ServiceConfig, factory: Arc<dyn BucketFactory>) -> Result<Self, QuotaError> {
        let default_max_wait = Duration::from_millis(cfg.default_max_wait_millis);
        let container = BucketContainer::new(cfg, factory)?;
        Ok(Self { container, default_max_wait })
    }

    /// The underlying registry, for lookups and debug dumps.
    pub fn container(&self) -> &BucketContainer {
        &self.container
    }

    /// Ask for `num_tokens` from `(namespace, name)`.
    ///
    /// `max_wait_override` of `None` applies the service default from
    /// configuration; `Some` is used as given, including `Some(ZERO)` for
    /// unbounded patience. Fails with [`QuotaError::NoSuchBucket`] when the
    /// lookup cascade comes up empty and [`QuotaError::TimedOut`] when the
    /// bucket cannot satisfy the request within the wait budget.
    pub async fn allow(
        &self,
        namespace: &str,
        name: &str,
        num_tokens: i64,
        max_wait_override: Option<Duration>,
    ) -> Result<Grant, QuotaError> {
        let bucket = self.container.find(namespace, name).ok_or_else(|| {
            QuotaError::NoSuchBucket { namespace: namespace.to_string(), name: name.to_string() }
        })?;

        let max_wait = max_wait_override.unwrap_or(self.default_max_wait);
        match bucket.take(num_tokens, max_wait).await? {
            Decision::Granted { wait } => Ok(Grant { tokens: num_tokens, wait }),
            Decision::Rejected => Err(QuotaError::TimedOut {
                namespace: namespace.to_string(),
                name: name.to_string(),
                max_wait,
            }),
        }
    }
}
