//! Bucket and factory contracts shared by every back-end.
//!
//! The engine never looks inside a bucket: all it relies on is the
//! [`Bucket`] trait below, which couples token accounting (`take`) with the
//! activity signal the idle watchers consume. Back-ends differ only in the
//! [`BucketFactory`] wired into the container; token state may live in
//! process memory or in a shared datastore, as long as the observable wait
//! semantics match.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::activity::ActivityReporter;
use crate::config::{BucketConfig, ServiceConfig};
use crate::error::QuotaError;

/// The outcome of a token acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Tokens were granted. `wait` is how long the caller should sleep
    /// before using them; zero means they are available immediately.
    Granted { wait: Duration },
    /// Tokens cannot be made available within the caller's wait budget.
    Rejected,
}

impl Decision {
    /// Helper to check if tokens were granted.
    pub fn is_granted(&self) -> bool {
        matches!(self, Decision::Granted { .. })
    }

    /// The wait attached to a grant, or `None` for a rejection.
    pub fn wait(&self) -> Option<Duration> {
        match self {
            Decision::Granted { wait } => Some(*wait),
            Decision::Rejected => None,
        }
    }
}

/// A token bucket bound to a (namespace, name) identity.
///
/// The identity and the `dynamic` flag are fixed for the bucket's lifetime.
#[async_trait]
pub trait Bucket: ActivityReporter + Send + Sync {
    /// Acquire `num_tokens` tokens.
    ///
    /// A `max_wait` of zero asks for the tokens unconditionally, reporting
    /// whatever wait the grant implies. A positive `max_wait` bounds the
    /// caller's patience: the take is rejected when the implied wait would
    /// exceed it. Negative `num_tokens` returns tokens to the bucket; the
    /// exact arithmetic is back-end defined.
    ///
    /// Implementations must be safe under concurrent calls on the same
    /// bucket and must report activity on every call, grant or reject. They
    /// may block on back-end I/O but are never called under a container
    /// lock.
    async fn take(&self, num_tokens: i64, max_wait: Duration) -> Result<Decision, QuotaError>;

    /// The configuration this bucket was built from.
    fn config(&self) -> &BucketConfig;

    /// Whether this bucket was created from a namespace template at lookup
    /// time rather than from static configuration.
    fn dynamic(&self) -> bool;

    /// Release back-end resources. Idempotent. Called exactly once, by the
    /// idle watcher, after the bucket has been removed from its namespace.
    /// Must not tear down resources shared through the factory; I/O errors
    /// are logged and swallowed.
    fn destroy(&self);
}

/// Constructs buckets for one back-end.
///
/// The factory is the single injection point distinguishing back-ends;
/// exactly one factory serves a container. Resources the factory owns
/// (connections, compiled server-side scripts) are shared by every bucket it
/// produces and outlive all of them.
pub trait BucketFactory: Send + Sync {
    /// One-time initialization; may load server-side back-end resources.
    fn init(&self, cfg: &ServiceConfig) -> Result<(), QuotaError>;

    /// Build a fully usable bucket bound to `(namespace, name)`.
    fn new_bucket(
        &self,
        namespace: &str,
        name: &str,
        cfg: BucketConfig,
        dynamic: bool,
    ) -> Arc<dyn Bucket>;
}

/// Canonical `namespace:name` rendering used in logs.
pub fn fully_qualified_name(namespace: &str, name: &str) -> String {
    format!("{}:{}", namespace, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_accessors() {
        let granted = Decision::Granted { wait: Duration::from_millis(3) };
        assert!(granted.is_granted());
        assert_eq!(granted.wait(), Some(Duration::from_millis(3)));

        assert!(!Decision::Rejected.is_granted());
        assert_eq!(Decision::Rejected.wait(), None);
    }

    #[test]
    fn fqn_renders_colon_separated() {
        assert_eq!(fully_qualified_name("ns", "b"), "ns:b");
    }
}
