//! Bucket registry: the lookup cascade, lazy dynamic creation, and idle
//! eviction.
//!
//! A [`BucketContainer`] owns one namespace per configured namespace name.
//! The namespace map itself is built once at construction and never
//! mutated, so lookups reach it without a lock; each namespace guards its
//! own bucket map with a reader/writer lock. Buckets are created through
//! the container's single [`BucketFactory`]: eagerly for everything named
//! in configuration, lazily for names served by a dynamic bucket template.
//!
//! Eviction runs beside the lookup path: every named bucket with a positive
//! idle window gets a watcher task that checks its activity signal once per
//! window and, on a silent tick, unlinks and destroys the bucket. The
//! watcher clears the signal before taking the write lock, so a take racing
//! the final tick is observed only after the bucket is already gone; the
//! next lookup simply re-creates it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{debug, warn};

use crate::bucket::{fully_qualified_name, Bucket, BucketFactory};
use crate::config::{
    BucketConfig, NamespaceConfig, ServiceConfig, DEFAULT_BUCKET_NAME, GLOBAL_NAMESPACE,
};
use crate::error::QuotaError;

type BucketMap = HashMap<String, Arc<dyn Bucket>>;

struct Namespace {
    cfg: NamespaceConfig,
    buckets: RwLock<BucketMap>,
    default_bucket: Option<Arc<dyn Bucket>>,
}

/// Top-level bucket registry.
pub struct BucketContainer {
    factory: Arc<dyn BucketFactory>,
    namespaces: HashMap<String, Arc<Namespace>>,
    default_bucket: Option<Arc<dyn Bucket>>,
}

impl fmt::Debug for BucketContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketContainer")
            .field("namespaces", &self.namespaces.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl BucketContainer {
    /// Validate `cfg`, initialize the factory, and build every statically
    /// configured bucket: the global default, each namespace default, and
    /// each named bucket. Named buckets with a positive idle window get a
    /// watcher task, so the container must be constructed inside a tokio
    /// runtime.
    pub fn new(cfg: ServiceConfig, factory: Arc<dyn BucketFactory>) -> Result<Self, QuotaError> {
        cfg.validate()?;
        factory.init(&cfg)?;

        let default_bucket = cfg
            .global_default_bucket
            .as_ref()
            .map(|b| factory.new_bucket(GLOBAL_NAMESPACE, DEFAULT_BUCKET_NAME, b.clone(), false));

        let mut namespaces = HashMap::new();
        for (ns_name, ns_cfg) in &cfg.namespaces {
            let default_bucket = ns_cfg
                .default_bucket
                .as_ref()
                .map(|b| factory.new_bucket(ns_name, DEFAULT_BUCKET_NAME, b.clone(), false));

            let ns = Arc::new(Namespace {
                cfg: ns_cfg.clone(),
                buckets: RwLock::new(HashMap::new()),
                default_bucket,
            });

            {
                let mut buckets = ns.buckets.write().unwrap();
                for (bucket_name, bucket_cfg) in &ns_cfg.buckets {
                    install_bucket(
                        &factory,
                        &ns,
                        &mut buckets,
                        ns_name,
                        bucket_name,
                        bucket_cfg.clone(),
                        false,
                    );
                }
            }

            namespaces.insert(ns_name.clone(), ns);
        }

        Ok(Self { factory, namespaces, default_bucket })
    }

    /// Locate a bucket for `(namespace, name)`.
    ///
    /// Resolution cascade: an unconfigured namespace falls back to the
    /// global default; a configured namespace serves its named bucket if
    /// present, lazily creates one when it carries a dynamic bucket
    /// template (re-building an evicted static bucket from its own
    /// configuration, or minting a dynamic one subject to the cap), and
    /// otherwise falls back to its default bucket. Every bucket returned
    /// has its activity reported first.
    pub fn find(&self, namespace: &str, name: &str) -> Option<Arc<dyn Bucket>> {
        let bucket = match self.namespaces.get(namespace) {
            None => self.default_bucket.clone(),
            Some(ns) => {
                let hit = ns.buckets.read().unwrap().get(name).cloned();
                match hit {
                    Some(bucket) => Some(bucket),
                    None if ns.cfg.dynamic_bucket_template.is_some() => {
                        self.create_named_bucket(namespace, name, ns)
                    }
                    None => ns.default_bucket.clone(),
                }
            }
        };

        if let Some(bucket) = &bucket {
            bucket.report_activity();
        }
        bucket
    }

    /// Whether `(namespace, name)` is currently served by a named bucket.
    /// Defaults do not count.
    pub fn exists(&self, namespace: &str, name: &str) -> bool {
        self.namespaces
            .get(namespace)
            .is_some_and(|ns| ns.buckets.read().unwrap().contains_key(name))
    }

    /// Create a named bucket under the namespace's write lock. Returns
    /// `None` when the dynamic bucket cap has been reached.
    fn create_named_bucket(
        &self,
        ns_name: &str,
        name: &str,
        ns: &Arc<Namespace>,
    ) -> Option<Arc<dyn Bucket>> {
        let mut buckets = ns.buckets.write().unwrap();

        // Another task may have created it while we waited for the lock.
        if let Some(existing) = buckets.get(name) {
            return Some(Arc::clone(existing));
        }

        let (cfg, dynamic) = match ns.cfg.buckets.get(name) {
            // A statically configured bucket that was idle-evicted: rebuild
            // it from its own configuration.
            Some(static_cfg) => (static_cfg.clone(), false),
            None => {
                let cap = ns.cfg.max_dynamic_buckets;
                if cap > 0 {
                    let live = buckets.values().filter(|b| b.dynamic()).count();
                    if live >= cap {
                        warn!(
                            bucket = %fully_qualified_name(ns_name, name),
                            live, cap, "dynamic bucket cap reached, not creating more"
                        );
                        return None;
                    }
                }
                (ns.cfg.dynamic_bucket_template.clone()?, true)
            }
        };

        Some(install_bucket(&self.factory, ns, &mut buckets, ns_name, name, cfg, dynamic))
    }
}

/// Build a bucket, link it into the map, mark it active, and start its
/// watcher.
fn install_bucket(
    factory: &Arc<dyn BucketFactory>,
    ns: &Arc<Namespace>,
    buckets: &mut BucketMap,
    ns_name: &str,
    name: &str,
    cfg: BucketConfig,
    dynamic: bool,
) -> Arc<dyn Bucket> {
    let idle = Duration::from_millis(cfg.max_idle_millis);
    let bucket = factory.new_bucket(ns_name, name, cfg, dynamic);
    buckets.insert(name.to_string(), Arc::clone(&bucket));
    bucket.report_activity();
    watch(Arc::clone(ns), name.to_string(), Arc::clone(&bucket), idle);
    bucket
}

/// Evict `bucket` from `ns` once a full idle window passes without
/// activity. A zero window disables eviction entirely.
fn watch(ns: Arc<Namespace>, name: String, bucket: Arc<dyn Bucket>, window: Duration) {
    if window.is_zero() {
        return;
    }

    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(window);
        ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; the watch starts after it.
        ticks.tick().await;

        loop {
            ticks.tick().await;
            if !bucket.activity_detected() {
                break;
            }
        }

        // Creation is keyed on absence, so the entry under `name` is still
        // this bucket: nothing can have replaced it before this removal.
        ns.buckets.write().unwrap().remove(&name);
        debug!(bucket = %name, "evicting idle bucket");
        bucket.destroy();
    });
}

impl fmt::Display for BucketContainer {
    /// Deterministic dump for debugging: namespaces and bucket names in
    /// lexicographic order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.default_bucket.is_some() {
            writeln!(f, "Global default present")?;
            writeln!(f)?;
        }

        let mut ns_names: Vec<&String> = self.namespaces.keys().collect();
        ns_names.sort();

        for ns_name in ns_names {
            let ns = &self.namespaces[ns_name];
            writeln!(f, " * Namespace: {}", ns_name)?;
            if ns.default_bucket.is_some() {
                writeln!(f, "   + Default present")?;
            }

            let buckets = ns.buckets.read().unwrap();
            let mut names: Vec<&String> = buckets.keys().collect();
            names.sort();
            for name in names {
                writeln!(f, "   + {}", name)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
