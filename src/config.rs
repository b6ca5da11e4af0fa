//! Service, namespace, and bucket configuration.
//!
//! The configuration tree is immutable once loaded: a [`ServiceConfig`] maps
//! namespace names to [`NamespaceConfig`]s, each of which maps bucket names
//! to [`BucketConfig`]s and optionally carries a default bucket and a
//! template for lazily created buckets. Reload is not supported; build a new
//! container to pick up new configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::QuotaError;

/// Namespace reserved for the global default bucket.
pub const GLOBAL_NAMESPACE: &str = "___GLOBAL___";

/// Bucket name reserved for default buckets, global or namespace-scoped.
pub const DEFAULT_BUCKET_NAME: &str = "___DEFAULT_BUCKET___";

/// Top-level configuration consumed by the container at construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Fallback bucket for lookups into namespaces that are not configured.
    pub global_default_bucket: Option<BucketConfig>,

    pub namespaces: HashMap<String, NamespaceConfig>,

    /// Wait budget applied when a caller does not override it. Zero means
    /// callers are infinitely patient: takes are granted with whatever wait
    /// they imply.
    pub default_max_wait_millis: u64,
}

/// Per-namespace bucket policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceConfig {
    /// Fallback bucket for names this namespace does not otherwise serve.
    pub default_bucket: Option<BucketConfig>,

    /// When present, unknown names are served by a bucket created lazily
    /// from this template on first lookup.
    pub dynamic_bucket_template: Option<BucketConfig>,

    /// Cap on live lazily-created buckets. Zero means unbounded.
    pub max_dynamic_buckets: usize,

    /// Statically configured buckets, built eagerly at container
    /// construction.
    pub buckets: HashMap<String, BucketConfig>,
}

/// Tunables for a single bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketConfig {
    /// Tokens added per second.
    pub fill_rate: u64,

    /// Burst capacity: the most tokens the bucket banks while idle.
    pub size: u64,

    /// Inactivity window after which the bucket is evicted and destroyed.
    /// Zero disables eviction.
    pub max_idle_millis: u64,

    /// Bound on how far token grants may be scheduled into the future.
    /// Zero means unbounded.
    pub max_debt_millis: u64,

    /// Back-end specific tunables, passed through opaquely.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            fill_rate: 50,
            size: 100,
            max_idle_millis: 0,
            max_debt_millis: 0,
            extra: HashMap::new(),
        }
    }
}

impl BucketConfig {
    pub fn new(fill_rate: u64, size: u64) -> Self {
        Self { fill_rate, size, ..Default::default() }
    }

    pub fn with_max_idle_millis(mut self, millis: u64) -> Self {
        self.max_idle_millis = millis;
        self
    }

    pub fn with_max_debt_millis(mut self, millis: u64) -> Self {
        self.max_debt_millis = millis;
        self
    }

    fn validate(&self, context: &str) -> Result<(), QuotaError> {
        if self.fill_rate == 0 {
            return Err(QuotaError::invalid_config(format!("{}: fill_rate must be positive", context)));
        }
        if self.size == 0 {
            return Err(QuotaError::invalid_config(format!("{}: size must be positive", context)));
        }
        Ok(())
    }
}

impl NamespaceConfig {
    pub fn with_default_bucket(mut self, cfg: BucketConfig) -> Self {
        self.default_bucket = Some(cfg);
        self
    }

    pub fn with_bucket(mut self, name: impl Into<String>, cfg: BucketConfig) -> Self {
        self.buckets.insert(name.into(), cfg);
        self
    }

    pub fn with_dynamic_template(mut self, template: BucketConfig, max_dynamic_buckets: usize) -> Self {
        self.dynamic_bucket_template = Some(template);
        self.max_dynamic_buckets = max_dynamic_buckets;
        self
    }

    fn validate(&self, ns_name: &str) -> Result<(), QuotaError> {
        if let Some(cfg) = &self.default_bucket {
            cfg.validate(&format!("namespace {} default bucket", ns_name))?;
        }
        if let Some(cfg) = &self.dynamic_bucket_template {
            cfg.validate(&format!("namespace {} dynamic bucket template", ns_name))?;
        }
        for (bucket_name, cfg) in &self.buckets {
            validate_user_name(bucket_name, "bucket name")?;
            cfg.validate(&format!("bucket {}:{}", ns_name, bucket_name))?;
        }
        Ok(())
    }
}

impl ServiceConfig {
    pub fn with_global_default(mut self, cfg: BucketConfig) -> Self {
        self.global_default_bucket = Some(cfg);
        self
    }

    pub fn with_namespace(mut self, name: impl Into<String>, ns: NamespaceConfig) -> Self {
        self.namespaces.insert(name.into(), ns);
        self
    }

    pub fn with_default_max_wait_millis(mut self, millis: u64) -> Self {
        self.default_max_wait_millis = millis;
        self
    }

    /// Parse and validate a configuration document.
    pub fn from_json_str(raw: &str) -> Result<Self, QuotaError> {
        let cfg: Self = serde_json::from_str(raw)
            .map_err(|e| QuotaError::invalid_config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations that claim reserved identifiers or describe
    /// buckets that could never hand out a token.
    pub fn validate(&self) -> Result<(), QuotaError> {
        if let Some(cfg) = &self.global_default_bucket {
            cfg.validate("global default bucket")?;
        }
        for (ns_name, ns) in &self.namespaces {
            validate_user_name(ns_name, "namespace name")?;
            ns.validate(ns_name)?;
        }
        Ok(())
    }
}

fn validate_user_name(name: &str, what: &str) -> Result<(), QuotaError> {
    if name.is_empty() {
        return Err(QuotaError::invalid_config(format!("{} must not be empty", what)));
    }
    if name == GLOBAL_NAMESPACE || name == DEFAULT_BUCKET_NAME {
        return Err(QuotaError::invalid_config(format!("{} {:?} is reserved", what, name)));
    }
    Ok(())
}
