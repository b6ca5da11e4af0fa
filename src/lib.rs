#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Turnstile
//!
//! A quota service core: clients ask to consume N tokens from a named
//! bucket, and the service grants immediately, grants with a wait hint, or
//! rejects.
//!
//! ## Features
//!
//! - **Namespaced buckets** with global and per-namespace defaults
//! - **Lazy dynamic buckets** minted from a per-namespace template, under a
//!   configurable cap
//! - **Idle eviction** driven by a coalesced activity signal
//! - **Pluggable back-ends** behind a factory trait; an in-memory token
//!   bucket ships in [`memory`]
//! - **Transport-agnostic RPC contract** in [`rpc`] and a tower layer in
//!   [`middleware`]
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use turnstile::{
//!     BucketConfig, MemoryBucketFactory, NamespaceConfig, QuotaService, ServiceConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), turnstile::QuotaError> {
//!     let config = ServiceConfig::default().with_namespace(
//!         "api",
//!         NamespaceConfig::default()
//!             .with_bucket("search", BucketConfig::new(100, 50))
//!             .with_dynamic_template(BucketConfig::new(10, 10), 100),
//!     );
//!
//!     let service = QuotaService::new(config, Arc::new(MemoryBucketFactory::new()))?;
//!
//!     let grant = service.allow("api", "search", 1, None).await?;
//!     assert!(grant.wait.is_zero());
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod bucket;
pub mod clock;
pub mod config;
pub mod container;
pub mod error;
pub mod memory;
pub mod middleware;
pub mod rpc;
pub mod service;

// Re-exports
pub use activity::{ActivityReporter, ActivitySignal};
pub use bucket::{fully_qualified_name, Bucket, BucketFactory, Decision};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{
    BucketConfig, NamespaceConfig, ServiceConfig, DEFAULT_BUCKET_NAME, GLOBAL_NAMESPACE,
};
pub use container::BucketContainer;
pub use error::QuotaError;
pub use memory::{MemoryBucket, MemoryBucketFactory};
pub use middleware::{GateError, KeyExtractor, QuotaKey, QuotaLayer, QuotaMiddleware};
pub use rpc::{handle_allow, AllowRequest, AllowResponse, Status};
pub use service::{Grant, QuotaService};
