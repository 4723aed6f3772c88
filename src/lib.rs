//! # worker-cache
//!
//! Transparent response caching for worker processes that talk to the
//! platform's internal control-plane API.
//!
//! ## Features
//!
//! - Typed serialization codec with a fixed type registry; unknown types
//!   degrade gracefully instead of failing
//! - Deterministic, namespaced cache keys per category plus a hashed generic
//!   path with bounded key length
//! - Redis backend that captures availability at construction and degrades
//!   to a safe no-op mode; cursor-based scanning, pipelined batch writes,
//!   per-call timeouts
//! - Per-category TTL policy table, tunable at runtime
//! - Hit/miss/set/delete/error statistics with hit-rate reporting
//! - Read-through interception wrapper: any read operation becomes cached
//!   without its own code changing
//!
//! The cache is purely an optimization: no failure in this crate ever
//! surfaces to a caller, and correctness is unaffected whether the backing
//! store is present, absent, or intermittently failing.
//!
//! ## Read-through caching
//!
//! ```no_run
//! use std::sync::Arc;
//! use worker_cache::{
//!     cached_call, keys, CacheCategory, CacheConfig, CacheManager, CachedClient, RedisBackend,
//! };
//!
//! struct PlatformClient {
//!     cache: CacheManager,
//! }
//!
//! impl CachedClient for PlatformClient {
//!     fn cache_manager(&self) -> Option<&worker_cache::CacheManager> {
//!         Some(&self.cache)
//!     }
//! }
//!
//! impl PlatformClient {
//!     async fn get_workflow_name(&self, workflow_id: &str) -> String {
//!         cached_call(
//!             self,
//!             CacheCategory::Workflow,
//!             &keys::workflow(workflow_id),
//!             None,
//!             || async {
//!                 // the real control-plane call lives here
//!                 format!("workflow {}", workflow_id)
//!             },
//!         )
//!         .await
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = RedisBackend::connect(CacheConfig::from_env()).await;
//!     let client = PlatformClient {
//!         cache: CacheManager::new(Arc::new(backend)),
//!     };
//!
//!     let name = client.get_workflow_name("wf-1").await;
//!     println!("{} (hit rate {:.2})", name, client.cache.stats().hit_rate);
//! }
//! ```
//!
//! ## Direct manager use
//!
//! ```
//! use std::sync::Arc;
//! use worker_cache::{CacheCategory, CacheManager, CacheValue, MemoryBackend};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let manager = CacheManager::new(Arc::new(MemoryBackend::new()));
//!
//! let value = CacheValue::String("cached response".to_string());
//! manager.set("worker_cache:custom:k", &value, CacheCategory::Custom, None).await;
//!
//! if let Some(found) = manager.get("worker_cache:custom:k", CacheCategory::Custom).await {
//!     assert_eq!(found, value);
//! }
//! # }
//! ```

pub mod backend;
pub mod category;
pub mod codec;
pub mod config;
pub mod entry;
pub mod error;
pub mod intercept;
pub mod keys;
pub mod manager;
pub mod types;

// Re-export main types for convenience
pub use backend::{CacheBackend, MemoryBackend, RedisBackend};
pub use category::{CacheCategory, TtlPolicy, DEFAULT_TTL_SECS};
pub use codec::{encode, try_decode, try_encode, CacheValue};
pub use config::CacheConfig;
pub use entry::CacheEntry;
pub use error::{CacheError, Result};
pub use intercept::{cached_call, CacheRecord, CachedClient};
pub use manager::{CacheManager, CacheStats};
pub use types::{
    ApiDeployment, ApiResponse, PipelineInfo, ToolInstance, TypedRecord, WorkflowDefinition,
    WorkflowEndpoint,
};
