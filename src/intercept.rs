//! Read-through caching for arbitrary read operations
//!
//! `cached_call` makes any read operation read-through-cached without the
//! operation's own code changing: derive a key, consult the manager, invoke
//! the operation only on a miss, and store the result when it looks
//! successful. A client with no usable manager gets a plain pass-through
//! call. Nothing the caching machinery does can surface as a caller-visible
//! failure.
//!
//! There is no request coalescing: concurrent callers racing on the same
//! just-missed key each invoke the underlying operation and each write the
//! result; last write wins. This is a documented limitation of the design,
//! not a defect.

use crate::category::CacheCategory;
use crate::codec::CacheValue;
use crate::keys;
use crate::manager::{CacheManager, CacheStats};
use crate::types::{
    ApiDeployment, ApiResponse, PipelineInfo, ToolInstance, TypedRecord, WorkflowDefinition,
    WorkflowEndpoint,
};
use async_trait::async_trait;
use std::future::Future;
use tracing::debug;

/// Capability required of values that travel through the wrapper
///
/// `is_cache_success` drives whether a freshly computed result is worth
/// storing. The default is permissive: a type without an explicit success
/// indicator is assumed successful, matching long-standing behavior.
pub trait CacheRecord: Sized {
    /// Convert into the cache value universe
    fn to_cache_value(&self) -> CacheValue;

    /// Rebuild from a cached value; `None` means the cached shape no longer
    /// matches and the lookup degrades to a miss
    fn from_cache_value(value: CacheValue) -> Option<Self>;

    /// Whether this result should be cached
    fn is_cache_success(&self) -> bool {
        true
    }
}

impl CacheRecord for CacheValue {
    fn to_cache_value(&self) -> CacheValue {
        self.clone()
    }

    fn from_cache_value(value: CacheValue) -> Option<Self> {
        Some(value)
    }
}

impl CacheRecord for String {
    fn to_cache_value(&self) -> CacheValue {
        CacheValue::String(self.clone())
    }

    fn from_cache_value(value: CacheValue) -> Option<Self> {
        match value {
            CacheValue::String(s) => Some(s),
            _ => None,
        }
    }
}

macro_rules! impl_cache_record {
    ($ty:ty, $variant:ident) => {
        impl CacheRecord for $ty {
            fn to_cache_value(&self) -> CacheValue {
                CacheValue::Typed(TypedRecord::$variant(self.clone()))
            }

            fn from_cache_value(value: CacheValue) -> Option<Self> {
                match value {
                    CacheValue::Typed(TypedRecord::$variant(record)) => Some(record),
                    _ => None,
                }
            }
        }
    };
}

impl_cache_record!(WorkflowDefinition, Workflow);
impl_cache_record!(WorkflowEndpoint, WorkflowEndpoint);
impl_cache_record!(ToolInstance, ToolInstance);
impl_cache_record!(PipelineInfo, Pipeline);
impl_cache_record!(ApiDeployment, ApiDeployment);

impl CacheRecord for ApiResponse {
    fn to_cache_value(&self) -> CacheValue {
        CacheValue::Typed(TypedRecord::ApiResponse(self.clone()))
    }

    fn from_cache_value(value: CacheValue) -> Option<Self> {
        match value {
            CacheValue::Typed(TypedRecord::ApiResponse(record)) => Some(record),
            _ => None,
        }
    }

    fn is_cache_success(&self) -> bool {
        self.success
    }
}

/// Integration surface for clients that compose a cache manager
///
/// Implementing `cache_manager` is the only required wiring; statistics and
/// invalidation operations come for free.
#[async_trait]
pub trait CachedClient: Send + Sync {
    /// The composed manager, if any
    fn cache_manager(&self) -> Option<&CacheManager>;

    /// Counter snapshot, or `None` when no manager is composed
    fn get_cache_stats(&self) -> Option<CacheStats> {
        self.cache_manager().map(|manager| manager.stats())
    }

    /// Reset the counters
    fn clear_cache_stats(&self) {
        if let Some(manager) = self.cache_manager() {
            manager.clear_stats();
        }
    }

    /// Drop the cached workflow definition, tool instances, and endpoints
    async fn invalidate_workflow_cache(&self, workflow_id: &str) -> usize {
        match self.cache_manager() {
            Some(manager) => manager.invalidate_workflow(workflow_id).await,
            None => 0,
        }
    }

    /// Drop the cached value for a category and identifier
    async fn invalidate_cache_for_key(&self, category: CacheCategory, id: &str) -> bool {
        match self.cache_manager() {
            Some(manager) => manager.delete(&keys::for_category(category, id)).await,
            None => false,
        }
    }
}

/// Run a read operation through the cache
///
/// 1. No usable manager (not composed, or its backend is off): the operation
///    runs directly, exactly once, with no caching side effects.
/// 2. Hit: the cached value is returned and the operation is not invoked. A
///    cached value the result type no longer recognizes degrades to a miss.
/// 3. Miss: the operation runs; its result is stored when it reports success.
pub async fn cached_call<C, F, Fut, T>(
    client: &C,
    category: CacheCategory,
    key: &str,
    ttl_override: Option<u64>,
    op: F,
) -> T
where
    C: CachedClient + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
    T: CacheRecord,
{
    let manager = match client.cache_manager() {
        Some(manager) if manager.backend_available() => manager,
        _ => {
            debug!("cache unavailable, calling through: {}", key);
            return op().await;
        }
    };

    if let Some(cached) = manager.get(key, category).await {
        match T::from_cache_value(cached) {
            Some(result) => return result,
            None => debug!("cached value at {} has an unexpected shape, refreshing", key),
        }
    }

    let result = op().await;

    if result.is_cache_success() {
        manager
            .set(key, &result.to_cache_value(), category, ttl_override)
            .await;
    } else {
        debug!("result for {} not successful, skipping cache write", key);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, RedisBackend};
    use crate::config::CacheConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct TestClient {
        manager: Option<CacheManager>,
        calls: AtomicU32,
    }

    impl TestClient {
        fn with_memory_backend() -> Self {
            Self {
                manager: Some(CacheManager::new(Arc::new(MemoryBackend::new()))),
                calls: AtomicU32::new(0),
            }
        }

        async fn with_offline_backend() -> Self {
            let backend = RedisBackend::connect(CacheConfig::disabled()).await;
            Self {
                manager: Some(CacheManager::new(Arc::new(backend))),
                calls: AtomicU32::new(0),
            }
        }

        fn without_manager() -> Self {
            Self {
                manager: None,
                calls: AtomicU32::new(0),
            }
        }

        async fn fetch_value(&self, id: &str) -> String {
            cached_call(
                self,
                CacheCategory::Custom,
                &keys::custom(CacheCategory::Custom, &[id]),
                None,
                || async {
                    self.calls.fetch_add(1, Ordering::SeqCst);
                    format!("value-for-{}", id)
                },
            )
            .await
        }
    }

    impl CachedClient for TestClient {
        fn cache_manager(&self) -> Option<&CacheManager> {
            self.manager.as_ref()
        }
    }

    #[tokio::test]
    async fn test_hit_skips_underlying_operation() {
        let client = TestClient::with_memory_backend();

        assert_eq!(client.fetch_value("a").await, "value-for-a");
        assert_eq!(client.fetch_value("a").await, "value-for-a");

        // Second call was served from cache
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);

        let stats = client.get_cache_stats().unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_offline_backend_calls_through_every_time() {
        let client = TestClient::with_offline_backend().await;

        assert_eq!(client.fetch_value("a").await, "value-for-a");
        assert_eq!(client.fetch_value("a").await, "value-for-a");

        assert_eq!(client.calls.load(Ordering::SeqCst), 2);

        // Pass-through calls are not cache events
        let stats = client.get_cache_stats().unwrap();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[tokio::test]
    async fn test_no_manager_calls_through() {
        let client = TestClient::without_manager();

        assert_eq!(client.fetch_value("a").await, "value-for-a");
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        assert!(client.get_cache_stats().is_none());
    }

    #[tokio::test]
    async fn test_unsuccessful_result_not_cached() {
        let client = TestClient::with_memory_backend();
        let calls = AtomicU32::new(0);

        for _ in 0..2 {
            let response: ApiResponse = cached_call(
                &client,
                CacheCategory::Custom,
                "worker_cache:custom:failing",
                None,
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    ApiResponse {
                        success: false,
                        data: serde_json::Value::Null,
                        error: Some("upstream 500".to_string()),
                    }
                },
            )
            .await;
            assert!(!response.success);
        }

        // The failed response was never stored
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_successful_response_cached() {
        let client = TestClient::with_memory_backend();
        let calls = AtomicU32::new(0);

        for _ in 0..2 {
            let response: ApiResponse = cached_call(
                &client,
                CacheCategory::Custom,
                "worker_cache:custom:ok",
                None,
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    ApiResponse {
                        success: true,
                        data: serde_json::json!({"rows": 3}),
                        error: None,
                    }
                },
            )
            .await;
            assert!(response.success);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shape_mismatch_degrades_to_miss() {
        let client = TestClient::with_memory_backend();
        let manager = client.cache_manager().unwrap();

        // Something else stored an int under the key this caller expects a
        // string for
        manager
            .set("k", &CacheValue::Int(42), CacheCategory::Custom, None)
            .await;

        let value: String = cached_call(&client, CacheCategory::Custom, "k", None, || async {
            "fresh".to_string()
        })
        .await;
        assert_eq!(value, "fresh");
    }

    #[tokio::test]
    async fn test_mixin_invalidation() {
        let client = TestClient::with_memory_backend();
        let manager = client.cache_manager().unwrap();

        let value = CacheValue::Int(1);
        manager
            .set(&keys::workflow("W"), &value, CacheCategory::Workflow, None)
            .await;
        manager
            .set(
                &keys::tool_instances("W"),
                &value,
                CacheCategory::ToolInstances,
                None,
            )
            .await;
        manager
            .set(
                &keys::workflow_endpoints("W"),
                &value,
                CacheCategory::WorkflowEndpoints,
                None,
            )
            .await;

        assert_eq!(client.invalidate_workflow_cache("W").await, 3);

        manager
            .set(&keys::pipeline("P"), &value, CacheCategory::Pipeline, None)
            .await;
        assert!(
            client
                .invalidate_cache_for_key(CacheCategory::Pipeline, "P")
                .await
        );
    }
}
