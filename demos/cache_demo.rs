//! Cache walkthrough against a local Redis
//!
//! Run with: cargo run --example cache_demo
//!
//! Without a reachable Redis the demo still completes: the backend degrades
//! to off and every call passes straight through.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use worker_cache::{
    cached_call, keys, CacheBackend, CacheCategory, CacheConfig, CacheManager, CachedClient,
    RedisBackend,
};

struct DemoClient {
    cache: CacheManager,
    upstream_calls: AtomicU32,
}

impl CachedClient for DemoClient {
    fn cache_manager(&self) -> Option<&CacheManager> {
        Some(&self.cache)
    }
}

impl DemoClient {
    async fn get_workflow_name(&self, workflow_id: &str) -> String {
        cached_call(
            self,
            CacheCategory::Workflow,
            &keys::workflow(workflow_id),
            None,
            || async {
                self.upstream_calls.fetch_add(1, Ordering::SeqCst);
                // Stands in for the real control-plane call
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                format!("workflow {}", workflow_id)
            },
        )
        .await
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,worker_cache=debug".into()),
        )
        .init();

    let config = CacheConfig::from_env();
    println!("connecting to {}", config.redis_url());

    let backend = RedisBackend::connect(config).await;
    println!("backend available: {}", backend.available());

    let client = DemoClient {
        cache: CacheManager::new(Arc::new(backend)),
        upstream_calls: AtomicU32::new(0),
    };

    for round in 1..=3 {
        let name = client.get_workflow_name("wf-demo").await;
        println!("round {}: {}", round, name);
    }

    let stats = client.cache.stats();
    println!(
        "upstream calls: {}, hits: {}, misses: {}, hit rate: {:.2}",
        client.upstream_calls.load(Ordering::SeqCst),
        stats.hits,
        stats.misses,
        stats.hit_rate
    );

    let removed = client.invalidate_workflow_cache("wf-demo").await;
    println!("invalidated {} keys", removed);
}
