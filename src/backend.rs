//! Cache backend interface and implementations
//!
//! The backend owns the connection to the backing store and its availability
//! state. Availability is captured at construction: a disabled configuration
//! or a failed connect/ping leaves the backend in a permanent off state where
//! every operation is a safe no-op. No backend operation ever returns an
//! error; failures degrade to the absent/false/empty case.

use crate::codec::CacheValue;
use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Narrow interface to the backing key-value store
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Whether the store was reachable at construction
    fn available(&self) -> bool;

    /// Raw stored payload for a key; `None` if absent, unavailable, or failed
    async fn get(&self, key: &str) -> Option<String>;

    /// Wrap an encoded value in an entry envelope and SETEX it
    async fn set(&self, key: &str, value: serde_json::Value, ttl_secs: u64) -> bool;

    /// Delete a single key
    async fn delete(&self, key: &str) -> bool;

    /// Delete every key matching a glob pattern, via incremental scanning
    async fn delete_pattern(&self, pattern: &str) -> usize;

    /// Full keyspace lookup; discouraged, logs a warning on every call
    async fn keys(&self, pattern: &str) -> Vec<String>;

    /// Cursor-based incremental scan; the safe way to enumerate keys
    async fn scan_keys(&self, pattern: &str, page_hint: usize) -> Vec<String>;

    /// Batched lookup; only keys that exist appear in the result
    async fn mget(&self, keys: &[String]) -> HashMap<String, CacheEntry>;

    /// Pipelined batched write; returns the count of keys prepared.
    /// A per-item encode failure is logged and skipped, the rest commits.
    async fn mset(&self, items: &[(String, CacheValue, u64)]) -> usize;
}

// ---------------------------------------------------------------------------
// Redis backend
// ---------------------------------------------------------------------------

/// Production backend against a shared Redis store
pub struct RedisBackend {
    conn: Option<MultiplexedConnection>,
    operation_timeout: Duration,
}

impl RedisBackend {
    /// Connect to the store described by the configuration
    ///
    /// Never fails: a disabled configuration, an unreachable host, a connect
    /// timeout, or a failed PING all yield a backend with
    /// `available() == false`.
    pub async fn connect(config: CacheConfig) -> Self {
        let operation_timeout = config.operation_timeout;

        if !config.enabled {
            info!("cache disabled by configuration, backend is off");
            return Self {
                conn: None,
                operation_timeout,
            };
        }

        if let Err(e) = config.validate() {
            warn!("invalid cache configuration ({}), backend is off", e);
            return Self {
                conn: None,
                operation_timeout,
            };
        }

        let conn = Self::open(&config).await;
        match &conn {
            Some(_) => info!(
                "connected to cache store at {}:{}/{}",
                config.host, config.port, config.db
            ),
            None => warn!(
                "cache store at {}:{} unreachable, backend is off",
                config.host, config.port
            ),
        }

        Self {
            conn,
            operation_timeout,
        }
    }

    async fn open(config: &CacheConfig) -> Option<MultiplexedConnection> {
        let client = match Client::open(config.redis_url()) {
            Ok(client) => client,
            Err(e) => {
                warn!("failed to build store client: {}", e);
                return None;
            }
        };

        let connect = client.get_multiplexed_async_connection();
        let mut conn = match tokio::time::timeout(config.connect_timeout, connect).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                warn!("store connection failed: {}", e);
                return None;
            }
            Err(_) => {
                warn!(
                    "store connection timed out after {:?}",
                    config.connect_timeout
                );
                return None;
            }
        };

        let ping = redis::cmd("PING");
        match tokio::time::timeout(
            config.connect_timeout,
            ping.query_async::<String>(&mut conn),
        )
        .await
        {
            Ok(Ok(_)) => Some(conn),
            Ok(Err(e)) => {
                warn!("store ping failed: {}", e);
                None
            }
            Err(_) => {
                warn!("store ping timed out");
                None
            }
        }
    }

    /// Run a store command under the per-call timeout
    ///
    /// A timeout or transport error degrades this single call; the connection
    /// itself stays in service for subsequent calls.
    async fn run<T, F>(&self, op_name: &str, fut: F) -> Option<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!("store {} failed: {}", op_name, e);
                None
            }
            Err(_) => {
                warn!(
                    "store {} timed out after {:?}",
                    op_name, self.operation_timeout
                );
                None
            }
        }
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn available(&self) -> bool {
        self.conn.is_some()
    }

    async fn get(&self, key: &str) -> Option<String> {
        let conn = self.conn.as_ref()?;
        let mut conn = conn.clone();
        self.run("GET", conn.get::<_, Option<String>>(key)).await?
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl_secs: u64) -> bool {
        let Some(conn) = self.conn.as_ref() else {
            return false;
        };

        let entry = CacheEntry::new(value, ttl_secs);
        let payload = match entry.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("failed to serialize entry for {}: {}", key, e);
                return false;
            }
        };

        let mut conn = conn.clone();
        self.run("SETEX", conn.set_ex::<_, _, ()>(key, payload, ttl_secs))
            .await
            .is_some()
    }

    async fn delete(&self, key: &str) -> bool {
        let Some(conn) = self.conn.as_ref() else {
            return false;
        };

        let mut conn = conn.clone();
        self.run("DEL", conn.del::<_, i64>(key))
            .await
            .map(|removed| removed > 0)
            .unwrap_or(false)
    }

    async fn delete_pattern(&self, pattern: &str) -> usize {
        let Some(conn) = self.conn.as_ref() else {
            return 0;
        };

        let keys = self.scan_keys(pattern, SCAN_PAGE_HINT).await;
        if keys.is_empty() {
            return 0;
        }

        let mut conn = conn.clone();
        self.run("DEL", conn.del::<_, i64>(keys))
            .await
            .map(|removed: i64| removed as usize)
            .unwrap_or(0)
    }

    async fn keys(&self, pattern: &str) -> Vec<String> {
        let Some(conn) = self.conn.as_ref() else {
            return Vec::new();
        };

        warn!(
            "KEYS {} issued against the shared store; prefer scan_keys, \
             a full keyspace scan can stall production",
            pattern
        );

        let mut conn = conn.clone();
        self.run("KEYS", conn.keys::<_, Vec<String>>(pattern))
            .await
            .unwrap_or_default()
    }

    async fn scan_keys(&self, pattern: &str, page_hint: usize) -> Vec<String> {
        let Some(conn) = self.conn.as_ref() else {
            return Vec::new();
        };

        let mut conn = conn.clone();
        let mut found = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let page = self
                .run(
                    "SCAN",
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(pattern)
                        .arg("COUNT")
                        .arg(page_hint)
                        .query_async::<(u64, Vec<String>)>(&mut conn),
                )
                .await;

            let Some((next, keys)) = page else {
                // Degrade with what we have so far
                return found;
            };

            found.extend(keys);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        found
    }

    async fn mget(&self, keys: &[String]) -> HashMap<String, CacheEntry> {
        let Some(conn) = self.conn.as_ref() else {
            return HashMap::new();
        };
        if keys.is_empty() {
            return HashMap::new();
        }

        let mut conn = conn.clone();
        let mut cmd = redis::cmd("MGET");
        for key in keys {
            cmd.arg(key);
        }

        let Some(payloads) = self
            .run("MGET", cmd.query_async::<Vec<Option<String>>>(&mut conn))
            .await
        else {
            return HashMap::new();
        };

        collect_entries(keys, payloads)
    }

    async fn mset(&self, items: &[(String, CacheValue, u64)]) -> usize {
        let Some(conn) = self.conn.as_ref() else {
            return 0;
        };

        let mut pipe = redis::pipe();
        let mut prepared = 0;

        for (key, value, ttl_secs) in items {
            match CacheEntry::from_value(value, *ttl_secs) {
                Ok(entry) => match entry.to_payload() {
                    Ok(payload) => {
                        pipe.cmd("SETEX").arg(key).arg(*ttl_secs).arg(payload).ignore();
                        prepared += 1;
                    }
                    Err(e) => warn!("skipping {} in batch write: {}", key, e),
                },
                Err(e) => warn!("skipping {} in batch write: {}", key, e),
            }
        }

        if prepared == 0 {
            return 0;
        }

        let mut conn = conn.clone();
        match self.run("pipelined SETEX", pipe.query_async::<()>(&mut conn)).await {
            Some(()) => prepared,
            None => 0,
        }
    }
}

/// Default page hint for internal scans
const SCAN_PAGE_HINT: usize = 100;

fn collect_entries(
    keys: &[String],
    payloads: Vec<Option<String>>,
) -> HashMap<String, CacheEntry> {
    let mut entries = HashMap::new();
    for (key, payload) in keys.iter().zip(payloads) {
        let Some(payload) = payload else { continue };
        match CacheEntry::from_payload(&payload) {
            Ok(entry) => {
                entries.insert(key.clone(), entry);
            }
            Err(e) => warn!("skipping unparsable entry for {}: {}", key, e),
        }
    }
    entries
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

struct StoredValue {
    payload: String,
    expires_at: Instant,
}

/// In-process backend with real TTL semantics
///
/// Used by tests and by single-process deployments that want read-through
/// caching without a shared store.
pub struct MemoryBackend {
    store: RwLock<HashMap<String, StoredValue>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
        }
    }

    /// Store a raw payload directly, bypassing entry wrapping.
    /// Exists so tests can plant corrupt or legacy payloads.
    pub async fn put_raw(&self, key: &str, payload: &str, ttl_secs: u64) {
        let mut store = self.store.write().await;
        store.insert(
            key.to_string(),
            StoredValue {
                payload: payload.to_string(),
                expires_at: Instant::now() + Duration::from_secs(ttl_secs),
            },
        );
    }

    /// Number of live keys
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let store = self.store.read().await;
        store.values().filter(|v| v.expires_at > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn available(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> Option<String> {
        let mut store = self.store.write().await;
        match store.get(key) {
            Some(stored) if stored.expires_at > Instant::now() => Some(stored.payload.clone()),
            Some(_) => {
                debug!("entry expired: {}", key);
                store.remove(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl_secs: u64) -> bool {
        let entry = CacheEntry::new(value, ttl_secs);
        let payload = match entry.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("failed to serialize entry for {}: {}", key, e);
                return false;
            }
        };

        self.put_raw(key, &payload, ttl_secs).await;
        true
    }

    async fn delete(&self, key: &str) -> bool {
        let mut store = self.store.write().await;
        store.remove(key).is_some()
    }

    async fn delete_pattern(&self, pattern: &str) -> usize {
        let keys = self.scan_keys(pattern, SCAN_PAGE_HINT).await;
        let mut store = self.store.write().await;
        keys.iter().filter(|key| store.remove(*key).is_some()).count()
    }

    async fn keys(&self, pattern: &str) -> Vec<String> {
        warn!("KEYS {} issued; prefer scan_keys", pattern);
        self.scan_keys(pattern, SCAN_PAGE_HINT).await
    }

    async fn scan_keys(&self, pattern: &str, _page_hint: usize) -> Vec<String> {
        let now = Instant::now();
        let store = self.store.read().await;
        store
            .iter()
            .filter(|(key, stored)| stored.expires_at > now && glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect()
    }

    async fn mget(&self, keys: &[String]) -> HashMap<String, CacheEntry> {
        let mut payloads = Vec::with_capacity(keys.len());
        for key in keys {
            payloads.push(self.get(key).await);
        }
        collect_entries(keys, payloads)
    }

    async fn mset(&self, items: &[(String, CacheValue, u64)]) -> usize {
        let mut prepared = 0;
        for (key, value, ttl_secs) in items {
            match CacheEntry::from_value(value, *ttl_secs) {
                Ok(entry) => match entry.to_payload() {
                    Ok(payload) => {
                        self.put_raw(key, &payload, *ttl_secs).await;
                        prepared += 1;
                    }
                    Err(e) => warn!("skipping {} in batch write: {}", key, e),
                },
                Err(e) => warn!("skipping {} in batch write: {}", key, e),
            }
        }
        prepared
    }
}

/// Glob match supporting `*`, the only wildcard the key patterns use
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0usize, 0usize);
    let (mut star, mut mark) = (None::<usize>, 0usize);

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            mark = t;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            mark += 1;
            t = mark;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("worker_cache:pipeline:*", "worker_cache:pipeline:pl-1"));
        assert!(!glob_match("worker_cache:pipeline:*", "worker_cache:workflow:wf-1"));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("a*c", "abc"));
        assert!(glob_match("a*c", "ac"));
        assert!(!glob_match("a*c", "abd"));
        assert!(glob_match("*:suffix", "prefix:suffix"));
    }

    #[tokio::test]
    async fn test_memory_backend_set_get() {
        let backend = MemoryBackend::new();

        assert!(backend.set("k1", json!("v1"), 60).await);
        let payload = backend.get("k1").await.unwrap();
        let entry = CacheEntry::from_payload(&payload).unwrap();
        assert_eq!(entry.data, json!("v1"));

        assert!(backend.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_memory_backend_delete() {
        let backend = MemoryBackend::new();
        backend.set("k1", json!(1), 60).await;

        assert!(backend.delete("k1").await);
        assert!(!backend.delete("k1").await);
        assert!(backend.get("k1").await.is_none());
    }

    #[tokio::test]
    async fn test_memory_backend_expiry() {
        let backend = MemoryBackend::new();
        backend.put_raw("k1", "payload", 0).await;

        // ttl of zero expires immediately
        assert!(backend.get("k1").await.is_none());
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_backend_pattern_delete() {
        let backend = MemoryBackend::new();
        backend.set("worker_cache:workflow:a", json!(1), 60).await;
        backend.set("worker_cache:workflow:b", json!(2), 60).await;
        backend.set("worker_cache:pipeline:c", json!(3), 60).await;

        let removed = backend.delete_pattern("worker_cache:workflow:*").await;
        assert_eq!(removed, 2);
        assert_eq!(backend.len().await, 1);
        assert!(backend.get("worker_cache:pipeline:c").await.is_some());
    }

    #[tokio::test]
    async fn test_memory_backend_mget_skips_unparsable() {
        let backend = MemoryBackend::new();
        backend.set("good", json!("fine"), 60).await;
        backend.put_raw("bad", "{{{corrupt", 60).await;

        let keys = vec!["good".to_string(), "bad".to_string(), "absent".to_string()];
        let entries = backend.mget(&keys).await;

        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("good"));
    }

    #[tokio::test]
    async fn test_memory_backend_mset_partial() {
        let backend = MemoryBackend::new();
        let items = vec![
            ("a".to_string(), CacheValue::Int(1), 60),
            ("b".to_string(), CacheValue::Float(f64::NAN), 60),
            ("c".to_string(), CacheValue::Int(3), 60),
        ];

        let prepared = backend.mset(&items).await;
        assert_eq!(prepared, 2);
        assert!(backend.get("a").await.is_some());
        assert!(backend.get("b").await.is_none());
        assert!(backend.get("c").await.is_some());
    }

    #[tokio::test]
    async fn test_redis_backend_disabled_is_off() {
        let backend = RedisBackend::connect(CacheConfig::disabled()).await;

        assert!(!backend.available());
        assert!(backend.get("k").await.is_none());
        assert!(!backend.set("k", json!(1), 60).await);
        assert!(!backend.delete("k").await);
        assert_eq!(backend.delete_pattern("*").await, 0);
        assert!(backend.keys("*").await.is_empty());
        assert!(backend.scan_keys("*", 50).await.is_empty());
        assert!(backend.mget(&["k".to_string()]).await.is_empty());
        assert_eq!(
            backend.mset(&[("k".to_string(), CacheValue::Int(1), 60)]).await,
            0
        );
    }
}
