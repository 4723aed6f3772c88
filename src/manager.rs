//! Cache orchestration: codec, TTL policy, statistics, invalidation
//!
//! The manager owns the policy table and the process-local counters; the
//! backend owns the connection. Reads that hit an entry which cannot be
//! parsed or decoded delete the offending key and report a miss, so the
//! cache heals itself against incompatible or corrupted entries.

use crate::backend::CacheBackend;
use crate::category::{CacheCategory, TtlPolicy};
use crate::codec::{self, CacheValue};
use crate::entry::CacheEntry;
use crate::keys;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Snapshot of the process-local counters
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
    pub hit_rate: f64,
    pub total_requests: u64,
    pub backend_available: bool,
}

/// Live counters; best-effort under concurrent increments
#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

impl Counters {
    fn snapshot(&self, backend_available: bool) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total_requests = hits + misses;
        let hit_rate = if total_requests == 0 {
            0.0
        } else {
            hits as f64 / total_requests as f64
        };

        CacheStats {
            hits,
            misses,
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            hit_rate,
            total_requests,
            backend_available,
        }
    }

    fn clear(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.sets.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
    }
}

/// Orchestration layer over a cache backend
pub struct CacheManager {
    backend: Arc<dyn CacheBackend>,
    policy: RwLock<TtlPolicy>,
    counters: Counters,
}

impl CacheManager {
    /// Create a manager over a backend with the default TTL policy
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self::with_policy(backend, TtlPolicy::default())
    }

    /// Create a manager with a custom TTL policy table
    pub fn with_policy(backend: Arc<dyn CacheBackend>, policy: TtlPolicy) -> Self {
        Self {
            backend,
            policy: RwLock::new(policy),
            counters: Counters::default(),
        }
    }

    /// Whether the backend was reachable at construction
    pub fn backend_available(&self) -> bool {
        self.backend.available()
    }

    /// Look up a key
    ///
    /// The backend being off is not a cache event: it returns `None` without
    /// touching the counters. A present entry that fails to parse or decode
    /// is corruption: the key is deleted and the lookup reports a miss.
    pub async fn get(&self, key: &str, category: CacheCategory) -> Option<CacheValue> {
        if !self.backend.available() {
            return None;
        }

        let Some(payload) = self.backend.get(key).await else {
            debug!("cache miss [{}]: {}", category, key);
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        match decode_payload(&payload) {
            Ok(value) => {
                debug!("cache hit [{}]: {}", category, key);
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Err(e) => {
                warn!("corrupt cache entry at {}, deleting: {}", key, e);
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                self.backend.delete(key).await;
                None
            }
        }
    }

    /// Store a value under a key
    ///
    /// TTL resolution order: explicit override, the category's policy entry,
    /// the custom-category default. Encoding never fails the caller; an
    /// unencodable value is stored as a sentinel payload.
    pub async fn set(
        &self,
        key: &str,
        value: &CacheValue,
        category: CacheCategory,
        ttl_override: Option<u64>,
    ) -> bool {
        if !self.backend.available() {
            return false;
        }

        let ttl_secs = ttl_override.unwrap_or_else(|| self.ttl_for(category));
        let encoded = codec::encode(value);

        if self.backend.set(key, encoded, ttl_secs).await {
            debug!("cache set [{}]: {} (ttl {}s)", category, key, ttl_secs);
            self.counters.sets.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            self.counters.errors.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Delete a single key
    pub async fn delete(&self, key: &str) -> bool {
        if !self.backend.available() {
            return false;
        }

        let removed = self.backend.delete(key).await;
        if removed {
            self.counters.deletes.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Batched lookup; corrupt entries are skipped and counted under errors
    pub async fn get_many(&self, keys: &[String]) -> HashMap<String, CacheValue> {
        if !self.backend.available() {
            return HashMap::new();
        }

        let entries = self.backend.mget(keys).await;
        let mut values = HashMap::with_capacity(entries.len());

        for (key, entry) in entries {
            match codec::try_decode(entry.data) {
                Ok(value) => {
                    values.insert(key, value);
                }
                Err(e) => {
                    warn!("skipping corrupt entry for {}: {}", key, e);
                    self.counters.errors.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        values
    }

    /// Batched write under one category TTL; returns the prepared count
    pub async fn set_many(&self, items: &[(String, CacheValue)], category: CacheCategory) -> usize {
        if !self.backend.available() {
            return 0;
        }

        let ttl_secs = self.ttl_for(category);
        let batch: Vec<(String, CacheValue, u64)> = items
            .iter()
            .map(|(key, value)| (key.clone(), value.clone(), ttl_secs))
            .collect();

        let prepared = self.backend.mset(&batch).await;
        self.counters.sets.fetch_add(prepared as u64, Ordering::Relaxed);
        prepared
    }

    /// Remove the three keys derived from a workflow id
    ///
    /// The related key set is small and known, so no pattern scan is used.
    pub async fn invalidate_workflow(&self, workflow_id: &str) -> usize {
        let mut removed = 0;
        for key in [
            keys::workflow(workflow_id),
            keys::tool_instances(workflow_id),
            keys::workflow_endpoints(workflow_id),
        ] {
            if self.delete(&key).await {
                removed += 1;
            }
        }

        debug!("invalidated {} keys for workflow {}", removed, workflow_id);
        removed
    }

    /// Scan-based sweep of every key in a category
    pub async fn invalidate_category(&self, category: CacheCategory) -> usize {
        if !self.backend.available() {
            return 0;
        }

        let removed = self
            .backend
            .delete_pattern(&keys::category_pattern(category))
            .await;
        self.counters
            .deletes
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Current TTL for a category
    pub fn ttl_for(&self, category: CacheCategory) -> u64 {
        self.policy
            .read()
            .map(|policy| policy.ttl_for(category))
            .unwrap_or(crate::category::DEFAULT_TTL_SECS)
    }

    /// Tune a category's TTL at runtime
    pub fn set_category_ttl(&self, category: CacheCategory, ttl_secs: u64) {
        if let Ok(mut policy) = self.policy.write() {
            policy.set_ttl(category, ttl_secs);
        }
    }

    /// Snapshot the counters
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.backend.available())
    }

    /// Reset the counters
    pub fn clear_stats(&self) {
        self.counters.clear();
    }
}

fn decode_payload(payload: &str) -> crate::error::Result<CacheValue> {
    let entry = CacheEntry::from_payload(payload)?;
    codec::try_decode(entry.data)
}
