//! The envelope written to the store for every cached value
//!
//! Entries carry the encoded value, a write timestamp, and the TTL they were
//! stored with. Entries written by older versions may lack `cached_at`; they
//! are still readable and are treated as valid with a synthesized timestamp.

use crate::codec::{self, CacheValue};
use crate::error::{CacheError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Stored cache entry: `{ data, cached_at, ttl }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The encoded value
    pub data: serde_json::Value,

    /// When the entry was written; absent in entries from older writers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,

    /// TTL in seconds the entry was stored with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

impl CacheEntry {
    /// Wrap an encoded value with the current timestamp
    pub fn new(data: serde_json::Value, ttl_secs: u64) -> Self {
        Self {
            data,
            cached_at: Some(Utc::now()),
            ttl: Some(ttl_secs),
        }
    }

    /// Build an entry from a value, failing if the value cannot be encoded
    pub fn from_value(value: &CacheValue, ttl_secs: u64) -> Result<Self> {
        Ok(Self::new(codec::try_encode(value)?, ttl_secs))
    }

    /// Write timestamp, synthesized for entries that predate the field
    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at.unwrap_or_else(Utc::now)
    }

    /// Age of the entry
    pub fn age(&self) -> Duration {
        (Utc::now() - self.cached_at())
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }

    /// Serialize to the stored payload string
    pub fn to_payload(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CacheError::EncodeError(e.to_string()))
    }

    /// Parse a stored payload string
    pub fn from_payload(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| CacheError::DecodeError(e.to_string()))
    }
}
