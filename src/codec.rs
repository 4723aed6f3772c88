//! Serialization codec for cached values
//!
//! Converts `CacheValue`s into a JSON-safe representation and back. Typed
//! records are wrapped in a tagged envelope (`__type__` / `__data__`) so they
//! can be reconstructed through the type registry; containers recurse
//! unchanged in shape; timestamps reduce to ISO-8601 strings. An envelope
//! whose tag is not registered decodes back to its raw mapping untouched.

use crate::error::{CacheError, Result};
use crate::types::TypedRecord;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Number, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Envelope field carrying the registry tag
pub const TYPE_FIELD: &str = "__type__";

/// Envelope field carrying the encoded record fields
pub const DATA_FIELD: &str = "__data__";

/// The universe of values the cache can hold
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Encodes to an ISO-8601 string; decodes back as `String` (lossy by design)
    Timestamp(DateTime<Utc>),
    Array(Vec<CacheValue>),
    Map(BTreeMap<String, CacheValue>),
    Typed(TypedRecord),
}

impl CacheValue {
    /// The inner record, if this is a typed value
    pub fn as_typed(&self) -> Option<&TypedRecord> {
        match self {
            CacheValue::Typed(record) => Some(record),
            _ => None,
        }
    }

    /// Consume into the inner record, if this is a typed value
    pub fn into_typed(self) -> Option<TypedRecord> {
        match self {
            CacheValue::Typed(record) => Some(record),
            _ => None,
        }
    }

    /// Short description used in the sentinel payload and logs
    fn describe(&self) -> String {
        match self {
            CacheValue::Null => "null".to_string(),
            CacheValue::Bool(_) => "bool".to_string(),
            CacheValue::Int(_) => "int".to_string(),
            CacheValue::Float(_) => "float".to_string(),
            CacheValue::String(_) => "string".to_string(),
            CacheValue::Timestamp(_) => "timestamp".to_string(),
            CacheValue::Array(_) => "array".to_string(),
            CacheValue::Map(_) => "map".to_string(),
            CacheValue::Typed(record) => record.tag().to_string(),
        }
    }
}

impl From<bool> for CacheValue {
    fn from(v: bool) -> Self {
        CacheValue::Bool(v)
    }
}

impl From<i64> for CacheValue {
    fn from(v: i64) -> Self {
        CacheValue::Int(v)
    }
}

impl From<f64> for CacheValue {
    fn from(v: f64) -> Self {
        CacheValue::Float(v)
    }
}

impl From<&str> for CacheValue {
    fn from(v: &str) -> Self {
        CacheValue::String(v.to_string())
    }
}

impl From<String> for CacheValue {
    fn from(v: String) -> Self {
        CacheValue::String(v)
    }
}

impl From<DateTime<Utc>> for CacheValue {
    fn from(v: DateTime<Utc>) -> Self {
        CacheValue::Timestamp(v)
    }
}

impl From<Vec<CacheValue>> for CacheValue {
    fn from(v: Vec<CacheValue>) -> Self {
        CacheValue::Array(v)
    }
}

macro_rules! impl_cache_value_from_record {
    ($($ty:ty),+ $(,)?) => {
        $(impl From<$ty> for CacheValue {
            fn from(record: $ty) -> Self {
                CacheValue::Typed(record.into())
            }
        })+
    };
}

impl_cache_value_from_record!(
    crate::types::WorkflowDefinition,
    crate::types::WorkflowEndpoint,
    crate::types::ToolInstance,
    crate::types::PipelineInfo,
    crate::types::ApiDeployment,
    crate::types::ApiResponse,
);

impl From<TypedRecord> for CacheValue {
    fn from(record: TypedRecord) -> Self {
        CacheValue::Typed(record)
    }
}

/// Encode a value, failing on anything that cannot be represented
pub fn try_encode(value: &CacheValue) -> Result<Value> {
    match value {
        CacheValue::Null => Ok(Value::Null),
        CacheValue::Bool(b) => Ok(Value::Bool(*b)),
        CacheValue::Int(i) => Ok(Value::Number((*i).into())),
        CacheValue::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| CacheError::EncodeError(format!("non-finite float: {}", f))),
        CacheValue::String(s) => Ok(Value::String(s.clone())),
        CacheValue::Timestamp(ts) => Ok(Value::String(ts.to_rfc3339())),
        CacheValue::Array(items) => {
            let mut encoded = Vec::with_capacity(items.len());
            for item in items {
                encoded.push(try_encode(item)?);
            }
            Ok(Value::Array(encoded))
        }
        CacheValue::Map(entries) => {
            let mut encoded = Map::with_capacity(entries.len());
            for (key, item) in entries {
                encoded.insert(key.clone(), try_encode(item)?);
            }
            Ok(Value::Object(encoded))
        }
        CacheValue::Typed(record) => Ok(json!({
            TYPE_FIELD: record.tag(),
            DATA_FIELD: record.to_fields()?,
        })),
    }
}

/// Encode a value; never fails
///
/// An encoding failure yields a sentinel payload instead of an error so the
/// caller's write path cannot crash because of a cache concern.
pub fn encode(value: &CacheValue) -> Value {
    match try_encode(value) {
        Ok(encoded) => encoded,
        Err(e) => {
            debug!("encode failed for {} value: {}", value.describe(), e);
            json!({
                "error": "serialization_failed",
                "type": value.describe(),
            })
        }
    }
}

/// Decode a stored representation back into a value
///
/// Fails only when a registered envelope's constructor rejects its fields;
/// the manager treats that as corruption. Unknown tags degrade silently to
/// the raw mapping.
pub fn try_decode(raw: Value) -> Result<CacheValue> {
    match raw {
        Value::Null => Ok(CacheValue::Null),
        Value::Bool(b) => Ok(CacheValue::Bool(b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(CacheValue::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(CacheValue::Float(f))
            } else {
                Err(CacheError::DecodeError(format!("unrepresentable number: {}", n)))
            }
        }
        Value::String(s) => Ok(CacheValue::String(s)),
        Value::Array(items) => {
            let mut decoded = Vec::with_capacity(items.len());
            for item in items {
                decoded.push(try_decode(item)?);
            }
            Ok(CacheValue::Array(decoded))
        }
        Value::Object(map) => decode_object(map),
    }
}

fn decode_object(map: Map<String, Value>) -> Result<CacheValue> {
    let tag = map.get(TYPE_FIELD).and_then(Value::as_str);

    if let Some(tag) = tag {
        if map.contains_key(DATA_FIELD) {
            if TypedRecord::is_registered(tag) {
                let fields = map.get(DATA_FIELD).cloned().unwrap_or(Value::Null);
                if let Some(record) = TypedRecord::decode(tag, fields)? {
                    return Ok(CacheValue::Typed(record));
                }
            }
            // Unknown type: keep the envelope as a plain mapping, markers included
            debug!("unknown cached type tag '{}', returning raw mapping", tag);
        }
    }

    let mut decoded = BTreeMap::new();
    for (key, item) in map {
        decoded.insert(key, try_decode(item)?);
    }
    Ok(CacheValue::Map(decoded))
}
