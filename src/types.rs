//! Registered domain record types and the type registry
//!
//! These are the structured control-plane responses workers cache. Each
//! record carries a stable string tag so it can round-trip through the JSON
//! wire format inside a typed envelope. The registry is an explicit
//! tag-to-constructor dispatch; an unknown tag is not an error, the codec
//! keeps the raw mapping instead.

use crate::error::{CacheError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workflow definition as returned by the control-plane API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    pub workflow_name: String,
    pub organization_id: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A source or destination endpoint attached to a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEndpoint {
    pub id: String,
    pub workflow_id: String,
    pub endpoint_type: String,
    pub connection_type: String,
    #[serde(default)]
    pub configuration: serde_json::Value,
}

/// A tool instance within a workflow's tool chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInstance {
    pub id: String,
    pub tool_id: String,
    pub workflow_id: String,
    pub step: u32,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Pipeline record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub id: String,
    pub pipeline_name: String,
    pub pipeline_type: String,
    pub active: bool,
    #[serde(default)]
    pub last_run_status: Option<String>,
    #[serde(default)]
    pub last_run_time: Option<DateTime<Utc>>,
}

/// API deployment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiDeployment {
    pub id: String,
    pub organization_id: String,
    pub api_name: String,
    pub display_name: String,
    pub is_active: bool,
}

/// Generic response envelope with an explicit success flag
///
/// Operations without a dedicated record type return this; its `success`
/// field drives the wrapper's cacheability decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
}

/// One registered record plus its type identity
#[derive(Debug, Clone, PartialEq)]
pub enum TypedRecord {
    Workflow(WorkflowDefinition),
    WorkflowEndpoint(WorkflowEndpoint),
    ToolInstance(ToolInstance),
    Pipeline(PipelineInfo),
    ApiDeployment(ApiDeployment),
    ApiResponse(ApiResponse),
}

impl TypedRecord {
    /// Tags of every registered type
    pub const REGISTERED_TAGS: [&'static str; 6] = [
        "WorkflowDefinition",
        "WorkflowEndpoint",
        "ToolInstance",
        "PipelineInfo",
        "ApiDeployment",
        "ApiResponse",
    ];

    /// Stable tag written into the typed envelope
    pub fn tag(&self) -> &'static str {
        match self {
            TypedRecord::Workflow(_) => "WorkflowDefinition",
            TypedRecord::WorkflowEndpoint(_) => "WorkflowEndpoint",
            TypedRecord::ToolInstance(_) => "ToolInstance",
            TypedRecord::Pipeline(_) => "PipelineInfo",
            TypedRecord::ApiDeployment(_) => "ApiDeployment",
            TypedRecord::ApiResponse(_) => "ApiResponse",
        }
    }

    /// Whether a tag names a registered type
    pub fn is_registered(tag: &str) -> bool {
        Self::REGISTERED_TAGS.contains(&tag)
    }

    /// Serialize the inner record's fields
    pub fn to_fields(&self) -> Result<serde_json::Value> {
        let result = match self {
            TypedRecord::Workflow(r) => serde_json::to_value(r),
            TypedRecord::WorkflowEndpoint(r) => serde_json::to_value(r),
            TypedRecord::ToolInstance(r) => serde_json::to_value(r),
            TypedRecord::Pipeline(r) => serde_json::to_value(r),
            TypedRecord::ApiDeployment(r) => serde_json::to_value(r),
            TypedRecord::ApiResponse(r) => serde_json::to_value(r),
        };
        result.map_err(|e| CacheError::EncodeError(e.to_string()))
    }

    /// Registry dispatch: rebuild a record from its tag and field mapping
    ///
    /// `Ok(None)` means the tag is not registered; the caller keeps the raw
    /// mapping. A registered tag whose constructor rejects the fields is a
    /// decode error and is treated as corruption upstream.
    pub fn decode(tag: &str, fields: serde_json::Value) -> Result<Option<TypedRecord>> {
        let record = match tag {
            "WorkflowDefinition" => TypedRecord::Workflow(from_fields(fields)?),
            "WorkflowEndpoint" => TypedRecord::WorkflowEndpoint(from_fields(fields)?),
            "ToolInstance" => TypedRecord::ToolInstance(from_fields(fields)?),
            "PipelineInfo" => TypedRecord::Pipeline(from_fields(fields)?),
            "ApiDeployment" => TypedRecord::ApiDeployment(from_fields(fields)?),
            "ApiResponse" => TypedRecord::ApiResponse(from_fields(fields)?),
            _ => return Ok(None),
        };
        Ok(Some(record))
    }
}

fn from_fields<T: serde::de::DeserializeOwned>(fields: serde_json::Value) -> Result<T> {
    serde_json::from_value(fields).map_err(|e| CacheError::DecodeError(e.to_string()))
}

macro_rules! impl_typed_record_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for TypedRecord {
            fn from(record: $ty) -> Self {
                TypedRecord::$variant(record)
            }
        }
    };
}

impl_typed_record_from!(WorkflowDefinition, Workflow);
impl_typed_record_from!(WorkflowEndpoint, WorkflowEndpoint);
impl_typed_record_from!(ToolInstance, ToolInstance);
impl_typed_record_from!(PipelineInfo, Pipeline);
impl_typed_record_from!(ApiDeployment, ApiDeployment);
impl_typed_record_from!(ApiResponse, ApiResponse);

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_workflow() -> WorkflowDefinition {
        WorkflowDefinition {
            id: "wf-1".to_string(),
            workflow_name: "invoice-extraction".to_string(),
            organization_id: "org-7".to_string(),
            is_active: true,
            created_at: Utc.with_ymd_and_hms(2024, 5, 14, 9, 30, 0).unwrap(),
            description: Some("Extract invoice fields".to_string()),
        }
    }

    #[test]
    fn test_tags_match_registry() {
        let record = TypedRecord::from(sample_workflow());
        assert_eq!(record.tag(), "WorkflowDefinition");
        assert!(TypedRecord::is_registered(record.tag()));
        assert!(!TypedRecord::is_registered("LegacyResponse"));
    }

    #[test]
    fn test_decode_registered_tag() {
        let record = TypedRecord::from(sample_workflow());
        let fields = record.to_fields().unwrap();

        let decoded = TypedRecord::decode("WorkflowDefinition", fields)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_decode_unknown_tag_is_none() {
        let decoded = TypedRecord::decode("LegacyResponse", serde_json::json!({})).unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn test_decode_bad_fields_is_error() {
        let result = TypedRecord::decode("WorkflowDefinition", serde_json::json!({"id": 42}));
        assert!(result.is_err());
    }

    #[test]
    fn test_api_response_success_flag() {
        let response = ApiResponse {
            success: false,
            data: serde_json::Value::Null,
            error: Some("not found".to_string()),
        };
        let fields = TypedRecord::from(response.clone()).to_fields().unwrap();
        let decoded = TypedRecord::decode("ApiResponse", fields).unwrap().unwrap();
        assert_eq!(decoded, TypedRecord::ApiResponse(response));
    }
}
