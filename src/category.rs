//! Cache categories and the per-category expiration policy
//!
//! Every cached value belongs to exactly one category, and each category has
//! exactly one default TTL held in the policy table. The table is mutable at
//! runtime for tuning; anything unrecognized falls back to the custom
//! default.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Fallback TTL in seconds for categories without a policy entry
pub const DEFAULT_TTL_SECS: u64 = 300;

/// Logical domain of a cached value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCategory {
    /// Workflow definition
    Workflow,

    /// Source/destination endpoints of a workflow
    WorkflowEndpoints,

    /// Pipeline record
    Pipeline,

    /// Pipeline run data
    PipelineData,

    /// API deployment record
    ApiDeployment,

    /// Tool instances attached to a workflow
    ToolInstances,

    /// Platform configuration
    Configuration,

    /// Platform-wide settings
    PlatformSettings,

    /// File batch for an execution
    FileBatch,

    /// Workflow execution data
    ExecutionData,

    /// Ad-hoc category for the generic hashed-key path
    Custom,
}

impl CacheCategory {
    /// Every category, used to keep the policy table complete
    pub const ALL: [CacheCategory; 11] = [
        CacheCategory::Workflow,
        CacheCategory::WorkflowEndpoints,
        CacheCategory::Pipeline,
        CacheCategory::PipelineData,
        CacheCategory::ApiDeployment,
        CacheCategory::ToolInstances,
        CacheCategory::Configuration,
        CacheCategory::PlatformSettings,
        CacheCategory::FileBatch,
        CacheCategory::ExecutionData,
        CacheCategory::Custom,
    ];

    /// Wire name used in cache keys and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCategory::Workflow => "workflow",
            CacheCategory::WorkflowEndpoints => "workflow_endpoints",
            CacheCategory::Pipeline => "pipeline",
            CacheCategory::PipelineData => "pipeline_data",
            CacheCategory::ApiDeployment => "api_deployment",
            CacheCategory::ToolInstances => "tool_instances",
            CacheCategory::Configuration => "configuration",
            CacheCategory::PlatformSettings => "platform_settings",
            CacheCategory::FileBatch => "file_batch",
            CacheCategory::ExecutionData => "execution_data",
            CacheCategory::Custom => "custom",
        }
    }
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category -> default TTL table, tunable at runtime
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    table: HashMap<CacheCategory, u64>,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        let mut table = HashMap::new();
        table.insert(CacheCategory::Workflow, 1800);
        table.insert(CacheCategory::WorkflowEndpoints, 1800);
        table.insert(CacheCategory::Pipeline, 900);
        table.insert(CacheCategory::PipelineData, 600);
        table.insert(CacheCategory::ApiDeployment, 1800);
        table.insert(CacheCategory::ToolInstances, 1800);
        table.insert(CacheCategory::Configuration, 3600);
        table.insert(CacheCategory::PlatformSettings, 3600);
        table.insert(CacheCategory::FileBatch, 600);
        table.insert(CacheCategory::ExecutionData, 300);
        table.insert(CacheCategory::Custom, DEFAULT_TTL_SECS);

        Self { table }
    }
}

impl TtlPolicy {
    /// Create the default policy table
    pub fn new() -> Self {
        Self::default()
    }

    /// Default TTL in seconds for a category
    pub fn ttl_for(&self, category: CacheCategory) -> u64 {
        self.table
            .get(&category)
            .copied()
            .unwrap_or(DEFAULT_TTL_SECS)
    }

    /// Override a category's default TTL at runtime
    pub fn set_ttl(&mut self, category: CacheCategory, ttl_secs: u64) {
        self.table.insert(category, ttl_secs);
    }

    /// Number of entries in the table
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_display() {
        assert_eq!(format!("{}", CacheCategory::Workflow), "workflow");
        assert_eq!(
            format!("{}", CacheCategory::WorkflowEndpoints),
            "workflow_endpoints"
        );
        assert_eq!(format!("{}", CacheCategory::Custom), "custom");
    }

    #[test]
    fn test_policy_covers_every_category() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.len(), CacheCategory::ALL.len());

        for category in CacheCategory::ALL {
            assert!(policy.ttl_for(category) > 0, "no TTL for {}", category);
        }
    }

    #[test]
    fn test_policy_runtime_override() {
        let mut policy = TtlPolicy::default();
        assert_eq!(policy.ttl_for(CacheCategory::Workflow), 1800);

        policy.set_ttl(CacheCategory::Workflow, 60);
        assert_eq!(policy.ttl_for(CacheCategory::Workflow), 60);

        // Other categories are untouched
        assert_eq!(policy.ttl_for(CacheCategory::Pipeline), 900);
    }

    #[test]
    fn test_category_serde_wire_names() {
        let json = serde_json::to_string(&CacheCategory::ApiDeployment).unwrap();
        assert_eq!(json, r#""api_deployment""#);

        let back: CacheCategory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CacheCategory::ApiDeployment);
    }
}
