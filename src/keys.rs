//! Deterministic cache key construction
//!
//! Keys are namespaced by a fixed prefix and category:
//! `worker_cache:<category>:<ids...>`. The generic path hashes its arguments
//! to a short fixed width so key length stays bounded regardless of argument
//! size. Uniqueness within a category is the caller's responsibility.

use crate::category::CacheCategory;
use sha2::{Digest, Sha256};

/// Namespace prefix shared by every key this crate writes
pub const KEY_PREFIX: &str = "worker_cache";

/// Hex characters kept from the argument digest on the generic path
const HASH_LEN: usize = 8;

/// Key for a workflow definition
pub fn workflow(workflow_id: &str) -> String {
    format!("{}:{}:{}", KEY_PREFIX, CacheCategory::Workflow, workflow_id)
}

/// Key for the endpoints of a workflow
pub fn workflow_endpoints(workflow_id: &str) -> String {
    format!(
        "{}:{}:{}",
        KEY_PREFIX,
        CacheCategory::WorkflowEndpoints,
        workflow_id
    )
}

/// Key for a pipeline record
pub fn pipeline(pipeline_id: &str) -> String {
    format!("{}:{}:{}", KEY_PREFIX, CacheCategory::Pipeline, pipeline_id)
}

/// Key for an API deployment, scoped by organization
pub fn api_deployment(api_id: &str, org_id: &str) -> String {
    format!(
        "{}:{}:{}:{}",
        KEY_PREFIX,
        CacheCategory::ApiDeployment,
        api_id,
        org_id
    )
}

/// Key for the tool instances of a workflow
pub fn tool_instances(workflow_id: &str) -> String {
    format!(
        "{}:{}:{}",
        KEY_PREFIX,
        CacheCategory::ToolInstances,
        workflow_id
    )
}

/// Generic key for ad-hoc categories
///
/// Arguments are joined with `:` and reduced to a short stable digest;
/// identical arguments always yield the identical key.
pub fn custom(category: CacheCategory, args: &[&str]) -> String {
    let joined = args.join(":");
    let digest = Sha256::digest(joined.as_bytes());
    let short = &hex::encode(digest)[..HASH_LEN];
    format!("{}:{}:{}", KEY_PREFIX, category, short)
}

/// Scan pattern matching every key of a category
pub fn category_pattern(category: CacheCategory) -> String {
    format!("{}:{}:*", KEY_PREFIX, category)
}

/// Key for a category and a single caller-supplied identifier
///
/// Well-known categories use their dedicated layout; everything else goes
/// through the hashed generic path.
pub fn for_category(category: CacheCategory, id: &str) -> String {
    match category {
        CacheCategory::Workflow => workflow(id),
        CacheCategory::WorkflowEndpoints => workflow_endpoints(id),
        CacheCategory::Pipeline => pipeline(id),
        CacheCategory::ToolInstances => tool_instances(id),
        _ => custom(category, &[id]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_keys() {
        assert_eq!(workflow("wf-1"), "worker_cache:workflow:wf-1");
        assert_eq!(
            workflow_endpoints("wf-1"),
            "worker_cache:workflow_endpoints:wf-1"
        );
        assert_eq!(pipeline("pl-9"), "worker_cache:pipeline:pl-9");
        assert_eq!(
            api_deployment("api-3", "org-7"),
            "worker_cache:api_deployment:api-3:org-7"
        );
        assert_eq!(tool_instances("wf-1"), "worker_cache:tool_instances:wf-1");
    }

    #[test]
    fn test_custom_key_is_deterministic() {
        let a = custom(CacheCategory::Custom, &["alpha", "beta"]);
        let b = custom(CacheCategory::Custom, &["alpha", "beta"]);
        assert_eq!(a, b);

        let c = custom(CacheCategory::Custom, &["alpha", "gamma"]);
        assert_ne!(a, c);
    }

    #[test]
    fn test_custom_key_length_is_bounded() {
        let long_arg = "x".repeat(10_000);
        let key = custom(CacheCategory::Custom, &[&long_arg]);

        assert!(key.starts_with("worker_cache:custom:"));
        let hash = key.rsplit(':').next().unwrap();
        assert_eq!(hash.len(), HASH_LEN);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_category_pattern() {
        assert_eq!(
            category_pattern(CacheCategory::Pipeline),
            "worker_cache:pipeline:*"
        );
    }

    #[test]
    fn test_for_category_dispatch() {
        assert_eq!(
            for_category(CacheCategory::Workflow, "wf-1"),
            workflow("wf-1")
        );
        // Ad-hoc categories go through the hashed path
        let key = for_category(CacheCategory::ExecutionData, "exec-1");
        assert_eq!(key, custom(CacheCategory::ExecutionData, &["exec-1"]));
    }
}
