//! AWS test utilities
//!
//! Provides region detection and unique names for resources created by
//! integration tests.

use chrono::Utc;

/// Prefix of every resource name created by integration tests
pub const TEST_NAME_PREFIX: &str = "aws-reaper-test";

/// Get the AWS region for tests.
///
/// Checks environment variables in order:
/// 1. AWS_REGION
/// 2. AWS_DEFAULT_REGION
/// 3. Falls back to us-east-1
///
/// # Example
///
/// ```
/// use reaper_test_utils::aws::get_test_region;
///
/// let region = get_test_region();
/// assert!(!region.is_empty());
/// ```
pub fn get_test_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "us-east-1".to_string())
}

/// Generate a unique run ID for test resources.
///
/// Format: `{timestamp_ms}-{counter}`, unique even when tests start in the
/// same millisecond.
pub fn test_run_id() -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let ts = Utc::now().timestamp_millis();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}", ts, counter)
}

/// Unique name for a test resource of the given kind.
///
/// Lowercase and dash-separated, so it is also a valid S3 bucket name.
///
/// ```
/// use reaper_test_utils::aws::test_resource_name;
///
/// let name = test_resource_name("keypair");
/// assert!(name.starts_with("aws-reaper-test-keypair-"));
/// ```
pub fn test_resource_name(kind: &str) -> String {
    format!("{}-{}-{}", TEST_NAME_PREFIX, kind, test_run_id())
}

/// YAML filter file that limits `resource_type` to exactly `name`
pub fn exact_name_filter(resource_type: &str, name: &str) -> String {
    format!(
        "{resource_type}:\n  include:\n    names_regex: ['^{}$']\n",
        regex::escape(name)
    )
}
