//! Engine error taxonomy
//!
//! Per-identifier delete failures travel as values inside
//! [`NukeResult`](reaper_common::NukeResult); the variants here are what
//! adapters and the driver hand back to the orchestrator, which logs them and
//! moves on to the next resource type.
//!
//! Registry ordering violations are not represented: the catalog order is an
//! invariant upheld by construction, and breaking it surfaces as provider
//! "resource in use" errors inside individual results.

use crate::aws::AwsError;
use reaper_common::FilterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NukeError {
    /// The listing call failed; nothing from this discovery is kept
    #[error("{resource_type}: discovery failed: {source}")]
    Discovery {
        resource_type: &'static str,
        #[source]
        source: AwsError,
    },

    /// A filter rule for this resource type could not be evaluated
    #[error("{resource_type}: invalid filter: {source}")]
    FilterEvaluation {
        resource_type: &'static str,
        #[source]
        source: FilterError,
    },

    /// Discovery or deletion was attempted before `init`
    #[error("{resource_type}: adapter used before init")]
    NotInitialized { resource_type: &'static str },

    /// One or more identifiers failed to delete (all others were still attempted)
    #[error("{resource_type}: {} of {attempted} deletions failed: {}", failures.len(), failures.join("; "))]
    Delete {
        resource_type: String,
        attempted: usize,
        failures: Vec<String>,
    },

    /// A single nuke invocation asked for more identifiers than the type allows
    #[error("{resource_type}: refusing to delete {requested} identifiers in one request (limit {limit})")]
    TooManyRequested {
        resource_type: &'static str,
        requested: usize,
        limit: usize,
    },
}

impl NukeError {
    pub fn discovery(resource_type: &'static str, source: AwsError) -> Self {
        NukeError::Discovery {
            resource_type,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_error_summarizes_failures() {
        let err = NukeError::Delete {
            resource_type: "ec2".to_string(),
            attempted: 3,
            failures: vec!["i-2: denied".to_string()],
        };
        assert_eq!(err.to_string(), "ec2: 1 of 3 deletions failed: i-2: denied");
    }

    #[test]
    fn too_many_requested_message() {
        let err = NukeError::TooManyRequested {
            resource_type: "s3",
            requested: 150,
            limit: 100,
        };
        assert!(err.to_string().contains("150"));
        assert!(err.to_string().contains("limit 100"));
    }
}
