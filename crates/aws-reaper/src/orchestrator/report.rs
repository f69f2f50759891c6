//! Progress reporting for a nuke run
//!
//! The orchestrator streams events through [`Reporter`] as they happen, so
//! progress is visible long before the summary table is printed.

use reaper_common::NukeResult;
use tracing::{info, warn};

use crate::error::NukeError;

/// Receives events from the orchestrator as they are produced
pub trait Reporter: Send + Sync {
    /// Discovery for one type finished with these eligible identifiers
    fn on_discovered(&self, region: &str, resource_type: &str, identifiers: &[String]);

    /// One identifier's deletion finished
    fn on_result(&self, region: &str, result: &NukeResult);

    /// An adapter failed as a whole (discovery, refused batch, partial delete)
    fn on_adapter_error(&self, region: &str, resource_type: &str, error: &NukeError);
}

/// Reporter that logs through `tracing`
pub struct LogReporter;

impl LogReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for LogReporter {
    fn on_discovered(&self, region: &str, resource_type: &str, identifiers: &[String]) {
        if identifiers.is_empty() {
            return;
        }
        info!(
            region = %region,
            resource_type = %resource_type,
            count = identifiers.len(),
            "Found eligible resources"
        );
        for identifier in identifiers {
            info!(region = %region, resource_type = %resource_type, identifier = %identifier, "Eligible");
        }
    }

    fn on_result(&self, region: &str, result: &NukeResult) {
        match &result.error {
            None => info!(
                region = %region,
                resource_type = %result.resource_type,
                identifier = %result.identifier,
                "Deleted"
            ),
            Some(error) => warn!(
                region = %region,
                resource_type = %result.resource_type,
                identifier = %result.identifier,
                error = %error,
                "Delete failed"
            ),
        }
    }

    fn on_adapter_error(&self, region: &str, resource_type: &str, error: &NukeError) {
        warn!(region = %region, resource_type = %resource_type, error = %error, "Resource type failed");
    }
}
