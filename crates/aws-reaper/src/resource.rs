//! Resource adapter contract
//!
//! Every deletable resource type implements [`AwsResource`]. The engine only
//! ever holds `Box<dyn AwsResource>` and never inspects the concrete type.

use async_trait::async_trait;
use reaper_common::defaults::{DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_REQUEST_SIZE};
use reaper_common::{CandidateResource, DeleteError, Eligibility, FilterRule, NukeResult};
use tracing::debug;

use crate::aws::AwsContext;
use crate::error::NukeError;

/// Capability set of one resource type in one region
#[async_trait]
pub trait AwsResource: Send + Sync {
    /// Stable lowercase name, unique across the registry
    fn resource_name(&self) -> &'static str;

    /// Bind to a region's clients. Calling again rebinds.
    fn init(&mut self, ctx: &AwsContext);

    /// Upper bound on identifiers passed to one [`nuke`](Self::nuke) call
    fn max_batch_size(&self) -> usize {
        DEFAULT_MAX_BATCH_SIZE
    }

    /// Hard ceiling above which the driver refuses to call `nuke` at all
    fn max_request_size(&self) -> usize {
        DEFAULT_MAX_REQUEST_SIZE
    }

    /// Identifiers stored by the last successful discovery
    fn resource_identifiers(&self) -> &[String];

    /// List, filter, store and return the eligible identifiers.
    ///
    /// A failed listing stores nothing; partial pages are discarded.
    async fn get_and_set_identifiers(
        &mut self,
        filter: &FilterRule,
    ) -> Result<Vec<String>, NukeError>;

    /// Delete the given identifiers, producing exactly one result for each
    async fn nuke(&self, identifiers: &[String]) -> Vec<NukeResult>;
}

/// SDK client slot shared by every adapter: empty until `init`.
#[derive(Debug)]
pub struct ResourceClient<C> {
    resource_type: &'static str,
    bound: Option<Bound<C>>,
}

#[derive(Debug)]
struct Bound<C> {
    client: C,
    region: String,
}

impl<C> ResourceClient<C> {
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            bound: None,
        }
    }

    pub fn bind(&mut self, client: C, region: &str) {
        self.bound = Some(Bound {
            client,
            region: region.to_string(),
        });
    }

    pub fn client(&self) -> Result<&C, NukeError> {
        self.bound
            .as_ref()
            .map(|b| &b.client)
            .ok_or(NukeError::NotInitialized {
                resource_type: self.resource_type,
            })
    }

    pub fn region(&self) -> Option<&str> {
        self.bound.as_ref().map(|b| b.region.as_str())
    }

    /// Client for a delete call; before `init`, every identifier fails
    pub fn for_delete(&self, identifiers: &[String]) -> Result<&C, Vec<NukeResult>> {
        self.client().map_err(|e| {
            let error = DeleteError::new(e.to_string());
            identifiers
                .iter()
                .map(|id| NukeResult::failure(self.resource_type, id.as_str(), error.clone()))
                .collect()
        })
    }
}

/// Apply the filtering policy to a full discovery listing.
///
/// Rejected candidates are logged at debug level with the rejection reason.
pub fn discover(
    resource_type: &'static str,
    candidates: &[CandidateResource],
    filter: &FilterRule,
) -> Result<Vec<String>, NukeError> {
    let compiled = filter
        .compile()
        .map_err(|source| NukeError::FilterEvaluation {
            resource_type,
            source,
        })?;

    for candidate in candidates {
        let verdict = compiled.evaluate(candidate);
        if verdict != Eligibility::Eligible {
            debug!(
                resource_type,
                identifier = %candidate.identifier,
                name = %candidate.display_name(),
                reason = %verdict,
                "Skipping resource"
            );
        }
    }

    let eligible = compiled.eligible_identifiers(candidates);
    debug!(
        resource_type,
        found = candidates.len(),
        eligible = eligible.len(),
        "Applied filter"
    );
    Ok(eligible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::context::test_context;
    use chrono::{Duration, Utc};

    #[test]
    fn client_slot_reports_not_initialized() {
        let slot: ResourceClient<u32> = ResourceClient::new("ec2");
        assert!(matches!(
            slot.client(),
            Err(NukeError::NotInitialized { resource_type: "ec2" })
        ));
        assert_eq!(slot.region(), None);
    }

    #[test]
    fn client_slot_rebinds() {
        let ctx = test_context("us-west-2");
        let mut slot = ResourceClient::new("ec2");
        slot.bind(1u32, ctx.region());
        slot.bind(2u32, "eu-west-1");
        assert_eq!(*slot.client().unwrap(), 2);
        assert_eq!(slot.region(), Some("eu-west-1"));
    }

    #[test]
    fn unbound_client_fails_every_delete() {
        let slot: ResourceClient<u32> = ResourceClient::new("vpc");
        let ids = vec!["vpc-1".to_string(), "vpc-2".to_string()];
        let failed = slot.for_delete(&ids).unwrap_err();
        assert_eq!(failed.len(), 2);
        assert!(failed.iter().all(|r| !r.is_success()));
    }

    #[test]
    fn discover_applies_name_and_time_rules() {
        let now = Utc::now();
        let candidates = vec![
            CandidateResource::new("a").with_name(Some("example.com")),
            CandidateResource::new("b").with_name(Some("prod-db")),
            CandidateResource::new("c").with_created_at(Some(now + Duration::hours(1))),
            CandidateResource::new("d"),
        ];
        let filter = FilterRule {
            exclude_names: vec!["prod".to_string()],
            exclude_after: Some(now),
            ..Default::default()
        };

        let ids = discover("ec2", &candidates, &filter).unwrap();
        assert_eq!(ids, vec!["a", "d"]);
    }

    #[test]
    fn discover_rejects_malformed_pattern() {
        let filter = FilterRule {
            include_names: vec!["(".to_string()],
            ..Default::default()
        };
        let err = discover("s3", &[CandidateResource::new("x")], &filter).unwrap_err();
        assert!(matches!(
            err,
            NukeError::FilterEvaluation {
                resource_type: "s3",
                ..
            }
        ));
    }
}
