//! Core types for the orchestrator
//!
//! Contains the per-adapter lifecycle state and the per-account result
//! structure that reporting reads once the run is over.

use chrono::{DateTime, Utc};
use reaper_common::NukeResult;
use serde::Serialize;

/// Lifecycle of one adapter within one region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AdapterState {
    /// Created but not yet bound
    #[default]
    Uninitialized,
    /// Listing and filtering
    Discovering,
    /// Eligible identifiers are known
    Eligible,
    /// Delete batches are running
    Deleting,
    /// Delete phase finished (with or without per-identifier failures)
    Done,
    /// Listing or filter evaluation failed; nothing was deleted
    DiscoveryFailed,
    /// Dry run: eligible identifiers were reported, nothing was deleted
    Listed,
}

impl AdapterState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AdapterState::Done | AdapterState::DiscoveryFailed | AdapterState::Listed
        )
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_advance_to(self, next: AdapterState) -> bool {
        use AdapterState::*;
        matches!(
            (self, next),
            (Uninitialized, Discovering)
                | (Discovering, Eligible)
                | (Discovering, DiscoveryFailed)
                | (Eligible, Deleting)
                | (Eligible, Done)
                | (Eligible, Listed)
                | (Deleting, Done)
        )
    }
}

/// What happened to one resource type in one region
#[derive(Debug, Clone, Serialize)]
pub struct AdapterOutcome {
    pub resource_type: String,
    pub state: AdapterState,
    /// Eligible identifiers from discovery
    pub discovered: Vec<String>,
    /// One entry per attempted deletion
    pub results: Vec<NukeResult>,
    /// Adapter-level error (discovery failure, refused or partially failed delete)
    pub error: Option<String>,
}

impl AdapterOutcome {
    pub fn new(resource_type: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            state: AdapterState::Uninitialized,
            discovered: Vec::new(),
            results: Vec::new(),
            error: None,
        }
    }

    /// Move to `next`; illegal transitions are a bug in the orchestrator
    pub fn advance(&mut self, next: AdapterState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }

    pub fn deleted(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.deleted()
    }

    pub fn has_errors(&self) -> bool {
        self.error.is_some() || self.failed() > 0
    }
}

/// Outcomes of one region (or the global pseudo-region), in catalog order
#[derive(Debug, Clone, Serialize)]
pub struct RegionResources {
    pub region: String,
    pub outcomes: Vec<AdapterOutcome>,
}

/// Everything found and deleted in one account during one run
#[derive(Debug, Clone, Serialize)]
pub struct AwsAccountResources {
    pub account_id: Option<String>,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Regions in visit order
    pub regions: Vec<RegionResources>,
}

impl AwsAccountResources {
    pub fn new(account_id: Option<String>, dry_run: bool) -> Self {
        Self {
            account_id,
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            regions: Vec::new(),
        }
    }

    pub fn region(&self, region: &str) -> Option<&[AdapterOutcome]> {
        self.regions
            .iter()
            .find(|r| r.region == region)
            .map(|r| r.outcomes.as_slice())
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &AdapterOutcome> {
        self.regions.iter().flat_map(|r| r.outcomes.iter())
    }

    pub fn has_errors(&self) -> bool {
        self.outcomes().any(AdapterOutcome::has_errors)
    }

    pub fn total_found(&self) -> usize {
        self.outcomes().map(|o| o.discovered.len()).sum()
    }

    pub fn total_deleted(&self) -> usize {
        self.outcomes().map(AdapterOutcome::deleted).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.outcomes().map(AdapterOutcome::failed).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reaper_common::DeleteError;

    #[test]
    fn legal_lifecycles() {
        use AdapterState::*;
        let paths: Vec<Vec<AdapterState>> = vec![
            vec![Uninitialized, Discovering, Eligible, Deleting, Done],
            vec![Uninitialized, Discovering, Eligible, Done],
            vec![Uninitialized, Discovering, Eligible, Listed],
            vec![Uninitialized, Discovering, DiscoveryFailed],
        ];
        for path in &paths {
            for pair in path.windows(2) {
                assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
            }
            assert!(path.last().unwrap().is_terminal());
        }
    }

    #[test]
    fn terminal_states_do_not_advance() {
        use AdapterState::*;
        assert!(!Done.can_advance_to(Deleting));
        assert!(!DiscoveryFailed.can_advance_to(Eligible));
        assert!(!Listed.can_advance_to(Deleting));
        assert!(!Discovering.can_advance_to(Deleting));
    }

    #[test]
    fn account_totals_and_errors() {
        let mut ok = AdapterOutcome::new("ec2");
        ok.discovered = vec!["i-1".into(), "i-2".into()];
        ok.results = vec![NukeResult::success("ec2", "i-1"), NukeResult::success("ec2", "i-2")];

        let mut partial = AdapterOutcome::new("ebs");
        partial.discovered = vec!["vol-1".into()];
        partial.results = vec![NukeResult::failure("ebs", "vol-1", DeleteError::new("in use"))];

        let mut account = AwsAccountResources::new(None, false);
        account.regions.push(RegionResources {
            region: "us-east-1".into(),
            outcomes: vec![ok.clone()],
        });
        assert!(!account.has_errors());

        account.regions.push(RegionResources {
            region: "us-west-2".into(),
            outcomes: vec![partial],
        });
        assert!(account.has_errors());
        assert_eq!(account.total_found(), 3);
        assert_eq!(account.total_deleted(), 2);
        assert_eq!(account.total_failed(), 1);
        assert_eq!(account.region("us-west-2").unwrap()[0].resource_type, "ebs");
        assert!(account.region("eu-west-1").is_none());
    }

    #[test]
    fn discovery_failure_counts_as_error() {
        let mut failed = AdapterOutcome::new("s3");
        failed.error = Some("access denied".into());
        assert!(failed.has_errors());
    }
}
