//! Main orchestration logic for nuke runs
//!
//! Visits every targeted region in turn, then the global pseudo-region once.
//! Within a region, adapters run in catalog order and each type's deletion
//! finishes before the next type is discovered. Failures are recorded and
//! reported, never allowed to end the run early.

pub mod report;
pub mod results;
pub mod types;

pub use report::{LogReporter, Reporter};
pub use results::{print_summary, write_results};
pub use types::{AdapterOutcome, AdapterState, AwsAccountResources, RegionResources};

use std::sync::Arc;

use chrono::Utc;
use reaper_common::defaults::DEFAULT_GLOBAL_CLIENT_REGION;
use reaper_common::GLOBAL_REGION;
use tracing::{info, instrument};

use crate::aws::{AwsContext, TargetRegions};
use crate::config::FilterSet;
use crate::driver::nuke_all;
use crate::registry::ResourceRegistry;
use crate::resource::AwsResource;

/// Drives discovery and deletion over a set of regions
pub struct Orchestrator {
    registry: ResourceRegistry,
    filters: FilterSet,
    reporter: Arc<dyn Reporter>,
    dry_run: bool,
}

impl Orchestrator {
    pub fn new(
        registry: ResourceRegistry,
        filters: FilterSet,
        reporter: Arc<dyn Reporter>,
        dry_run: bool,
    ) -> Self {
        Self {
            registry,
            filters,
            reporter,
            dry_run,
        }
    }

    /// Run every targeted region, global last, and collect the outcomes.
    ///
    /// `ctx` only supplies credentials; each region gets its own rebinding.
    pub async fn run(
        &self,
        ctx: &AwsContext,
        targets: &TargetRegions,
        account_id: Option<String>,
    ) -> AwsAccountResources {
        let mut account = AwsAccountResources::new(account_id, self.dry_run);
        info!(
            regions = targets.regional.len(),
            global = targets.include_global,
            dry_run = self.dry_run,
            "Starting run"
        );

        for region in targets.all() {
            let is_global = region == GLOBAL_REGION;
            if is_global && !self.registry.has_global() {
                continue;
            }
            let client_region = if is_global {
                DEFAULT_GLOBAL_CLIENT_REGION
            } else {
                region.as_str()
            };
            let outcomes = self.nuke_region(&region, &ctx.for_region(client_region)).await;
            account.regions.push(RegionResources { region, outcomes });
        }

        account.finished_at = Some(Utc::now());
        info!(
            found = account.total_found(),
            deleted = account.total_deleted(),
            failed = account.total_failed(),
            "Run finished"
        );
        account
    }

    #[instrument(skip_all, fields(region = %region))]
    async fn nuke_region(&self, region: &str, ctx: &AwsContext) -> Vec<AdapterOutcome> {
        let adapters = self.registry.instantiate(region, ctx);
        let mut outcomes = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            outcomes.push(self.process(region, adapter).await);
        }
        outcomes
    }

    /// Discover, then (outside dry runs) delete, one resource type
    async fn process(&self, region: &str, mut adapter: Box<dyn AwsResource>) -> AdapterOutcome {
        let resource_type = adapter.resource_name();
        let mut outcome = AdapterOutcome::new(resource_type);

        outcome.advance(AdapterState::Discovering);
        let filter = self.filters.rule_for(resource_type);
        match adapter.get_and_set_identifiers(&filter).await {
            Ok(identifiers) => {
                outcome.discovered = identifiers;
                outcome.advance(AdapterState::Eligible);
            }
            Err(e) => {
                self.reporter.on_adapter_error(region, resource_type, &e);
                outcome.error = Some(e.to_string());
                outcome.advance(AdapterState::DiscoveryFailed);
                return outcome;
            }
        }
        self.reporter
            .on_discovered(region, resource_type, &outcome.discovered);

        if self.dry_run {
            outcome.advance(AdapterState::Listed);
            return outcome;
        }
        if outcome.discovered.is_empty() {
            outcome.advance(AdapterState::Done);
            return outcome;
        }

        outcome.advance(AdapterState::Deleting);
        let reporter = &self.reporter;
        let run = nuke_all(&*adapter, &outcome.discovered, |result| {
            reporter.on_result(region, result)
        })
        .await;

        let failures = run.combined_error();
        for e in run.aborted.iter().chain(failures.iter()) {
            self.reporter.on_adapter_error(region, resource_type, e);
        }
        outcome.error = run.aborted.as_ref().or(failures.as_ref()).map(ToString::to_string);
        outcome.results = run.results;
        outcome.advance(AdapterState::Done);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::report::recording::RecordingReporter;
    use super::*;
    use crate::aws::context::test_context;
    use crate::config::FilterConfig;
    use crate::registry::Factory;
    use crate::testing::{Journal, MockResource};

    fn factory(make: impl Fn() -> MockResource + Send + Sync + 'static) -> Factory {
        Box::new(move || Box::new(make()) as Box<dyn AwsResource>)
    }

    fn one_region(region: &str) -> TargetRegions {
        TargetRegions {
            regional: vec![region.to_string()],
            include_global: false,
        }
    }

    fn orchestrator(
        regional: Vec<Factory>,
        global: Vec<Factory>,
        dry_run: bool,
    ) -> (Orchestrator, Arc<RecordingReporter>) {
        let reporter = Arc::new(RecordingReporter::default());
        let orchestrator = Orchestrator::new(
            ResourceRegistry::from_factories(global, regional),
            FilterSet::new(&FilterConfig::default(), None),
            reporter.clone(),
            dry_run,
        );
        (orchestrator, reporter)
    }

    fn journal_of(journal: &Journal) -> Vec<String> {
        journal.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn each_type_is_deleted_before_the_next_is_discovered() {
        let journal = Journal::default();
        let (j1, j2) = (journal.clone(), journal.clone());
        let (orchestrator, _) = orchestrator(
            vec![
                factory(move || {
                    MockResource::unbound("ec2")
                        .with_candidates(["i-1"])
                        .with_journal(j1.clone())
                }),
                factory(move || {
                    MockResource::unbound("ebs")
                        .with_candidates(["vol-1"])
                        .with_journal(j2.clone())
                }),
            ],
            vec![],
            false,
        );

        let account = orchestrator
            .run(&test_context("us-east-1"), &one_region("us-east-1"), None)
            .await;

        assert_eq!(
            journal_of(&journal),
            vec![
                "discover ec2@us-east-1",
                "nuke ec2",
                "discover ebs@us-east-1",
                "nuke ebs",
            ]
        );
        assert!(!account.has_errors());
        assert_eq!(account.total_deleted(), 2);
        assert!(account.finished_at.is_some());
    }

    #[tokio::test]
    async fn partial_failure_is_isolated() {
        let (orchestrator, reporter) = orchestrator(
            vec![
                factory(|| {
                    MockResource::unbound("ec2")
                        .with_candidates(["i-1", "i-2", "i-3"])
                        .failing_on(["i-2"])
                }),
                factory(|| MockResource::unbound("ebs").with_candidates(["vol-1"])),
            ],
            vec![],
            false,
        );

        let account = orchestrator
            .run(&test_context("us-east-1"), &one_region("us-east-1"), None)
            .await;
        let outcomes = account.region("us-east-1").unwrap();

        assert_eq!(outcomes[0].results.len(), 3);
        assert_eq!(outcomes[0].deleted(), 2);
        assert_eq!(outcomes[0].failed(), 1);
        assert_eq!(outcomes[0].state, AdapterState::Done);
        assert!(outcomes[0].error.as_deref().unwrap().contains("i-2"));

        assert_eq!(outcomes[1].state, AdapterState::Done);
        assert_eq!(outcomes[1].deleted(), 1);
        assert!(account.has_errors());

        let events = reporter.events();
        assert!(events.contains(&"result us-east-1 ec2 i-2 failed".to_string()));
        assert!(events.contains(&"error us-east-1 ec2".to_string()));
        assert!(events.contains(&"result us-east-1 ebs vol-1 ok".to_string()));
    }

    #[tokio::test]
    async fn discovery_failure_does_not_stop_later_types() {
        let (orchestrator, reporter) = orchestrator(
            vec![
                factory(|| MockResource::unbound("s3").failing_discovery()),
                factory(|| MockResource::unbound("vpc").with_candidates(["vpc-1"])),
            ],
            vec![],
            false,
        );

        let account = orchestrator
            .run(&test_context("eu-west-1"), &one_region("eu-west-1"), None)
            .await;
        let outcomes = account.region("eu-west-1").unwrap();

        assert_eq!(outcomes[0].state, AdapterState::DiscoveryFailed);
        assert!(outcomes[0].results.is_empty());
        assert!(outcomes[0].error.is_some());
        assert_eq!(outcomes[1].state, AdapterState::Done);
        assert_eq!(outcomes[1].deleted(), 1);
        assert!(account.has_errors());
        assert_eq!(reporter.events()[0], "error eu-west-1 s3");
    }

    #[tokio::test]
    async fn dry_run_lists_without_deleting() {
        let journal = Journal::default();
        let j = journal.clone();
        let (orchestrator, reporter) = orchestrator(
            vec![factory(move || {
                MockResource::unbound("ec2")
                    .with_candidates(["i-1", "i-2"])
                    .with_journal(j.clone())
            })],
            vec![],
            true,
        );

        let account = orchestrator
            .run(&test_context("us-east-1"), &one_region("us-east-1"), None)
            .await;
        let outcome = &account.region("us-east-1").unwrap()[0];

        assert!(account.dry_run);
        assert_eq!(outcome.state, AdapterState::Listed);
        assert_eq!(outcome.discovered, vec!["i-1", "i-2"]);
        assert!(outcome.results.is_empty());
        assert_eq!(journal_of(&journal), vec!["discover ec2@us-east-1"]);
        assert_eq!(reporter.events(), vec!["discovered us-east-1 ec2 [i-1,i-2]"]);
        assert!(!account.has_errors());
    }

    #[tokio::test]
    async fn nothing_found_skips_delete() {
        let journal = Journal::default();
        let j = journal.clone();
        let (orchestrator, _) = orchestrator(
            vec![factory(move || {
                MockResource::unbound("eip").with_journal(j.clone())
            })],
            vec![],
            false,
        );

        let account = orchestrator
            .run(&test_context("us-east-1"), &one_region("us-east-1"), None)
            .await;

        assert_eq!(account.region("us-east-1").unwrap()[0].state, AdapterState::Done);
        assert_eq!(journal_of(&journal), vec!["discover eip@us-east-1"]);
    }

    #[tokio::test]
    async fn global_runs_once_after_all_regions() {
        let journal = Journal::default();
        let (j1, j2) = (journal.clone(), journal.clone());
        let (orchestrator, _) = orchestrator(
            vec![factory(move || {
                MockResource::unbound("ec2")
                    .with_candidates(["i-1"])
                    .with_journal(j1.clone())
            })],
            vec![factory(move || {
                MockResource::unbound("iam-role")
                    .with_candidates(["ci-role"])
                    .with_journal(j2.clone())
            })],
            false,
        );
        let targets = TargetRegions {
            regional: vec!["eu-west-1".to_string(), "us-west-2".to_string()],
            include_global: true,
        };

        let account = orchestrator
            .run(&test_context("eu-central-1"), &targets, Some("123456789012".into()))
            .await;

        assert_eq!(
            journal_of(&journal),
            vec![
                "discover ec2@eu-west-1",
                "nuke ec2",
                "discover ec2@us-west-2",
                "nuke ec2",
                "discover iam-role@us-east-1",
                "nuke iam-role",
            ]
        );
        let visited: Vec<_> = account.regions.iter().map(|r| r.region.as_str()).collect();
        assert_eq!(visited, vec!["eu-west-1", "us-west-2", GLOBAL_REGION]);
        assert_eq!(account.account_id.as_deref(), Some("123456789012"));
    }

    #[tokio::test]
    async fn excluded_global_is_skipped() {
        let journal = Journal::default();
        let j = journal.clone();
        let (orchestrator, _) = orchestrator(
            vec![],
            vec![factory(move || {
                MockResource::unbound("iam-role")
                    .with_candidates(["ci-role"])
                    .with_journal(j.clone())
            })],
            false,
        );

        let account = orchestrator
            .run(&test_context("us-east-1"), &one_region("us-east-1"), None)
            .await;

        assert!(journal_of(&journal).is_empty());
        assert!(account.region(GLOBAL_REGION).is_none());
    }

    #[tokio::test]
    async fn filter_file_rules_reach_adapters() {
        let config = FilterConfig::from_yaml("s3:\n  exclude:\n    names_regex: [\"keep\"]\n")
            .unwrap();
        let orchestrator = Orchestrator::new(
            ResourceRegistry::from_factories(
                vec![],
                vec![factory(|| {
                    MockResource::unbound("s3").with_candidates(["keep-logs", "scratch-1"])
                })],
            ),
            FilterSet::new(&config, None),
            Arc::new(RecordingReporter::default()),
            true,
        );

        let account = orchestrator
            .run(&test_context("us-east-1"), &one_region("us-east-1"), None)
            .await;

        assert_eq!(account.region("us-east-1").unwrap()[0].discovered, vec!["scratch-1"]);
    }

    #[tokio::test]
    async fn missing_results_become_failures() {
        let (orchestrator, _) = orchestrator(
            vec![factory(|| {
                MockResource::unbound("ebs")
                    .with_candidates(["vol-1", "vol-2"])
                    .dropping_results()
            })],
            vec![],
            false,
        );

        let account = orchestrator
            .run(&test_context("us-east-1"), &one_region("us-east-1"), None)
            .await;
        let outcome = &account.region("us-east-1").unwrap()[0];

        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.failed(), 2);
    }

    #[tokio::test]
    async fn refused_batch_keeps_reported_results() {
        let (orchestrator, reporter) = orchestrator(
            vec![factory(|| {
                MockResource::unbound("eip")
                    .with_candidates(["eipalloc-1", "eipalloc-2", "eipalloc-3"])
                    .with_max_batch_size(1)
                    .refusing_after(1)
            })],
            vec![],
            false,
        );

        let account = orchestrator
            .run(&test_context("us-east-1"), &one_region("us-east-1"), None)
            .await;
        let outcome = &account.region("us-east-1").unwrap()[0];

        assert_eq!(outcome.state, AdapterState::Done);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.deleted(), 1);
        assert!(outcome.error.is_some());
        let events = reporter.events();
        assert!(events.contains(&"result us-east-1 eip eipalloc-1 ok".to_string()));
        assert!(events.contains(&"error us-east-1 eip".to_string()));
    }
}
