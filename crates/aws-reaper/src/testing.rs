//! Test fixtures shared by the unit tests of this crate.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reaper_common::defaults::{DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_REQUEST_SIZE};
use reaper_common::{CandidateResource, DeleteError, FilterRule, NukeResult};

use crate::aws::{AwsContext, AwsError};
use crate::error::NukeError;
use crate::resource::{AwsResource, ResourceClient, discover};

/// Shared, ordered record of what several mocks did
pub type Journal = Arc<Mutex<Vec<String>>>;

/// In-memory adapter with scripted discovery and deletion outcomes.
#[derive(Debug)]
pub struct MockResource {
    name: &'static str,
    client: ResourceClient<()>,
    candidates: Vec<CandidateResource>,
    discovery_error: Option<AwsError>,
    failing: HashSet<String>,
    drop_results: bool,
    report_twice: bool,
    stray_results: Vec<String>,
    refuse_after: Option<usize>,
    max_batch_size: usize,
    max_request_size: usize,
    identifiers: Vec<String>,
    nuke_calls: Mutex<Vec<Vec<String>>>,
    journal: Option<Journal>,
}

impl MockResource {
    /// A mock that is already bound, so driver tests can skip `init`
    pub fn new(name: &'static str) -> Self {
        let mut mock = Self::unbound(name);
        mock.client.bind((), "us-east-1");
        mock
    }

    pub fn unbound(name: &'static str) -> Self {
        Self {
            name,
            client: ResourceClient::new(name),
            candidates: Vec::new(),
            discovery_error: None,
            failing: HashSet::new(),
            drop_results: false,
            report_twice: false,
            stray_results: Vec::new(),
            refuse_after: None,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            identifiers: Vec::new(),
            nuke_calls: Mutex::new(Vec::new()),
            journal: None,
        }
    }

    pub fn with_candidates<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidates = ids.into_iter().map(CandidateResource::new).collect();
        self
    }

    pub fn with_candidate(mut self, candidate: CandidateResource) -> Self {
        self.candidates.push(candidate);
        self
    }

    pub fn failing_discovery(mut self) -> Self {
        self.discovery_error = Some(AwsError::Sdk {
            code: Some("UnauthorizedOperation".to_string()),
            message: "not allowed to list".to_string(),
        });
        self
    }

    pub fn failing_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing = ids.into_iter().map(Into::into).collect();
        self
    }

    /// `nuke` returns nothing at all
    pub fn dropping_results(mut self) -> Self {
        self.drop_results = true;
        self
    }

    /// `nuke` reports every identifier twice, the second time as a failure
    pub fn reporting_twice(mut self) -> Self {
        self.report_twice = true;
        self
    }

    /// `nuke` also reports a success for `id`, which was never requested
    pub fn with_stray_result(mut self, id: impl Into<String>) -> Self {
        self.stray_results.push(id.into());
        self
    }

    /// The request ceiling drops to zero after `calls` `nuke` calls
    pub fn refusing_after(mut self, calls: usize) -> Self {
        self.refuse_after = Some(calls);
        self
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    pub fn with_max_request_size(mut self, size: usize) -> Self {
        self.max_request_size = size;
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Identifier lists passed to each `nuke` call, in call order
    pub fn nuke_calls(&self) -> Vec<Vec<String>> {
        self.nuke_calls.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        if let Some(journal) = &self.journal {
            journal.lock().unwrap().push(event);
        }
    }
}

#[async_trait]
impl AwsResource for MockResource {
    fn resource_name(&self) -> &'static str {
        self.name
    }

    fn init(&mut self, ctx: &AwsContext) {
        self.client.bind((), ctx.region());
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    fn max_request_size(&self) -> usize {
        match self.refuse_after {
            Some(calls) if self.nuke_calls.lock().unwrap().len() >= calls => 0,
            _ => self.max_request_size,
        }
    }

    fn resource_identifiers(&self) -> &[String] {
        &self.identifiers
    }

    async fn get_and_set_identifiers(
        &mut self,
        filter: &FilterRule,
    ) -> Result<Vec<String>, NukeError> {
        self.client.client()?;
        let region = self.client.region().unwrap_or_default().to_string();
        self.record(format!("discover {}@{}", self.name, region));

        if let Some(err) = &self.discovery_error {
            return Err(NukeError::discovery(self.name, err.clone()));
        }
        self.identifiers = discover(self.name, &self.candidates, filter)?;
        Ok(self.identifiers.clone())
    }

    async fn nuke(&self, identifiers: &[String]) -> Vec<NukeResult> {
        self.nuke_calls.lock().unwrap().push(identifiers.to_vec());
        self.record(format!("nuke {}", self.name));

        if self.drop_results {
            return Vec::new();
        }
        let mut results: Vec<NukeResult> = identifiers
            .iter()
            .map(|id| {
                if self.failing.contains(id) {
                    NukeResult::failure(self.name, id.as_str(), DeleteError::new("scripted failure"))
                } else {
                    NukeResult::success(self.name, id.as_str())
                }
            })
            .collect();
        if self.report_twice {
            let repeats: Vec<NukeResult> = identifiers
                .iter()
                .map(|id| NukeResult::failure(self.name, id.as_str(), DeleteError::new("repeat")))
                .collect();
            results.extend(repeats);
        }
        results.extend(
            self.stray_results
                .iter()
                .map(|id| NukeResult::success(self.name, id.as_str())),
        );
        results
    }
}
