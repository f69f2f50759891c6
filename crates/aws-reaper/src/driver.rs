//! Batched deletion driver
//!
//! Feeds eligible identifiers to an adapter in size-bounded batches, one batch
//! at a time, and collects exactly one [`NukeResult`] per identifier. Within a
//! batch, adapters without a bulk delete fan out one future per identifier via
//! [`nuke_each`]; every future is joined before the batch returns.

use std::collections::HashMap;
use std::future::Future;

use futures::future::join_all;
use reaper_common::{DeleteError, NukeResult, split};
use tracing::{debug, info, warn};

use crate::aws::AwsError;
use crate::error::NukeError;
use crate::resource::AwsResource;

/// All results of one resource type's delete phase
#[derive(Debug)]
pub struct DeleteRun {
    pub resource_type: String,
    /// One per identifier of every batch that ran
    pub results: Vec<NukeResult>,
    /// Set when a batch was refused; no later batch ran
    pub aborted: Option<NukeError>,
}

impl DeleteRun {
    pub fn attempted(&self) -> usize {
        self.results.len()
    }

    pub fn deleted(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.deleted()
    }

    /// Aggregate of every per-identifier failure, or `None` if all succeeded
    pub fn combined_error(&self) -> Option<NukeError> {
        let failures: Vec<String> = self
            .results
            .iter()
            .filter_map(|r| {
                r.error
                    .as_ref()
                    .map(|e| format!("{}: {}", r.identifier, e))
            })
            .collect();

        if failures.is_empty() {
            None
        } else {
            Some(NukeError::Delete {
                resource_type: self.resource_type.clone(),
                attempted: self.attempted(),
                failures,
            })
        }
    }
}

/// One `nuke` call, refused outright when it exceeds the type's request ceiling
pub async fn nuke_batch(
    resource: &dyn AwsResource,
    identifiers: &[String],
) -> Result<Vec<NukeResult>, NukeError> {
    let limit = resource.max_request_size();
    if identifiers.len() > limit {
        return Err(NukeError::TooManyRequested {
            resource_type: resource.resource_name(),
            requested: identifiers.len(),
            limit,
        });
    }

    let results = resource.nuke(identifiers).await;
    Ok(complete_results(resource.resource_name(), identifiers, results))
}

/// Delete every identifier, batch by batch, streaming results to `sink`.
///
/// A refused batch stops the phase; the returned run keeps what was already
/// streamed and carries the refusal in [`DeleteRun::aborted`].
pub async fn nuke_all<F>(
    resource: &dyn AwsResource,
    identifiers: &[String],
    mut sink: F,
) -> DeleteRun
where
    F: FnMut(&NukeResult),
{
    let resource_type = resource.resource_name();
    let batch_size = resource
        .max_batch_size()
        .min(resource.max_request_size())
        .max(1);
    let batches = split(identifiers, batch_size);
    let total = batches.len();

    let mut run = DeleteRun {
        resource_type: resource_type.to_string(),
        results: Vec::with_capacity(identifiers.len()),
        aborted: None,
    };

    for (index, batch) in batches.iter().enumerate() {
        debug!(
            resource_type,
            batch = index + 1,
            total,
            count = batch.len(),
            "Deleting batch"
        );
        let results = match nuke_batch(resource, batch).await {
            Ok(results) => results,
            Err(e) => {
                warn!(resource_type, batch = index + 1, error = %e, "Batch refused");
                run.aborted = Some(e);
                break;
            }
        };
        for result in &results {
            sink(result);
        }
        run.results.extend(results);
    }

    info!(
        resource_type,
        deleted = run.deleted(),
        failed = run.failed(),
        "Delete phase finished"
    );
    run
}

/// Delete identifiers one call each, concurrently, keeping input order.
///
/// "Not found" counts as success: the resource is already gone.
pub async fn nuke_each<F, Fut>(
    resource_type: &str,
    identifiers: &[String],
    delete: F,
) -> Vec<NukeResult>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<(), AwsError>>,
{
    let calls = identifiers.iter().map(|id| {
        let call = delete(id.clone());
        async move { (id, call.await) }
    });

    join_all(calls)
        .await
        .into_iter()
        .map(|(id, outcome)| to_result(resource_type, id, outcome))
        .collect()
}

/// Give every identifier the outcome of one bulk call
pub fn results_for_all(
    resource_type: &str,
    identifiers: &[String],
    outcome: Result<(), AwsError>,
) -> Vec<NukeResult> {
    identifiers
        .iter()
        .map(|id| to_result(resource_type, id, outcome.clone()))
        .collect()
}

fn to_result(resource_type: &str, identifier: &str, outcome: Result<(), AwsError>) -> NukeResult {
    match outcome {
        Ok(()) => NukeResult::success(resource_type, identifier),
        Err(e) if e.is_not_found() => {
            debug!(resource_type, identifier, "Already deleted");
            NukeResult::success(resource_type, identifier)
        }
        Err(e) => NukeResult::failure(resource_type, identifier, e.into()),
    }
}

/// Exactly one result per identifier, in input order.
///
/// The first result reported for an identifier wins. Repeats and results for
/// identifiers that were never requested are dropped, and an identifier with
/// no result becomes a failure.
fn complete_results(
    resource_type: &str,
    identifiers: &[String],
    results: Vec<NukeResult>,
) -> Vec<NukeResult> {
    let reported = results.len();
    let mut first: HashMap<String, NukeResult> = HashMap::with_capacity(reported);
    for result in results {
        first.entry(result.identifier.clone()).or_insert(result);
    }

    let completed: Vec<NukeResult> = identifiers
        .iter()
        .map(|id| {
            first.remove(id).unwrap_or_else(|| {
                NukeResult::failure(
                    resource_type,
                    id.as_str(),
                    DeleteError::new("adapter reported no result"),
                )
            })
        })
        .collect();

    if reported != completed.len() {
        debug!(
            resource_type,
            reported,
            requested = identifiers.len(),
            "Adapter result count did not match request"
        );
    }
    completed
}
