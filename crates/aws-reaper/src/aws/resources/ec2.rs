//! EC2 instances
//!
//! Instances are terminated with one bulk call per batch. The adapter then
//! waits for the batch to reach `terminated`, because security groups, subnets
//! and volumes further down the registry stay in use until it does.

use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::types::{Instance, InstanceStateName};
use reaper_common::{CandidateResource, FilterRule, NukeResult, ResourceState};
use tracing::{info, warn};

use super::{ec2_tags, to_utc};
use crate::aws::AwsContext;
use crate::aws::error::{AwsError, classify_sdk_error};
use crate::aws::retry::retry_throttled;
use crate::driver::{nuke_each, results_for_all};
use crate::error::NukeError;
use crate::resource::{AwsResource, ResourceClient, discover};
use crate::wait::{WaitConfig, wait_until};

const NAME: &str = "ec2";

pub struct Instances {
    client: ResourceClient<Client>,
    identifiers: Vec<String>,
    wait: WaitConfig,
}

impl Default for Instances {
    fn default() -> Self {
        Self {
            client: ResourceClient::new(NAME),
            identifiers: Vec::new(),
            wait: WaitConfig::default(),
        }
    }
}

fn is_terminal(state: Option<&InstanceStateName>) -> bool {
    matches!(
        state,
        Some(InstanceStateName::ShuttingDown | InstanceStateName::Terminated)
    )
}

fn candidate(instance: &Instance) -> Option<CandidateResource> {
    let state = if is_terminal(instance.state().and_then(|s| s.name())) {
        ResourceState::Terminal
    } else {
        ResourceState::Active
    };
    Some(
        CandidateResource::new(instance.instance_id()?)
            .with_created_at(instance.launch_time().and_then(to_utc))
            .with_tags(ec2_tags(instance.tags()))
            .with_state(state),
    )
}

async fn list(client: &Client) -> Result<Vec<CandidateResource>, AwsError> {
    let mut candidates = Vec::new();
    let mut pages = client.describe_instances().into_paginator().send();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|e| classify_sdk_error(&e))?;
        for reservation in page.reservations() {
            candidates.extend(reservation.instances().iter().filter_map(candidate));
        }
    }
    Ok(candidates)
}

async fn terminate(client: &Client, ids: &[String]) -> Result<(), AwsError> {
    retry_throttled(NAME, || async {
        client
            .terminate_instances()
            .set_instance_ids(Some(ids.to_vec()))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| classify_sdk_error(&e))
    })
    .await
}

async fn terminate_one(client: &Client, id: String) -> Result<(), AwsError> {
    terminate(client, std::slice::from_ref(&id)).await
}

async fn all_terminated(client: &Client, ids: &[String]) -> anyhow::Result<bool> {
    let response = client
        .describe_instances()
        .set_instance_ids(Some(ids.to_vec()))
        .send()
        .await;

    match response {
        Ok(resp) => Ok(resp
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .all(|i| {
                matches!(
                    i.state().and_then(|s| s.name()),
                    Some(InstanceStateName::Terminated) | None
                )
            })),
        Err(e) => {
            let err = classify_sdk_error(&e);
            if err.is_not_found() {
                Ok(true)
            } else {
                warn!(error = %err, "Error checking instance state");
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl AwsResource for Instances {
    fn resource_name(&self) -> &'static str {
        NAME
    }

    fn init(&mut self, ctx: &AwsContext) {
        self.client.bind(ctx.ec2_client(), ctx.region());
    }

    fn resource_identifiers(&self) -> &[String] {
        &self.identifiers
    }

    async fn get_and_set_identifiers(
        &mut self,
        filter: &FilterRule,
    ) -> Result<Vec<String>, NukeError> {
        let client = self.client.client()?;
        let candidates = list(client)
            .await
            .map_err(|e| NukeError::discovery(NAME, e))?;
        self.identifiers = discover(NAME, &candidates, filter)?;
        Ok(self.identifiers.clone())
    }

    async fn nuke(&self, identifiers: &[String]) -> Vec<NukeResult> {
        let client = match self.client.for_delete(identifiers) {
            Ok(client) => client,
            Err(failed) => return failed,
        };
        if identifiers.is_empty() {
            return Vec::new();
        }

        info!(count = identifiers.len(), "Terminating instances in batch");
        let results = match terminate(client, identifiers).await {
            // One unknown ID fails the whole request; fall back to one call each
            Err(e) if e.is_not_found() => {
                nuke_each(NAME, identifiers, |id| terminate_one(client, id)).await
            }
            outcome => results_for_all(NAME, identifiers, outcome),
        };

        let terminated: Vec<String> = results
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.identifier.clone())
            .collect();
        if !terminated.is_empty() {
            let wait = wait_until(self.wait.clone(), "instances terminated", || {
                all_terminated(client, &terminated)
            })
            .await;
            if let Err(e) = wait {
                warn!(count = terminated.len(), error = %e, "Instances not yet terminated");
            }
        }

        results
    }
}
