//! Internet gateways
//!
//! Gateways attached to a default VPC are left alone. Attachments found during
//! discovery are detached before the gateway is deleted.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::types::InternetGateway;
use reaper_common::{CandidateResource, FilterRule, NukeResult};

use super::{default_vpc_ids, ec2_first_seen, ec2_tags};
use crate::aws::AwsContext;
use crate::aws::error::{AwsError, classify_sdk_error};
use crate::aws::retry::{RetryPolicy, retry_aws};
use crate::driver::nuke_each;
use crate::error::NukeError;
use crate::resource::{AwsResource, ResourceClient, discover};

const NAME: &str = "internet-gateway";

pub struct InternetGateways {
    client: ResourceClient<Client>,
    identifiers: Vec<String>,
    /// Gateway ID -> attached VPC IDs
    attachments: HashMap<String, Vec<String>>,
}

impl Default for InternetGateways {
    fn default() -> Self {
        Self {
            client: ResourceClient::new(NAME),
            identifiers: Vec::new(),
            attachments: HashMap::new(),
        }
    }
}

fn attached_vpcs(gateway: &InternetGateway) -> Vec<String> {
    gateway
        .attachments()
        .iter()
        .filter_map(|a| a.vpc_id().map(str::to_string))
        .collect()
}

fn candidate(
    gateway: &InternetGateway,
    default_vpcs: &HashSet<String>,
) -> Option<CandidateResource> {
    if attached_vpcs(gateway).iter().any(|v| default_vpcs.contains(v)) {
        return None;
    }
    Some(
        CandidateResource::new(gateway.internet_gateway_id()?)
            .with_tags(ec2_tags(gateway.tags())),
    )
}

async fn list(client: &Client) -> Result<Vec<InternetGateway>, AwsError> {
    let mut gateways = Vec::new();
    let mut pages = client.describe_internet_gateways().into_paginator().send();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|e| classify_sdk_error(&e))?;
        gateways.extend(page.internet_gateways().iter().cloned());
    }
    Ok(gateways)
}

async fn delete(client: &Client, id: String, vpcs: &[String]) -> Result<(), AwsError> {
    for vpc in vpcs {
        let detached = retry_aws(&id, RetryPolicy::DEPENDENCY, || async {
            client
                .detach_internet_gateway()
                .internet_gateway_id(&id)
                .vpc_id(vpc)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| classify_sdk_error(&e))
        })
        .await;
        match detached {
            Err(e) if e.code() != Some("Gateway.NotAttached") && !e.is_not_found() => {
                return Err(e);
            }
            _ => {}
        }
    }

    retry_aws(&id, RetryPolicy::DEPENDENCY, || async {
        client
            .delete_internet_gateway()
            .internet_gateway_id(&id)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| classify_sdk_error(&e))
    })
    .await
}

#[async_trait]
impl AwsResource for InternetGateways {
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
        let (gateways, default_vpcs) = tokio::try_join!(list(client), default_vpc_ids(client))
            .map_err(|e| NukeError::discovery(NAME, e))?;

        let candidates = gateways
            .iter()
            .filter_map(|g| candidate(g, &default_vpcs))
            .collect();
        let candidates = ec2_first_seen(client, candidates).await;
        self.identifiers = discover(NAME, &candidates, filter)?;
        self.attachments = gateways
            .iter()
            .filter_map(|g| Some((g.internet_gateway_id()?.to_string(), attached_vpcs(g))))
            .collect();
        Ok(self.identifiers.clone())
    }

    async fn nuke(&self, identifiers: &[String]) -> Vec<NukeResult> {
        let client = match self.client.for_delete(identifiers) {
            Ok(client) => client,
            Err(failed) => return failed,
        };
        nuke_each(NAME, identifiers, |id| {
            let vpcs = self.attachments.get(&id).cloned().unwrap_or_default();
            async move { delete(client, id, &vpcs).await }
        })
        .await
    }
}
