//! DHCP option sets
//!
//! Only sets no VPC uses are candidates; this also keeps the set of the
//! default VPC.

use std::collections::HashSet;

use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::types::DhcpOptions as DhcpOptionSet;
use reaper_common::{CandidateResource, FilterRule, NukeResult};

use super::{ec2_first_seen, ec2_tags};
use crate::aws::AwsContext;
use crate::aws::error::{AwsError, classify_sdk_error};
use crate::aws::retry::retry_throttled;
use crate::driver::nuke_each;
use crate::error::NukeError;
use crate::resource::{AwsResource, ResourceClient, discover};

const NAME: &str = "ec2-dhcp-option";

pub struct DhcpOptions {
    client: ResourceClient<Client>,
    identifiers: Vec<String>,
}

impl Default for DhcpOptions {
    fn default() -> Self {
        Self {
            client: ResourceClient::new(NAME),
            identifiers: Vec::new(),
        }
    }
}

fn candidate(set: &DhcpOptionSet, in_use: &HashSet<String>) -> Option<CandidateResource> {
    let id = set.dhcp_options_id()?;
    if in_use.contains(id) {
        return None;
    }
    Some(CandidateResource::new(id).with_tags(ec2_tags(set.tags())))
}

async fn in_use(client: &Client) -> Result<HashSet<String>, AwsError> {
    let mut ids = HashSet::new();
    let mut pages = client.describe_vpcs().into_paginator().send();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|e| classify_sdk_error(&e))?;
        ids.extend(
            page.vpcs()
                .iter()
                .filter_map(|v| v.dhcp_options_id().map(str::to_string)),
        );
    }
    Ok(ids)
}

async fn list(client: &Client) -> Result<Vec<CandidateResource>, AwsError> {
    let used = in_use(client).await?;
    let mut candidates = Vec::new();
    let mut pages = client.describe_dhcp_options().into_paginator().send();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|e| classify_sdk_error(&e))?;
        candidates.extend(
            page.dhcp_options()
                .iter()
                .filter_map(|set| candidate(set, &used)),
        );
    }
    Ok(ec2_first_seen(client, candidates).await)
}

async fn delete(client: &Client, id: String) -> Result<(), AwsError> {
    retry_throttled(&id, || async {
        client
            .delete_dhcp_options()
            .dhcp_options_id(&id)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| classify_sdk_error(&e))
    })
    .await
}

#[async_trait]
impl AwsResource for DhcpOptions {
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
        nuke_each(NAME, identifiers, |id| delete(client, id)).await
    }
}
