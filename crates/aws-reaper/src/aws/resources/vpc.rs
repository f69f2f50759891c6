//! VPCs (the default VPC is skipped)

use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::types::Vpc;
use reaper_common::{CandidateResource, FilterRule, NukeResult};

use super::{ec2_first_seen, ec2_tags};
use crate::aws::AwsContext;
use crate::aws::error::{AwsError, classify_sdk_error};
use crate::aws::retry::{RetryPolicy, retry_aws};
use crate::driver::nuke_each;
use crate::error::NukeError;
use crate::resource::{AwsResource, ResourceClient, discover};

const NAME: &str = "vpc";

pub struct Vpcs {
    client: ResourceClient<Client>,
    identifiers: Vec<String>,
}

impl Default for Vpcs {
    fn default() -> Self {
        Self {
            client: ResourceClient::new(NAME),
            identifiers: Vec::new(),
        }
    }
}

fn candidate(vpc: &Vpc) -> Option<CandidateResource> {
    if vpc.is_default() == Some(true) {
        return None;
    }
    Some(CandidateResource::new(vpc.vpc_id()?).with_tags(ec2_tags(vpc.tags())))
}

async fn list(client: &Client) -> Result<Vec<CandidateResource>, AwsError> {
    let mut candidates = Vec::new();
    let mut pages = client.describe_vpcs().into_paginator().send();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|e| classify_sdk_error(&e))?;
        candidates.extend(page.vpcs().iter().filter_map(candidate));
    }
    Ok(ec2_first_seen(client, candidates).await)
}

async fn delete(client: &Client, id: String) -> Result<(), AwsError> {
    retry_aws(&id, RetryPolicy::DEPENDENCY, || async {
        client
            .delete_vpc()
            .vpc_id(&id)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| classify_sdk_error(&e))
    })
    .await
}

#[async_trait]
impl AwsResource for Vpcs {
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
