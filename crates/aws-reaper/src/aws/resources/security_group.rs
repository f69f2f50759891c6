//! VPC security groups
//!
//! Every VPC's `default` group is undeletable and never listed. Groups that
//! reference each other cannot be deleted until the references are gone, so
//! each group's rules are revoked before its delete call.

use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::types::SecurityGroup;
use reaper_common::{CandidateResource, FilterRule, NukeResult};

use super::{ec2_first_seen, ec2_tags};
use crate::aws::AwsContext;
use crate::aws::error::{AwsError, classify_sdk_error, ignore_not_found};
use crate::aws::retry::{RetryPolicy, retry_aws, retry_throttled};
use crate::driver::nuke_each;
use crate::error::NukeError;
use crate::resource::{AwsResource, ResourceClient, discover};

const NAME: &str = "security-group";

pub struct SecurityGroups {
    client: ResourceClient<Client>,
    identifiers: Vec<String>,
}

impl Default for SecurityGroups {
    fn default() -> Self {
        Self {
            client: ResourceClient::new(NAME),
            identifiers: Vec::new(),
        }
    }
}

fn candidate(group: &SecurityGroup) -> Option<CandidateResource> {
    if group.group_name() == Some("default") {
        return None;
    }
    Some(
        CandidateResource::new(group.group_id()?)
            .with_name(group.group_name())
            .with_tags(ec2_tags(group.tags())),
    )
}

async fn list(client: &Client) -> Result<Vec<CandidateResource>, AwsError> {
    let mut candidates = Vec::new();
    let mut pages = client.describe_security_groups().into_paginator().send();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|e| classify_sdk_error(&e))?;
        candidates.extend(page.security_groups().iter().filter_map(candidate));
    }
    Ok(ec2_first_seen(client, candidates).await)
}

/// Drop all ingress and egress rules of a group
async fn revoke_rules(client: &Client, id: &str) -> Result<(), AwsError> {
    let described = ignore_not_found(
        client
            .describe_security_groups()
            .group_ids(id)
            .send()
            .await,
    )?;
    let Some(group) = described.as_ref().and_then(|d| d.security_groups().first()) else {
        return Ok(());
    };

    if !group.ip_permissions().is_empty() {
        retry_throttled(id, || async {
            client
                .revoke_security_group_ingress()
                .group_id(id)
                .set_ip_permissions(Some(group.ip_permissions().to_vec()))
                .send()
                .await
                .map(|_| ())
                .map_err(|e| classify_sdk_error(&e))
        })
        .await?;
    }
    if !group.ip_permissions_egress().is_empty() {
        retry_throttled(id, || async {
            client
                .revoke_security_group_egress()
                .group_id(id)
                .set_ip_permissions(Some(group.ip_permissions_egress().to_vec()))
                .send()
                .await
                .map(|_| ())
                .map_err(|e| classify_sdk_error(&e))
        })
        .await?;
    }
    Ok(())
}

/// Revoke rules, then delete, retrying while ENIs from terminated instances
/// still hold the group
async fn delete(client: &Client, id: String) -> Result<(), AwsError> {
    revoke_rules(client, &id).await?;
    retry_aws(&id, RetryPolicy::DEPENDENCY, || async {
        client
            .delete_security_group()
            .group_id(&id)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| classify_sdk_error(&e))
    })
    .await
}

#[async_trait]
impl AwsResource for SecurityGroups {
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
