//! IAM roles (account-wide)
//!
//! Service-linked and AWS-reserved roles cannot be deleted directly and are
//! never listed. Before its delete call, a role is removed from any instance
//! profile and stripped of attached and inline policies.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_iam::Client;
use aws_sdk_iam::types::Role;
use reaper_common::tags::extract_tags;
use reaper_common::{CandidateResource, FilterRule, NukeResult};
use tracing::debug;

use super::to_utc;
use crate::aws::AwsContext;
use crate::aws::error::{AwsError, classify_sdk_error, ignore_not_found};
use crate::aws::retry::{RetryPolicy, retry_aws};
use crate::driver::nuke_each;
use crate::error::NukeError;
use crate::resource::{AwsResource, ResourceClient, discover};

const NAME: &str = "iam-role";

/// Role paths owned by AWS
const PROTECTED_PATHS: &[&str] = &["/aws-service-role/", "/aws-reserved/"];

pub struct Roles {
    client: ResourceClient<Client>,
    identifiers: Vec<String>,
}

impl Default for Roles {
    fn default() -> Self {
        Self {
            client: ResourceClient::new(NAME),
            identifiers: Vec::new(),
        }
    }
}

fn is_protected(role: &Role) -> bool {
    PROTECTED_PATHS.iter().any(|p| role.path().starts_with(p))
}

fn candidate(role: &Role, tags: HashMap<String, String>) -> CandidateResource {
    CandidateResource::new(role.role_name())
        .with_created_at(to_utc(role.create_date()))
        .with_tags(tags)
}

async fn tags(client: &Client, name: &str) -> Result<HashMap<String, String>, AwsError> {
    let response = client
        .list_role_tags()
        .role_name(name)
        .send()
        .await
        .map_err(|e| classify_sdk_error(&e))?;
    Ok(extract_tags(response.tags(), |t| Some(t.key()), |t| Some(t.value())))
}

async fn list(client: &Client) -> Result<Vec<CandidateResource>, AwsError> {
    let mut candidates = Vec::new();
    let mut pages = client.list_roles().into_paginator().send();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|e| classify_sdk_error(&e))?;
        for role in page.roles().iter().filter(|r| !is_protected(r)) {
            let tags = tags(client, role.role_name()).await?;
            candidates.push(candidate(role, tags));
        }
    }
    Ok(candidates)
}

async fn remove_from_profiles(client: &Client, role: &str) -> Result<(), AwsError> {
    let mut pages = client
        .list_instance_profiles_for_role()
        .role_name(role)
        .into_paginator()
        .send();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|e| classify_sdk_error(&e))?;
        for profile in page.instance_profiles() {
            debug!(role, profile = %profile.instance_profile_name(), "Removing role from instance profile");
            ignore_not_found(
                client
                    .remove_role_from_instance_profile()
                    .instance_profile_name(profile.instance_profile_name())
                    .role_name(role)
                    .send()
                    .await,
            )?;
        }
    }
    Ok(())
}

async fn detach_policies(client: &Client, role: &str) -> Result<(), AwsError> {
    let mut pages = client
        .list_attached_role_policies()
        .role_name(role)
        .into_paginator()
        .send();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|e| classify_sdk_error(&e))?;
        for arn in page.attached_policies().iter().filter_map(|p| p.policy_arn()) {
            ignore_not_found(
                client
                    .detach_role_policy()
                    .role_name(role)
                    .policy_arn(arn)
                    .send()
                    .await,
            )?;
        }
    }
    Ok(())
}

async fn delete_inline_policies(client: &Client, role: &str) -> Result<(), AwsError> {
    let mut pages = client
        .list_role_policies()
        .role_name(role)
        .into_paginator()
        .send();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|e| classify_sdk_error(&e))?;
        for policy in page.policy_names() {
            ignore_not_found(
                client
                    .delete_role_policy()
                    .role_name(role)
                    .policy_name(policy)
                    .send()
                    .await,
            )?;
        }
    }
    Ok(())
}

async fn delete(client: &Client, role: String) -> Result<(), AwsError> {
    remove_from_profiles(client, &role).await?;
    detach_policies(client, &role).await?;
    delete_inline_policies(client, &role).await?;

    // DeleteConflict clears once the detaches above propagate
    retry_aws(&role, RetryPolicy::DEPENDENCY, || async {
        client
            .delete_role()
            .role_name(&role)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| classify_sdk_error(&e))
    })
    .await
}

#[async_trait]
impl AwsResource for Roles {
    fn resource_name(&self) -> &'static str {
        NAME
    }

    fn init(&mut self, ctx: &AwsContext) {
        self.client.bind(ctx.iam_client(), ctx.region());
    }

    fn max_batch_size(&self) -> usize {
        20
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
        nuke_each(NAME, identifiers, |role| delete(client, role)).await
    }
}
