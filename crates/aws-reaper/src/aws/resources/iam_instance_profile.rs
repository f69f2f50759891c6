//! IAM instance profiles (account-wide)
//!
//! A profile must have its roles removed before it can be deleted. Profiles
//! run ahead of roles in the global catalog so roles are free of them by the
//! time the role adapter runs.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_iam::Client;
use aws_sdk_iam::types::InstanceProfile;
use reaper_common::tags::extract_tags;
use reaper_common::{CandidateResource, FilterRule, NukeResult};

use super::to_utc;
use crate::aws::AwsContext;
use crate::aws::error::{AwsError, classify_sdk_error, ignore_not_found};
use crate::aws::retry::retry_throttled;
use crate::driver::nuke_each;
use crate::error::NukeError;
use crate::resource::{AwsResource, ResourceClient, discover};

const NAME: &str = "iam-instance-profile";

pub struct InstanceProfiles {
    client: ResourceClient<Client>,
    identifiers: Vec<String>,
    /// Profile name -> role names inside it
    roles: HashMap<String, Vec<String>>,
}

impl Default for InstanceProfiles {
    fn default() -> Self {
        Self {
            client: ResourceClient::new(NAME),
            identifiers: Vec::new(),
            roles: HashMap::new(),
        }
    }
}

fn candidate(profile: &InstanceProfile, tags: HashMap<String, String>) -> CandidateResource {
    CandidateResource::new(profile.instance_profile_name())
        .with_created_at(to_utc(profile.create_date()))
        .with_tags(tags)
}

fn role_names(profile: &InstanceProfile) -> Vec<String> {
    profile
        .roles()
        .iter()
        .map(|r| r.role_name().to_string())
        .collect()
}

async fn tags(client: &Client, name: &str) -> Result<HashMap<String, String>, AwsError> {
    let response = client
        .list_instance_profile_tags()
        .instance_profile_name(name)
        .send()
        .await
        .map_err(|e| classify_sdk_error(&e))?;
    Ok(extract_tags(response.tags(), |t| Some(t.key()), |t| Some(t.value())))
}

async fn list(client: &Client) -> Result<Vec<InstanceProfile>, AwsError> {
    let mut profiles = Vec::new();
    let mut pages = client.list_instance_profiles().into_paginator().send();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|e| classify_sdk_error(&e))?;
        profiles.extend(page.instance_profiles().iter().cloned());
    }
    Ok(profiles)
}

async fn delete(client: &Client, name: String, roles: &[String]) -> Result<(), AwsError> {
    for role in roles {
        ignore_not_found(
            client
                .remove_role_from_instance_profile()
                .instance_profile_name(&name)
                .role_name(role)
                .send()
                .await,
        )?;
    }

    retry_throttled(&name, || async {
        client
            .delete_instance_profile()
            .instance_profile_name(&name)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| classify_sdk_error(&e))
    })
    .await
}

#[async_trait]
impl AwsResource for InstanceProfiles {
    fn resource_name(&self) -> &'static str {
        NAME
    }

    fn init(&mut self, ctx: &AwsContext) {
        self.client.bind(ctx.iam_client(), ctx.region());
    }

    // IAM mutations are throttled hard account-wide
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
        let profiles = list(client)
            .await
            .map_err(|e| NukeError::discovery(NAME, e))?;

        let mut candidates = Vec::with_capacity(profiles.len());
        for profile in &profiles {
            let tags = tags(client, profile.instance_profile_name())
                .await
                .map_err(|e| NukeError::discovery(NAME, e))?;
            candidates.push(candidate(profile, tags));
        }

        self.identifiers = discover(NAME, &candidates, filter)?;
        self.roles = profiles
            .iter()
            .map(|p| (p.instance_profile_name().to_string(), role_names(p)))
            .collect();
        Ok(self.identifiers.clone())
    }

    async fn nuke(&self, identifiers: &[String]) -> Vec<NukeResult> {
        let client = match self.client.for_delete(identifiers) {
            Ok(client) => client,
            Err(failed) => return failed,
        };
        nuke_each(NAME, identifiers, |name| {
            let roles = self.roles.get(&name).cloned().unwrap_or_default();
            async move { delete(client, name, &roles).await }
        })
        .await
    }
}
