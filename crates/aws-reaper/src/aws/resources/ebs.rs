//! EBS volumes

use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::types::{Volume, VolumeState};
use reaper_common::{CandidateResource, FilterRule, NukeResult, ResourceState};

use super::{ec2_tags, to_utc};
use crate::aws::AwsContext;
use crate::aws::error::{AwsError, classify_sdk_error};
use crate::aws::retry::retry_throttled;
use crate::driver::nuke_each;
use crate::error::NukeError;
use crate::resource::{AwsResource, ResourceClient, discover};

const NAME: &str = "ebs";

pub struct Volumes {
    client: ResourceClient<Client>,
    identifiers: Vec<String>,
}

impl Default for Volumes {
    fn default() -> Self {
        Self {
            client: ResourceClient::new(NAME),
            identifiers: Vec::new(),
        }
    }
}

fn candidate(volume: &Volume) -> Option<CandidateResource> {
    let state = match volume.state() {
        Some(VolumeState::Deleting | VolumeState::Deleted) => ResourceState::Terminal,
        _ => ResourceState::Active,
    };
    Some(
        CandidateResource::new(volume.volume_id()?)
            .with_created_at(volume.create_time().and_then(to_utc))
            .with_tags(ec2_tags(volume.tags()))
            .with_state(state),
    )
}

async fn list(client: &Client) -> Result<Vec<CandidateResource>, AwsError> {
    let mut candidates = Vec::new();
    let mut pages = client.describe_volumes().into_paginator().send();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|e| classify_sdk_error(&e))?;
        candidates.extend(page.volumes().iter().filter_map(candidate));
    }
    Ok(candidates)
}

async fn delete(client: &Client, id: String) -> Result<(), AwsError> {
    retry_throttled(&id, || async {
        client
            .delete_volume()
            .volume_id(&id)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| classify_sdk_error(&e))
    })
    .await
}

#[async_trait]
impl AwsResource for Volumes {
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

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ec2::types::Tag;

    #[test]
    fn deleting_volumes_are_terminal() {
        let volume = Volume::builder()
            .volume_id("vol-1")
            .state(VolumeState::Deleting)
            .build();
        assert_eq!(candidate(&volume).unwrap().state, ResourceState::Terminal);
    }

    #[test]
    fn name_comes_from_name_tag() {
        let volume = Volume::builder()
            .volume_id("vol-2")
            .state(VolumeState::Available)
            .tags(Tag::builder().key("Name").value("scratch").build())
            .build();
        let c = candidate(&volume).unwrap();
        assert_eq!(c.display_name(), "scratch");
        assert_eq!(c.state, ResourceState::Active);
    }
}
