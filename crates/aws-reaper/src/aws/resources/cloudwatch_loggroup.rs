//! CloudWatch Logs log groups

use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::Client;
use aws_sdk_cloudwatchlogs::types::LogGroup;
use chrono::DateTime;
use reaper_common::{CandidateResource, FilterRule, NukeResult};

use crate::aws::AwsContext;
use crate::aws::error::{AwsError, classify_sdk_error};
use crate::aws::retry::retry_throttled;
use crate::driver::nuke_each;
use crate::error::NukeError;
use crate::resource::{AwsResource, ResourceClient, discover};

const NAME: &str = "cloudwatch-loggroup";

pub struct LogGroups {
    client: ResourceClient<Client>,
    identifiers: Vec<String>,
}

impl Default for LogGroups {
    fn default() -> Self {
        Self {
            client: ResourceClient::new(NAME),
            identifiers: Vec::new(),
        }
    }
}

fn candidate(group: &LogGroup) -> Option<CandidateResource> {
    Some(
        CandidateResource::new(group.log_group_name()?)
            .with_created_at(group.creation_time().and_then(DateTime::from_timestamp_millis)),
    )
}

async fn list(client: &Client) -> Result<Vec<CandidateResource>, AwsError> {
    let mut candidates = Vec::new();
    let mut pages = client.describe_log_groups().into_paginator().send();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|e| classify_sdk_error(&e))?;
        candidates.extend(page.log_groups().iter().filter_map(candidate));
    }
    Ok(candidates)
}

async fn delete(client: &Client, name: String) -> Result<(), AwsError> {
    retry_throttled(&name, || async {
        client
            .delete_log_group()
            .log_group_name(&name)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| classify_sdk_error(&e))
    })
    .await
}

#[async_trait]
impl AwsResource for LogGroups {
    fn resource_name(&self) -> &'static str {
        NAME
    }

    fn init(&mut self, ctx: &AwsContext) {
        self.client.bind(ctx.logs_client(), ctx.region());
    }

    // DeleteLogGroup allows only a few calls per second per account
    fn max_batch_size(&self) -> usize {
        10
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
        nuke_each(NAME, identifiers, |name| delete(client, name)).await
    }
}
