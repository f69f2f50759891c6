//! EC2 key pairs

use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::types::KeyPairInfo;
use reaper_common::{CandidateResource, FilterRule, NukeResult};

use super::{ec2_tags, to_utc};
use crate::aws::AwsContext;
use crate::aws::error::{AwsError, classify_sdk_error};
use crate::aws::retry::retry_throttled;
use crate::driver::nuke_each;
use crate::error::NukeError;
use crate::resource::{AwsResource, ResourceClient, discover};

const NAME: &str = "ec2-keypairs";

pub struct KeyPairs {
    client: ResourceClient<Client>,
    identifiers: Vec<String>,
}

impl Default for KeyPairs {
    fn default() -> Self {
        Self {
            client: ResourceClient::new(NAME),
            identifiers: Vec::new(),
        }
    }
}

fn candidate(key_pair: &KeyPairInfo) -> Option<CandidateResource> {
    let id = key_pair.key_pair_id()?;
    Some(
        CandidateResource::new(id)
            .with_name(key_pair.key_name())
            .with_created_at(key_pair.create_time().and_then(to_utc))
            .with_tags(ec2_tags(key_pair.tags())),
    )
}

async fn list(client: &Client) -> Result<Vec<CandidateResource>, AwsError> {
    let response = client
        .describe_key_pairs()
        .send()
        .await
        .map_err(|e| classify_sdk_error(&e))?;
    Ok(response.key_pairs().iter().filter_map(candidate).collect())
}

async fn delete(client: &Client, id: String) -> Result<(), AwsError> {
    retry_throttled(&id, || async {
        client
            .delete_key_pair()
            .key_pair_id(&id)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| classify_sdk_error(&e))
    })
    .await
}

#[async_trait]
impl AwsResource for KeyPairs {
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
