//! Elastic IP addresses
//!
//! Addresses have no creation time and age from their first-seen tag, see
//! [`super::settle_first_seen`].

use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::types::Address;
use reaper_common::{CandidateResource, FilterRule, NukeResult};

use super::{ec2_first_seen, ec2_tags};
use crate::aws::AwsContext;
use crate::aws::error::{AwsError, classify_sdk_error};
use crate::aws::retry::retry_throttled;
use crate::driver::nuke_each;
use crate::error::NukeError;
use crate::resource::{AwsResource, ResourceClient, discover};

const NAME: &str = "eip";

pub struct ElasticIps {
    client: ResourceClient<Client>,
    identifiers: Vec<String>,
}

impl Default for ElasticIps {
    fn default() -> Self {
        Self {
            client: ResourceClient::new(NAME),
            identifiers: Vec::new(),
        }
    }
}

fn candidate(address: &Address) -> Option<CandidateResource> {
    Some(
        CandidateResource::new(address.allocation_id()?)
            .with_name(address.public_ip())
            .with_tags(ec2_tags(address.tags())),
    )
}

async fn list(client: &Client) -> Result<Vec<CandidateResource>, AwsError> {
    let response = client
        .describe_addresses()
        .send()
        .await
        .map_err(|e| classify_sdk_error(&e))?;

    let candidates = response.addresses().iter().filter_map(candidate).collect();
    Ok(ec2_first_seen(client, candidates).await)
}

async fn release(client: &Client, id: String) -> Result<(), AwsError> {
    retry_throttled(&id, || async {
        client
            .release_address()
            .allocation_id(&id)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| classify_sdk_error(&e))
    })
    .await
}

#[async_trait]
impl AwsResource for ElasticIps {
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
        nuke_each(NAME, identifiers, |id| release(client, id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_named_by_public_ip() {
        let address = Address::builder()
            .allocation_id("eipalloc-1")
            .public_ip("203.0.113.7")
            .build();

        let candidate = candidate(&address).unwrap();
        assert_eq!(candidate.identifier, "eipalloc-1");
        assert!(candidate.created_at.is_none());
        assert_eq!(candidate.display_name(), "203.0.113.7");
    }

    #[test]
    fn classic_address_without_allocation_is_skipped() {
        let address = Address::builder().public_ip("198.51.100.1").build();
        assert!(candidate(&address).is_none());
    }
}
