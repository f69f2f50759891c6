//! VPC route tables
//!
//! A VPC's main route table goes away with the VPC and is never listed. Subnet
//! associations are removed before a table is deleted.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::types::RouteTable;
use reaper_common::{CandidateResource, FilterRule, NukeResult};

use super::{ec2_first_seen, ec2_tags};
use crate::aws::AwsContext;
use crate::aws::error::{AwsError, classify_sdk_error};
use crate::aws::retry::{RetryPolicy, retry_aws, retry_throttled};
use crate::driver::nuke_each;
use crate::error::NukeError;
use crate::resource::{AwsResource, ResourceClient, discover};

const NAME: &str = "ec2-route-table";

pub struct RouteTables {
    client: ResourceClient<Client>,
    identifiers: Vec<String>,
    /// Route table ID -> association IDs to remove first
    associations: HashMap<String, Vec<String>>,
}

impl Default for RouteTables {
    fn default() -> Self {
        Self {
            client: ResourceClient::new(NAME),
            identifiers: Vec::new(),
            associations: HashMap::new(),
        }
    }
}

fn is_main(table: &RouteTable) -> bool {
    table.associations().iter().any(|a| a.main() == Some(true))
}

fn association_ids(table: &RouteTable) -> Vec<String> {
    table
        .associations()
        .iter()
        .filter(|a| a.main() != Some(true))
        .filter_map(|a| a.route_table_association_id().map(str::to_string))
        .collect()
}

fn candidate(table: &RouteTable) -> Option<CandidateResource> {
    if is_main(table) {
        return None;
    }
    Some(CandidateResource::new(table.route_table_id()?).with_tags(ec2_tags(table.tags())))
}

async fn list(client: &Client) -> Result<Vec<RouteTable>, AwsError> {
    let mut tables = Vec::new();
    let mut pages = client.describe_route_tables().into_paginator().send();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|e| classify_sdk_error(&e))?;
        tables.extend(page.route_tables().iter().cloned());
    }
    Ok(tables)
}

async fn delete(client: &Client, id: String, associations: &[String]) -> Result<(), AwsError> {
    for association in associations {
        let result = retry_throttled(&id, || async {
            client
                .disassociate_route_table()
                .association_id(association)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| classify_sdk_error(&e))
        })
        .await;
        match result {
            Err(e) if !e.is_not_found() && e.code() != Some("InvalidAssociationID.NotFound") => {
                return Err(e);
            }
            _ => {}
        }
    }

    retry_aws(&id, RetryPolicy::DEPENDENCY, || async {
        client
            .delete_route_table()
            .route_table_id(&id)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| classify_sdk_error(&e))
    })
    .await
}

#[async_trait]
impl AwsResource for RouteTables {
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
        let tables = list(client)
            .await
            .map_err(|e| NukeError::discovery(NAME, e))?;

        let candidates = tables.iter().filter_map(candidate).collect();
        let candidates = ec2_first_seen(client, candidates).await;
        self.identifiers = discover(NAME, &candidates, filter)?;
        self.associations = tables
            .iter()
            .filter_map(|t| Some((t.route_table_id()?.to_string(), association_ids(t))))
            .collect();
        Ok(self.identifiers.clone())
    }

    async fn nuke(&self, identifiers: &[String]) -> Vec<NukeResult> {
        let client = match self.client.for_delete(identifiers) {
            Ok(client) => client,
            Err(failed) => return failed,
        };
        nuke_each(NAME, identifiers, |id| {
            let associations = self.associations.get(&id).cloned().unwrap_or_default();
            async move { delete(client, id, &associations).await }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ec2::types::RouteTableAssociation;

    fn association(id: &str, main: bool) -> RouteTableAssociation {
        RouteTableAssociation::builder()
            .route_table_association_id(id)
            .main(main)
            .build()
    }

    #[test]
    fn main_table_is_not_a_candidate() {
        let table = RouteTable::builder()
            .route_table_id("rtb-main")
            .associations(association("rtbassoc-0", true))
            .build();
        assert!(candidate(&table).is_none());
    }

    #[test]
    fn subnet_associations_are_recorded() {
        let table = RouteTable::builder()
            .route_table_id("rtb-1")
            .associations(association("rtbassoc-1", false))
            .associations(association("rtbassoc-2", false))
            .build();
        assert!(candidate(&table).is_some());
        assert_eq!(association_ids(&table), vec!["rtbassoc-1", "rtbassoc-2"]);
    }
}
