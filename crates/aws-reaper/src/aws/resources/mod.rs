//! AWS resource adapters
//!
//! One module per resource type. Each adapter does a single list call family
//! for discovery and a single delete call family for deletion; anything else
//! (detaching, emptying, revoking) is a precondition of its delete.
//!
//! EIPs and the VPC networking types report no creation time. They age from
//! a first-seen tag written the first time they are listed
//! ([`settle_first_seen`]).
//!
//! | Name | Scope | Delete |
//! |------|-------|--------|
//! | `ec2` | regional | bulk terminate, then wait |
//! | `ebs` | regional | per volume |
//! | `ec2-keypairs` | regional | per key pair |
//! | `eip` | regional | per allocation |
//! | `cloudwatch-loggroup` | regional | per log group |
//! | `s3` | regional | empty, then delete |
//! | `security-group` | regional | revoke rules, then delete |
//! | `internet-gateway` | regional | detach, then delete |
//! | `ec2-subnet` | regional | per subnet |
//! | `ec2-route-table` | regional | disassociate, then delete |
//! | `vpc` | regional | per VPC |
//! | `ec2-dhcp-option` | regional | per option set |
//! | `iam-instance-profile` | global | remove roles, then delete |
//! | `iam-role` | global | strip policies and profiles, then delete |

pub mod cloudwatch_loggroup;
pub mod dhcp_option;
pub mod ebs;
pub mod ec2;
pub mod eip;
pub mod iam_instance_profile;
pub mod iam_role;
pub mod internet_gateway;
pub mod keypair;
pub mod route_table;
pub mod s3;
pub mod security_group;
pub mod subnet;
pub mod vpc;

pub use cloudwatch_loggroup::LogGroups;
pub use dhcp_option::DhcpOptions;
pub use ebs::Volumes;
pub use ec2::Instances;
pub use eip::ElasticIps;
pub use iam_instance_profile::InstanceProfiles;
pub use iam_role::Roles;
pub use internet_gateway::InternetGateways;
pub use keypair::KeyPairs;
pub use route_table::RouteTables;
pub use s3::Buckets;
pub use security_group::SecurityGroups;
pub use subnet::Subnets;
pub use vpc::Vpcs;

use std::collections::{HashMap, HashSet};
use std::future::Future;

use aws_sdk_ec2::primitives::DateTime as AwsDateTime;
use aws_sdk_ec2::types::{Filter, Tag};
use chrono::{DateTime, Utc};
use reaper_common::CandidateResource;
use reaper_common::tags::{self, TAG_FIRST_SEEN, extract_tags};
use tracing::warn;

use crate::aws::error::{AwsError, classify_sdk_error};

/// Tag map of an EC2 resource
pub(crate) fn ec2_tags(tags: &[aws_sdk_ec2::types::Tag]) -> HashMap<String, String> {
    extract_tags(tags, |t| t.key(), |t| t.value())
}

/// Convert an SDK timestamp, shared by every service crate
pub(crate) fn to_utc(time: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.secs(), time.subsec_nanos())
}

/// Write the first-seen tag on any EC2 resource ID
pub(crate) async fn tag_first_seen(
    client: &aws_sdk_ec2::Client,
    id: String,
    now: DateTime<Utc>,
) -> Result<(), AwsError> {
    client
        .create_tags()
        .resources(id)
        .tags(
            Tag::builder()
                .key(TAG_FIRST_SEEN)
                .value(tags::format_first_seen(now))
                .build(),
        )
        .send()
        .await
        .map(|_| ())
        .map_err(|e| classify_sdk_error(&e))
}

/// Settle creation times for resources whose API reports none
///
/// A candidate carrying [`TAG_FIRST_SEEN`] ages from the tag. Any other is
/// tagged through `tag` and ages from `now`. A candidate whose tag write fails
/// is dropped from this run, since its age cannot be established.
pub(crate) async fn settle_first_seen<F, Fut>(
    candidates: Vec<CandidateResource>,
    now: DateTime<Utc>,
    mut tag: F,
) -> Vec<CandidateResource>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<(), AwsError>>,
{
    let mut settled = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if let Some(seen) = tags::first_seen(&candidate.tags) {
            settled.push(candidate.with_created_at(Some(seen)));
            continue;
        }
        match tag(candidate.identifier.clone()).await {
            Ok(()) => settled.push(candidate.with_created_at(Some(now))),
            Err(e) => warn!(
                id = %candidate.identifier,
                error = %e,
                "Could not record first-seen time, skipping"
            ),
        }
    }
    settled
}

/// [`settle_first_seen`] with the tag written by EC2 `CreateTags`
pub(crate) async fn ec2_first_seen(
    client: &aws_sdk_ec2::Client,
    candidates: Vec<CandidateResource>,
) -> Vec<CandidateResource> {
    let now = Utc::now();
    settle_first_seen(candidates, now, |id| tag_first_seen(client, id, now)).await
}

/// IDs of the default VPC(s), whose networking is never touched
pub(crate) async fn default_vpc_ids(
    client: &aws_sdk_ec2::Client,
) -> Result<HashSet<String>, AwsError> {
    let response = client
        .describe_vpcs()
        .filters(Filter::builder().name("is-default").values("true").build())
        .send()
        .await
        .map_err(|e| classify_sdk_error(&e))?;

    Ok(response
        .vpcs()
        .iter()
        .filter_map(|v| v.vpc_id().map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reaper_common::FilterRule;

    #[test]
    fn converts_sdk_timestamps() {
        let time = AwsDateTime::from_secs(1_700_000_000);
        assert_eq!(to_utc(&time).unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn collects_ec2_tags() {
        let tags = vec![
            aws_sdk_ec2::types::Tag::builder()
                .key("Name")
                .value("web")
                .build(),
            aws_sdk_ec2::types::Tag::builder().key("orphan").build(),
        ];
        let map = ec2_tags(&tags);
        assert_eq!(map.len(), 1);
        assert_eq!(map["Name"], "web");
    }

    fn seen_tag(time: DateTime<Utc>) -> HashMap<String, String> {
        HashMap::from([(TAG_FIRST_SEEN.to_string(), tags::format_first_seen(time))])
    }

    #[tokio::test]
    async fn tagged_resource_ages_from_its_tag() {
        let seen = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut written = Vec::new();

        let settled = settle_first_seen(
            vec![CandidateResource::new("vpc-old").with_tags(seen_tag(seen))],
            now,
            |id| {
                written.push(id);
                async { Ok(()) }
            },
        )
        .await;

        assert!(written.is_empty());
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].created_at, Some(seen));
    }

    #[tokio::test]
    async fn untagged_resource_is_tagged_and_ages_from_now() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut written = Vec::new();

        let settled = settle_first_seen(vec![CandidateResource::new("subnet-new")], now, |id| {
            written.push(id);
            async { Ok(()) }
        })
        .await;

        assert_eq!(written, vec!["subnet-new"]);
        assert_eq!(settled[0].identifier, "subnet-new");
        assert_eq!(settled[0].created_at, Some(now));
    }

    #[tokio::test]
    async fn failed_tag_write_skips_the_resource() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let candidates = vec![
            CandidateResource::new("sg-denied"),
            CandidateResource::new("sg-ok"),
        ];

        let settled = settle_first_seen(candidates, now, |id| async move {
            if id == "sg-denied" {
                Err(AwsError::Sdk {
                    code: Some("UnauthorizedOperation".into()),
                    message: "not allowed".into(),
                })
            } else {
                Ok(())
            }
        })
        .await;

        let ids: Vec<_> = settled.iter().map(|c| c.identifier.as_str()).collect();
        assert_eq!(ids, vec!["sg-ok"]);
    }

    #[tokio::test]
    async fn fresh_resource_is_not_old_enough() {
        let now = Utc::now();
        let settled = settle_first_seen(vec![CandidateResource::new("subnet-fresh")], now, |_| {
            async { Ok(()) }
        })
        .await;

        let filter = FilterRule::older_than(now - chrono::Duration::hours(24))
            .compile()
            .unwrap();
        assert!(!filter.is_eligible(&settled[0]));
    }
}
