//! S3 buckets
//!
//! `ListBuckets` is account-wide, so every regional instance lists all buckets
//! and keeps the ones located in its own region. A bucket must be empty
//! (including old versions and delete markers) before it can be deleted.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::BuildError;
use aws_sdk_s3::types::{Bucket, BucketLocationConstraint, Delete, ObjectIdentifier};
use reaper_common::tags::extract_tags;
use reaper_common::{CandidateResource, FilterRule, NukeResult};
use tracing::{debug, warn};

use super::to_utc;
use crate::aws::AwsContext;
use crate::aws::error::{AwsError, classify_sdk_error};
use crate::aws::retry::retry_throttled;
use crate::driver::nuke_each;
use crate::error::NukeError;
use crate::resource::{AwsResource, ResourceClient, discover};

const NAME: &str = "s3";

/// Upper bound of keys in one `DeleteObjects` request
const DELETE_OBJECTS_LIMIT: usize = 1000;

pub struct Buckets {
    client: ResourceClient<Client>,
    identifiers: Vec<String>,
}

impl Default for Buckets {
    fn default() -> Self {
        Self {
            client: ResourceClient::new(NAME),
            identifiers: Vec::new(),
        }
    }
}

/// Region a bucket lives in, from its location constraint.
///
/// An empty constraint means us-east-1; `EU` is the legacy name of eu-west-1.
fn bucket_region(constraint: Option<&BucketLocationConstraint>) -> String {
    match constraint.map(|c| c.as_str()) {
        None | Some("") => "us-east-1".to_string(),
        Some("EU") => "eu-west-1".to_string(),
        Some(other) => other.to_string(),
    }
}

fn candidate(bucket: &Bucket, tags: HashMap<String, String>) -> Option<CandidateResource> {
    Some(
        CandidateResource::new(bucket.name()?)
            .with_created_at(bucket.creation_date().and_then(to_utc))
            .with_tags(tags),
    )
}

async fn tags(client: &Client, bucket: &str) -> Result<HashMap<String, String>, AwsError> {
    match client.get_bucket_tagging().bucket(bucket).send().await {
        Ok(resp) => Ok(extract_tags(resp.tag_set(), |t| Some(t.key()), |t| Some(t.value()))),
        Err(e) => {
            let err = classify_sdk_error(&e);
            if err.code() == Some("NoSuchTagSet") {
                Ok(HashMap::new())
            } else {
                Err(err)
            }
        }
    }
}

/// Candidate for one listed bucket, or `None` when it lives elsewhere
async fn lookup(
    client: &Client,
    bucket: &Bucket,
    region: &str,
) -> Result<Option<CandidateResource>, AwsError> {
    let Some(name) = bucket.name() else {
        return Ok(None);
    };
    let location = client
        .get_bucket_location()
        .bucket(name)
        .send()
        .await
        .map_err(|e| classify_sdk_error(&e))?;
    if bucket_region(location.location_constraint()) != region {
        return Ok(None);
    }
    Ok(candidate(bucket, tags(client, name).await?))
}

/// A bucket whose lookup failed is left out; the rest of the listing stands
fn keep_looked_up(
    bucket: &str,
    looked_up: Result<Option<CandidateResource>, AwsError>,
) -> Option<CandidateResource> {
    match looked_up {
        Ok(candidate) => candidate,
        Err(e) => {
            warn!(bucket, error = %e, "Could not look up bucket, skipping");
            None
        }
    }
}

async fn list(client: &Client, region: &str) -> Result<Vec<CandidateResource>, AwsError> {
    let response = client
        .list_buckets()
        .send()
        .await
        .map_err(|e| classify_sdk_error(&e))?;

    let mut candidates = Vec::new();
    for bucket in response.buckets() {
        let looked_up = lookup(client, bucket, region).await;
        candidates.extend(keep_looked_up(bucket.name().unwrap_or_default(), looked_up));
    }
    Ok(candidates)
}

fn build_error(e: BuildError) -> AwsError {
    AwsError::Sdk {
        code: None,
        message: e.to_string(),
    }
}

/// Delete every object version and delete marker in the bucket
async fn empty_bucket(client: &Client, bucket: &str) -> Result<(), AwsError> {
    let mut key_marker: Option<String> = None;
    let mut version_marker: Option<String> = None;
    let mut removed = 0usize;

    loop {
        let page = client
            .list_object_versions()
            .bucket(bucket)
            .set_key_marker(key_marker.take())
            .set_version_id_marker(version_marker.take())
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        let versions = page.versions().iter().map(|v| (v.key(), v.version_id()));
        let markers = page
            .delete_markers()
            .iter()
            .map(|m| (m.key(), m.version_id()));

        let objects = versions
            .chain(markers)
            .filter_map(|(key, version)| {
                Some(
                    ObjectIdentifier::builder()
                        .key(key?)
                        .set_version_id(version.map(str::to_string))
                        .build()
                        .map_err(build_error),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        for chunk in objects.chunks(DELETE_OBJECTS_LIMIT) {
            let batch = Delete::builder()
                .set_objects(Some(chunk.to_vec()))
                .quiet(true)
                .build()
                .map_err(build_error)?;
            retry_throttled(bucket, || async {
                client
                    .delete_objects()
                    .bucket(bucket)
                    .delete(batch.clone())
                    .send()
                    .await
                    .map_err(|e| classify_sdk_error(&e))
            })
            .await?;
            removed += chunk.len();
        }

        if page.is_truncated() == Some(true) {
            key_marker = page.next_key_marker().map(str::to_string);
            version_marker = page.next_version_id_marker().map(str::to_string);
        } else {
            break;
        }
    }

    debug!(bucket, removed, "Emptied bucket");
    Ok(())
}

async fn delete(client: &Client, bucket: String) -> Result<(), AwsError> {
    empty_bucket(client, &bucket).await?;
    retry_throttled(&bucket, || async {
        client
            .delete_bucket()
            .bucket(&bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| classify_sdk_error(&e))
    })
    .await
}

#[async_trait]
impl AwsResource for Buckets {
    fn resource_name(&self) -> &'static str {
        NAME
    }

    fn init(&mut self, ctx: &AwsContext) {
        self.client.bind(ctx.s3_client(), ctx.region());
    }

    // Each bucket may hold many objects to page through
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
        let region = self.client.region().unwrap_or_default();
        let candidates = list(client, region)
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
        nuke_each(NAME, identifiers, |bucket| delete(client, bucket)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::primitives::DateTime;

    #[test]
    fn empty_location_is_us_east_1() {
        assert_eq!(bucket_region(None), "us-east-1");
        assert_eq!(
            bucket_region(Some(&BucketLocationConstraint::from(""))),
            "us-east-1"
        );
    }

    #[test]
    fn legacy_eu_location() {
        assert_eq!(
            bucket_region(Some(&BucketLocationConstraint::Eu)),
            "eu-west-1"
        );
    }

    #[test]
    fn regional_location() {
        assert_eq!(
            bucket_region(Some(&BucketLocationConstraint::UsWest2)),
            "us-west-2"
        );
    }

    #[test]
    fn bucket_candidate_carries_tags() {
        let bucket = Bucket::builder()
            .name("scratch-data")
            .creation_date(DateTime::from_secs(1_650_000_000))
            .build();
        let tags = HashMap::from([("aws-reaper-excluded".to_string(), "true".to_string())]);

        let c = candidate(&bucket, tags).unwrap();
        assert_eq!(c.identifier, "scratch-data");
        assert_eq!(c.tags.len(), 1);
        assert_eq!(c.created_at.unwrap().timestamp(), 1_650_000_000);
    }

    #[test]
    fn failed_lookup_skips_only_that_bucket() {
        let vanished = keep_looked_up(
            "gone-bucket",
            Err(AwsError::NotFound {
                code: "NoSuchBucket".into(),
                message: "The specified bucket does not exist".into(),
            }),
        );
        assert!(vanished.is_none());

        let denied = keep_looked_up(
            "locked-bucket",
            Err(AwsError::Sdk {
                code: Some("AccessDenied".into()),
                message: "Access Denied".into(),
            }),
        );
        assert!(denied.is_none());

        let kept = keep_looked_up("ok-bucket", Ok(Some(CandidateResource::new("ok-bucket"))));
        assert_eq!(kept.unwrap().identifier, "ok-bucket");
        assert!(keep_looked_up("elsewhere", Ok(None)).is_none());
    }
}
