//! Region discovery and targeting

use crate::aws::context::AwsContext;
use anyhow::{Context, Result};
use reaper_common::GLOBAL_REGION;
use tracing::debug;

/// List the regions enabled for this account.
pub async fn enabled_regions(ctx: &AwsContext) -> Result<Vec<String>> {
    let response = ctx
        .ec2_client()
        .describe_regions()
        .send()
        .await
        .context("Failed to describe regions")?;

    let mut regions: Vec<String> = response
        .regions()
        .iter()
        .filter_map(|r| r.region_name())
        .map(str::to_string)
        .collect();
    regions.sort();

    debug!(count = regions.len(), "Enabled regions");
    Ok(regions)
}

/// Regions a run should visit, in visiting order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRegions {
    /// Real regions, visited first
    pub regional: Vec<String>,
    /// Whether the global pseudo-region is visited (once, after all regions)
    pub include_global: bool,
}

impl TargetRegions {
    /// Every region name the orchestrator will visit, global last.
    pub fn all(&self) -> Vec<String> {
        let mut all = self.regional.clone();
        if self.include_global {
            all.push(GLOBAL_REGION.to_string());
        }
        all
    }
}

/// Narrow the enabled regions by the user's include/exclude lists.
///
/// An empty include list means every enabled region. The global pseudo-region
/// is visited unless explicitly excluded, or unless the include list names
/// real regions only.
pub fn select_regions(
    enabled: &[String],
    include: &[String],
    exclude: &[String],
) -> Result<TargetRegions> {
    for region in include.iter().chain(exclude) {
        if region != GLOBAL_REGION && !enabled.contains(region) {
            anyhow::bail!(
                "Region '{}' is not enabled for this account (enabled: {})",
                region,
                enabled.join(", ")
            );
        }
    }

    let regional = enabled
        .iter()
        .filter(|r| include.is_empty() || include.contains(r))
        .filter(|r| !exclude.contains(r))
        .cloned()
        .collect();

    let global = GLOBAL_REGION.to_string();
    let include_global =
        (include.is_empty() || include.contains(&global)) && !exclude.contains(&global);

    Ok(TargetRegions {
        regional,
        include_global,
    })
}
