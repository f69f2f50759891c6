//! Results writing and summary display
//!
//! This module handles writing the run's outcome to a JSON file and
//! printing per-region summary tables to stdout.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, ContentArrangement, Table};
use tracing::info;

use super::types::{AwsAccountResources, RegionResources};

/// Write the full outcome as pretty JSON
pub fn write_results(path: &Path, account: &AwsAccountResources) -> Result<()> {
    let json = serde_json::to_string_pretty(account).context("Failed to serialize results")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Results written");
    Ok(())
}

fn region_table(region: &RegionResources) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Resource type"),
            Cell::new("State"),
            Cell::new("Found"),
            Cell::new("Attempted"),
            Cell::new("Deleted"),
            Cell::new("Failed"),
        ]);

    for outcome in &region.outcomes {
        table.add_row(vec![
            Cell::new(&outcome.resource_type),
            Cell::new(outcome.state),
            Cell::new(outcome.discovered.len()),
            Cell::new(outcome.results.len()),
            Cell::new(outcome.deleted()),
            Cell::new(outcome.failed()),
        ]);
    }
    table
}

/// Print one summary table per visited region to stdout
pub fn print_summary(account: &AwsAccountResources) {
    let title = if account.dry_run {
        "Resources eligible for deletion"
    } else {
        "Deletion results"
    };
    println!("\n=== {title} ===");
    if let Some(account_id) = &account.account_id {
        println!("Account: {account_id}");
    }

    for region in account.regions.iter().filter(|r| !r.outcomes.is_empty()) {
        println!("\n{}", region.region);
        println!("{}", region_table(region));
    }

    let errors: Vec<_> = account
        .regions
        .iter()
        .flat_map(|r| {
            r.outcomes
                .iter()
                .filter_map(move |o| o.error.as_ref().map(|e| (r.region.as_str(), e)))
        })
        .collect();
    if !errors.is_empty() {
        println!("\nErrors:");
        for (region, error) in errors {
            println!("  [{region}] {error}");
        }
    }

    println!(
        "\nTotal: {} found, {} deleted, {} failed",
        account.total_found(),
        account.total_deleted(),
        account.total_failed()
    );
}
