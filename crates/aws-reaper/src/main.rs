//! aws-reaper: find and delete AWS resources across every enabled region
//!
//! `inspect` lists what would be deleted; `nuke` lists too unless given
//! `--execute`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, ContentArrangement, Table};
use reaper_common::defaults::{DEFAULT_BOOTSTRAP_REGION, DEFAULT_MIN_AGE_HOURS};
use tracing::{info, warn};

use aws_reaper::aws::{AwsContext, enabled_regions, get_current_account_id, select_regions};
use aws_reaper::config::{self, FilterConfig, FilterSet};
use aws_reaper::orchestrator::{self, LogReporter, Orchestrator};
use aws_reaper::registry::ResourceRegistry;

#[derive(Parser, Debug)]
#[command(name = "aws-reaper")]
#[command(about = "Discover and delete AWS resources across regions")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

/// Targeting and filtering shared by `nuke` and `inspect`
#[derive(clap::Args, Debug)]
struct TargetArgs {
    /// Region to visit (repeatable; default: every enabled region)
    #[arg(long = "region")]
    regions: Vec<String>,

    /// Region to skip (repeatable); `global` skips account-wide types
    #[arg(long = "exclude-region")]
    exclude_regions: Vec<String>,

    /// Resource type to visit (repeatable; default: all)
    #[arg(long = "resource-type")]
    resource_types: Vec<String>,

    /// Resource type to skip (repeatable)
    #[arg(long = "exclude-resource-type")]
    exclude_resource_types: Vec<String>,

    /// Only resources created at least this many hours ago are eligible
    #[arg(long, default_value_t = DEFAULT_MIN_AGE_HOURS)]
    min_age_hours: u64,

    /// YAML file with per-type name filters
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output JSON file for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// AWS profile to use (overrides AWS_PROFILE env var)
    #[arg(long)]
    aws_profile: Option<String>,
}

#[derive(clap::Args, Debug)]
struct NukeArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Actually delete resources (default is dry-run)
    #[arg(long)]
    execute: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Delete eligible resources
    Nuke(Box<NukeArgs>),

    /// List eligible resources without deleting anything
    Inspect(Box<TargetArgs>),

    /// List supported resource types in deletion order
    ResourceTypes,
}

impl TargetArgs {
    fn into_config(self, dry_run: bool) -> config::RunConfig {
        config::RunConfig {
            targets: config::TargetConfig {
                regions: self.regions,
                exclude_regions: self.exclude_regions,
                resource_types: self.resource_types,
                exclude_resource_types: self.exclude_resource_types,
                aws_profile: self.aws_profile,
            },
            filters: config::FilterSettings {
                min_age_hours: self.min_age_hours,
                config_file: self.config,
            },
            flags: config::RuntimeFlags {
                dry_run,
                output: self.output,
            },
        }
    }
}

impl From<NukeArgs> for config::RunConfig {
    fn from(args: NukeArgs) -> Self {
        args.target.into_config(!args.execute)
    }
}

impl From<TargetArgs> for config::RunConfig {
    fn from(args: TargetArgs) -> Self {
        args.into_config(true)
    }
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            print_error(&e);
            std::process::exit(1);
        }
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

fn init_tracing() -> Result<()> {
    // AWS SDK crates are chatty at info
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        .add_directive("aws_config=warn".parse()?)
        .add_directive("aws_sdk=warn".parse()?)
        .add_directive("aws_smithy=warn".parse()?);

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Returns `Ok(false)` when the run finished but some resource type failed
async fn run() -> Result<bool> {
    let args = Args::parse();
    init_tracing()?;

    match args.command {
        Command::Nuke(nuke_args) => handle_run((*nuke_args).into()).await,
        Command::Inspect(target_args) => handle_run((*target_args).into()).await,
        Command::ResourceTypes => {
            print_resource_types(&ResourceRegistry::aws());
            Ok(true)
        }
    }
}

fn print_resource_types(registry: &ResourceRegistry) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![Cell::new("Order"), Cell::new("Resource type"), Cell::new("Scope")]);

    for (position, (name, scope)) in registry.resource_names().into_iter().enumerate() {
        table.add_row(vec![Cell::new(position + 1), Cell::new(name), Cell::new(scope)]);
    }
    println!("{table}");
}

async fn handle_run(config: config::RunConfig) -> Result<bool> {
    let targets = &config.targets;
    if let Some(profile) = &targets.aws_profile {
        info!(profile = %profile, "Using AWS profile");
    }

    // Catalog and filter file are checked before any AWS call
    let registry = ResourceRegistry::aws()
        .with_selection(&targets.resource_types, &targets.exclude_resource_types)?;
    if registry.is_empty() {
        anyhow::bail!("No resource types selected");
    }

    let filter_config = match &config.filters.config_file {
        Some(path) => {
            let loaded = FilterConfig::load(path)?;
            let known = ResourceRegistry::aws().resource_names();
            loaded
                .validate(known.iter().map(|(name, _)| *name))
                .with_context(|| format!("Invalid filter file {}", path.display()))?;
            loaded
        }
        None => FilterConfig::default(),
    };
    let cutoff = config.filters.cutoff(Utc::now());
    let filters = FilterSet::new(&filter_config, Some(cutoff));

    let bootstrap_region = targets
        .regions
        .iter()
        .find(|r| r.as_str() != reaper_common::GLOBAL_REGION)
        .map(String::as_str)
        .unwrap_or(DEFAULT_BOOTSTRAP_REGION);
    let ctx = AwsContext::new(bootstrap_region, targets.aws_profile.as_deref()).await;

    let account_id = get_current_account_id(&ctx).await?;
    let enabled = enabled_regions(&ctx).await?;
    let regions = select_regions(&enabled, &targets.regions, &targets.exclude_regions)?;

    let dry_run = config.flags.dry_run;
    if dry_run {
        info!("Dry run: nothing will be deleted (pass --execute to delete)");
    } else {
        warn!(account_id = %account_id, "Deleting eligible resources");
    }

    let orchestrator = Orchestrator::new(registry, filters, Arc::new(LogReporter::new()), dry_run);
    let account = orchestrator
        .run(&ctx, &regions, Some(account_id.to_string()))
        .await;

    orchestrator::print_summary(&account);
    if let Some(path) = &config.flags.output {
        orchestrator::write_results(path, &account)?;
    }

    Ok(!account.has_errors())
}
