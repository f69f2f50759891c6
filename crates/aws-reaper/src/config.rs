//! Configuration types for a nuke run
//!
//! Two sources: command-line flags (converted into [`RunConfig`]) and an
//! optional YAML filter file (loaded into [`FilterConfig`]):
//!
//! ```yaml
//! s3:
//!   include:
//!     names_regex: ["^scratch-"]
//!   exclude:
//!     names_regex: ["prod"]
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use reaper_common::FilterRule;
use serde::Deserialize;

use crate::registry::RegistryError;

/// Which regions and resource types to visit
#[derive(Debug, Clone, Default)]
pub struct TargetConfig {
    /// Regions to visit (empty: every enabled region)
    pub regions: Vec<String>,
    /// Regions to skip; `global` skips account-wide types
    pub exclude_regions: Vec<String>,
    /// Resource types to visit (empty: all)
    pub resource_types: Vec<String>,
    /// Resource types to skip
    pub exclude_resource_types: Vec<String>,
    /// AWS profile name (overrides default credential resolution)
    pub aws_profile: Option<String>,
}

/// Inputs to per-type filter rules
#[derive(Debug, Clone, Default)]
pub struct FilterSettings {
    /// Only resources at least this old are eligible
    pub min_age_hours: u64,
    /// YAML filter file
    pub config_file: Option<PathBuf>,
}

/// Runtime behavior flags
#[derive(Debug, Clone, Default)]
pub struct RuntimeFlags {
    /// List only, delete nothing
    pub dry_run: bool,
    /// Output JSON file path
    pub output: Option<PathBuf>,
}

/// Configuration for a nuke run
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub targets: TargetConfig,
    pub filters: FilterSettings,
    pub flags: RuntimeFlags,
}

impl FilterSettings {
    /// Creation-time cutoff relative to `now`
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let hours = i64::try_from(self.min_age_hours).unwrap_or(i64::MAX);
        Duration::try_hours(hours)
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Name patterns for one side of a rule
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NameMatchers {
    #[serde(default)]
    pub names_regex: Vec<String>,
}

/// Filter entry for one resource type
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TypeFilter {
    #[serde(default)]
    pub include: NameMatchers,
    #[serde(default)]
    pub exclude: NameMatchers,
}

/// Contents of the YAML filter file, keyed by resource type name
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct FilterConfig(BTreeMap<String, TypeFilter>);

impl FilterConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        // An empty file is an empty config, not a parse error
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Reject entries for resource types that do not exist
    pub fn validate<'a>(&self, known: impl IntoIterator<Item = &'a str>) -> Result<(), RegistryError> {
        let known: Vec<&str> = known.into_iter().collect();
        match self.0.keys().find(|k| !known.contains(&k.as_str())) {
            Some(unknown) => Err(RegistryError::UnknownResourceType(unknown.clone())),
            None => Ok(()),
        }
    }

    pub fn get(&self, resource_type: &str) -> Option<&TypeFilter> {
        self.0.get(resource_type)
    }
}

/// Filter rules for every resource type of one run
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    rules: HashMap<String, FilterRule>,
    cutoff: Option<DateTime<Utc>>,
}

impl FilterSet {
    pub fn new(config: &FilterConfig, cutoff: Option<DateTime<Utc>>) -> Self {
        let rules = config
            .0
            .iter()
            .map(|(name, f)| {
                let rule = FilterRule {
                    include_names: f.include.names_regex.clone(),
                    exclude_names: f.exclude.names_regex.clone(),
                    exclude_after: cutoff,
                };
                (name.clone(), rule)
            })
            .collect();
        Self { rules, cutoff }
    }

    /// Rule for a type; types absent from the file only get the cutoff
    pub fn rule_for(&self, resource_type: &str) -> FilterRule {
        self.rules
            .get(resource_type)
            .cloned()
            .unwrap_or_else(|| FilterRule {
                exclude_after: self.cutoff,
                ..Default::default()
            })
    }
}
