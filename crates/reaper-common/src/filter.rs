//! Discovery filtering policy
//!
//! Decides which discovered resources are eligible for deletion. The policy is
//! pure: it never touches the network, and it is defined for every candidate,
//! including those without a known creation time.
//!
//! A candidate is eligible when all of the following hold:
//! - it is not in a terminal/deleting state and does not carry the exclusion tag
//! - the include set is empty, or its name matches some include pattern
//! - its name matches no exclude pattern (exclusion wins over inclusion)
//! - it has no known creation time, or that time is not after the cutoff

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;

use crate::tags;

/// Errors raised while turning a [`FilterRule`] into a [`CompiledFilter`]
#[derive(Debug, Error)]
pub enum FilterError {
    /// A name pattern is not a valid regular expression
    #[error("invalid name pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// User-supplied inclusion/exclusion rule for one resource type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterRule {
    /// Regular expressions; when non-empty, a name must match at least one
    pub include_names: Vec<String>,
    /// Regular expressions; a name matching any of them is never eligible
    pub exclude_names: Vec<String>,
    /// Resources created after this instant are not eligible
    pub exclude_after: Option<DateTime<Utc>>,
}

impl FilterRule {
    /// Rule that only applies a time cutoff
    pub fn older_than(cutoff: DateTime<Utc>) -> Self {
        Self {
            exclude_after: Some(cutoff),
            ..Default::default()
        }
    }

    /// Compile the name patterns.
    ///
    /// Fails on the first malformed pattern so a typo never silently widens
    /// what gets deleted.
    pub fn compile(&self) -> Result<CompiledFilter, FilterError> {
        Ok(CompiledFilter {
            include: compile_patterns(&self.include_names)?,
            exclude: compile_patterns(&self.exclude_names)?,
            exclude_after: self.exclude_after,
        })
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, FilterError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|source| FilterError::InvalidPattern {
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}

/// Lifecycle state of a candidate as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ResourceState {
    #[default]
    Active,
    /// Already terminated or being deleted; never worth another delete call
    Terminal,
}

/// A discovered resource, before filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateResource {
    /// Provider identifier, the unit of uniqueness
    pub identifier: String,
    /// Display name; the identifier is used when absent
    pub name: Option<String>,
    /// Creation time, or a synthesized first-seen time
    pub created_at: Option<DateTime<Utc>>,
    pub state: ResourceState,
    pub tags: HashMap<String, String>,
}

impl CandidateResource {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: None,
            created_at: None,
            state: ResourceState::Active,
            tags: HashMap::new(),
        }
    }

    pub fn with_name(mut self, name: Option<impl Into<String>>) -> Self {
        self.name = name.map(Into::into);
        self
    }

    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_state(mut self, state: ResourceState) -> Self {
        self.state = state;
        self
    }

    /// Attach tags; a `Name` tag also becomes the display name unless one is set
    pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
        if self.name.is_none() {
            self.name = tags.get("Name").cloned();
        }
        self.tags = tags;
        self
    }

    /// Name used for pattern matching
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.identifier)
    }
}

/// Outcome of evaluating one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Eligibility {
    Eligible,
    Terminal,
    ExcludedByTag,
    NotIncluded,
    ExcludedByName,
    TooNew,
}

/// A [`FilterRule`] with its patterns compiled
#[derive(Debug, Clone, Default)]
pub struct CompiledFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    exclude_after: Option<DateTime<Utc>>,
}

impl CompiledFilter {
    /// Filter that admits every active candidate
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Evaluate a candidate, reporting the first reason it is rejected
    pub fn evaluate(&self, candidate: &CandidateResource) -> Eligibility {
        if candidate.state == ResourceState::Terminal {
            return Eligibility::Terminal;
        }
        if tags::is_excluded(&candidate.tags) {
            return Eligibility::ExcludedByTag;
        }

        let name = candidate.display_name();
        if self.exclude.iter().any(|re| re.is_match(name)) {
            return Eligibility::ExcludedByName;
        }
        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(name)) {
            return Eligibility::NotIncluded;
        }

        match (self.exclude_after, candidate.created_at) {
            (Some(cutoff), Some(created)) if created > cutoff => Eligibility::TooNew,
            _ => Eligibility::Eligible,
        }
    }

    pub fn is_eligible(&self, candidate: &CandidateResource) -> bool {
        self.evaluate(candidate) == Eligibility::Eligible
    }

    /// Eligible identifiers in discovery order.
    ///
    /// Duplicate identifiers collapse to their first occurrence; candidates
    /// sharing a name but not an identifier stay independent.
    pub fn eligible_identifiers(&self, candidates: &[CandidateResource]) -> Vec<String> {
        let mut seen = HashSet::new();
        candidates
            .iter()
            .filter(|c| self.is_eligible(c))
            .filter(|c| seen.insert(c.identifier.as_str()))
            .map(|c| c.identifier.clone())
            .collect()
    }
}
