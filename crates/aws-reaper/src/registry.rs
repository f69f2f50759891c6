//! Ordered catalog of resource adapters
//!
//! Catalog position is the deletion order within a region and encodes the
//! real dependencies between types: instances go before the volumes, security
//! groups and subnets they hold, attachments before the VPC, DHCP option sets
//! after the VPC that used them, instance profiles before the roles they wrap.
//! Getting the order wrong does not fault the engine; it shows up as "in use"
//! errors from AWS inside individual results.

use std::collections::HashSet;

use reaper_common::GLOBAL_REGION;
use thiserror::Error;

use crate::aws::AwsContext;
use crate::aws::resources::{
    Buckets, DhcpOptions, ElasticIps, InstanceProfiles, Instances, InternetGateways, KeyPairs,
    LogGroups, Roles, RouteTables, SecurityGroups, Subnets, Volumes, Vpcs,
};
use crate::resource::AwsResource;

/// Builds a fresh, unbound adapter
pub type Factory = Box<dyn Fn() -> Box<dyn AwsResource> + Send + Sync>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown resource type '{0}' (see `aws-reaper resource-types`)")]
    UnknownResourceType(String),
}

/// Whether a type lives in every region or once per account
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Scope {
    Global,
    Regional,
}

struct Entry {
    name: &'static str,
    factory: Factory,
}

pub struct ResourceRegistry {
    global: Vec<Entry>,
    regional: Vec<Entry>,
}

fn entry<R>(make: fn() -> R) -> Entry
where
    R: AwsResource + 'static,
{
    let name = make().resource_name();
    Entry {
        name,
        factory: Box::new(move || Box::new(make()) as Box<dyn AwsResource>),
    }
}

impl ResourceRegistry {
    /// Production catalog
    pub fn aws() -> Self {
        Self {
            global: vec![entry(InstanceProfiles::default), entry(Roles::default)],
            regional: vec![
                entry(Instances::default),
                entry(Volumes::default),
                entry(KeyPairs::default),
                entry(ElasticIps::default),
                entry(LogGroups::default),
                entry(Buckets::default),
                entry(SecurityGroups::default),
                entry(InternetGateways::default),
                entry(Subnets::default),
                entry(RouteTables::default),
                entry(Vpcs::default),
                entry(DhcpOptions::default),
            ],
        }
    }

    /// Catalog from explicit factories, in the given order
    pub fn from_factories(global: Vec<Factory>, regional: Vec<Factory>) -> Self {
        let named = |factories: Vec<Factory>| {
            factories
                .into_iter()
                .map(|factory| Entry {
                    name: factory().resource_name(),
                    factory,
                })
                .collect::<Vec<_>>()
        };
        Self {
            global: named(global),
            regional: named(regional),
        }
    }

    /// Every type name with its scope, in catalog order (regional first)
    pub fn resource_names(&self) -> Vec<(&'static str, Scope)> {
        self.regional
            .iter()
            .map(|e| (e.name, Scope::Regional))
            .chain(self.global.iter().map(|e| (e.name, Scope::Global)))
            .collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.regional.iter().chain(&self.global).any(|e| e.name == name)
    }

    /// Restrict the catalog; unknown names are rejected, order is kept.
    ///
    /// An empty `include` keeps every type; `exclude` always wins.
    pub fn with_selection(
        mut self,
        include: &[String],
        exclude: &[String],
    ) -> Result<Self, RegistryError> {
        if let Some(unknown) = include
            .iter()
            .chain(exclude)
            .find(|name| !self.contains(name))
        {
            return Err(RegistryError::UnknownResourceType(unknown.clone()));
        }

        let include: HashSet<&str> = include.iter().map(String::as_str).collect();
        let exclude: HashSet<&str> = exclude.iter().map(String::as_str).collect();
        let keep =
            |e: &Entry| (include.is_empty() || include.contains(e.name)) && !exclude.contains(e.name);

        self.regional.retain(keep);
        self.global.retain(keep);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.regional.is_empty() && self.global.is_empty()
    }

    pub fn has_global(&self) -> bool {
        !self.global.is_empty()
    }

    /// Fresh adapters for `region`, bound to `ctx`, in catalog order
    pub fn instantiate(&self, region: &str, ctx: &AwsContext) -> Vec<Box<dyn AwsResource>> {
        let catalog = if region == GLOBAL_REGION {
            &self.global
        } else {
            &self.regional
        };
        catalog
            .iter()
            .map(|e| {
                let mut adapter = (e.factory)();
                adapter.init(ctx);
                adapter
            })
            .collect()
    }
}
