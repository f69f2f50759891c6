//! aws-reaper - discover and delete AWS resources across regions
//!
//! Each supported resource type is an adapter ([`resource::AwsResource`])
//! registered in a fixed, dependency-respecting order
//! ([`registry::ResourceRegistry`]). The [`orchestrator`] walks every targeted
//! region, then the account-wide types once, discovering and deleting one
//! type at a time through the batched [`driver`].

pub mod aws;
pub mod config;
pub mod driver;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod resource;
pub mod wait;

#[cfg(test)]
mod testing;
