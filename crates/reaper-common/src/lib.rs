//! reaper-common - Shared types and utilities
//!
//! This crate provides the pure parts of the nuke engine, without any AWS SDK
//! dependencies, so they can be tested in isolation.
//!
//! ## Modules
//!
//! - [`batch`]: Splitting identifier lists into size-bounded batches
//! - [`defaults`]: Default configuration values
//! - [`filter`]: Inclusion/exclusion/time eligibility policy
//! - [`result`]: Per-identifier deletion outcome
//! - [`tags`]: Tag keys the engine reads and writes

pub mod batch;
pub mod defaults;
pub mod filter;
pub mod result;
pub mod tags;

// Re-export commonly used types
pub use batch::split;
pub use filter::{
    CandidateResource, CompiledFilter, Eligibility, FilterError, FilterRule, ResourceState,
};
pub use result::{DeleteError, NukeResult};

/// Pseudo-region under which account-wide resources are discovered and deleted.
pub const GLOBAL_REGION: &str = "global";
