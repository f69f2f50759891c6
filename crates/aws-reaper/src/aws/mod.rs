//! AWS plumbing and resource adapters
//!
//! - `context`: shared SDK configuration, per-region client construction
//! - `error`: error-code classification for retry and not-found handling
//! - `account`/`regions`: identity and region targeting
//! - `resources`: one adapter per resource type

pub mod account;
pub mod context;
pub mod error;
pub mod regions;
pub mod resources;
pub mod retry;

pub use account::{AccountId, get_current_account_id};
pub use context::AwsContext;
pub use error::{AwsError, classify_aws_error, classify_sdk_error, ignore_not_found};
pub use regions::{TargetRegions, enabled_regions, select_regions};
