//! Default configuration values shared by the engine and the CLI

/// Default batch size for adapters that do not override it
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;

/// Default hard ceiling on identifiers per nuke invocation
///
/// Adapters may raise this for APIs with larger bulk limits, but it must never
/// be below the adapter's batch size.
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 100;

/// Region used to build clients for account-wide (IAM) resources
pub const DEFAULT_GLOBAL_CLIENT_REGION: &str = "us-east-1";

/// Region used to bootstrap region discovery when none is configured
pub const DEFAULT_BOOTSTRAP_REGION: &str = "us-east-1";

/// Default minimum age, in hours, before a resource becomes eligible
pub const DEFAULT_MIN_AGE_HOURS: u64 = 0;
