//! Shared test utilities for aws-reaper
//!
//! Helpers for the live AWS integration tests: which region to run in and
//! how to name throwaway resources so filters can single them out.
//!
//! ## Modules
//!
//! - [`aws`]: AWS region detection and unique resource naming

pub mod aws;

pub use aws::{exact_name_filter, get_test_region, test_resource_name, test_run_id};
