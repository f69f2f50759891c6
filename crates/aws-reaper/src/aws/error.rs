//! AWS error classification and handling
//!
//! Provides typed errors for AWS SDK operations using the `.code()` method
//! instead of string matching on Debug format.

use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata};
use reaper_common::DeleteError;
use thiserror::Error;

/// AWS error categories for retry and cleanup logic
#[derive(Debug, Clone, Error)]
pub enum AwsError {
    /// Resource was not found (already deleted, safe to skip)
    #[error("Resource not found: {message}")]
    NotFound { code: String, message: String },

    /// Rate limit exceeded (retryable with backoff)
    #[error("Rate limit exceeded ({code})")]
    Throttled { code: String },

    /// Resource has dependent objects (retryable, e.g., SG with attached ENI)
    #[error("Resource has dependent objects: {message}")]
    DependencyViolation { code: String, message: String },

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AwsError::Throttled { .. } | AwsError::DependencyViolation { .. }
        )
    }

    /// The provider error code, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            AwsError::NotFound { code, .. }
            | AwsError::Throttled { code }
            | AwsError::DependencyViolation { code, .. } => Some(code),
            AwsError::Sdk { code, .. } => code.as_deref(),
        }
    }
}

impl From<AwsError> for DeleteError {
    fn from(err: AwsError) -> Self {
        let message = err.to_string();
        match err.code() {
            Some(code) => DeleteError::with_code(code, message),
            None => DeleteError::new(message),
        }
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "InvalidInstanceID.NotFound",
    "InvalidVolume.NotFound",
    "InvalidKeyPair.NotFound",
    "InvalidAllocationID.NotFound",
    "InvalidGroup.NotFound",
    "InvalidInternetGatewayID.NotFound",
    "InvalidSubnetID.NotFound",
    "InvalidRouteTableID.NotFound",
    "InvalidVpcID.NotFound",
    "InvalidDhcpOptionID.NotFound",
    "NoSuchBucket",
    "NoSuchEntity",
    "ResourceNotFoundException",
];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
    "SlowDown",
];

/// Known AWS error codes for dependency violations (resource still in use)
const DEPENDENCY_CODES: &[&str] = &["DependencyViolation", "DeleteConflict"];

/// Classify an AWS error using its code and message.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound {
            code: c.to_string(),
            message,
        },
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled {
            code: c.to_string(),
        },
        Some(c) if DEPENDENCY_CODES.contains(&c) => AwsError::DependencyViolation {
            code: c.to_string(),
            message,
        },
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Classify any SDK error (`SdkError<OperationError, _>`) by its metadata.
///
/// Errors without a service message (timeouts, dispatch failures) fall back to
/// the full error context so nothing is reported as "Unknown error".
pub fn classify_sdk_error<E>(err: &E) -> AwsError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let meta = err.meta();
    match meta.message() {
        Some(message) => classify_aws_error(meta.code(), Some(message)),
        None => {
            let context = DisplayErrorContext(err).to_string();
            classify_aws_error(meta.code(), Some(&context))
        }
    }
}

/// Convert a "not found" result into `Ok(None)`, classify anything else.
pub fn ignore_not_found<T, E>(result: Result<T, E>) -> Result<Option<T>, AwsError>
where
    E: ProvideErrorMetadata + std::error::Error,
{
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            let classified = classify_sdk_error(&e);
            if classified.is_not_found() {
                Ok(None)
            } else {
                Err(classified)
            }
        }
    }
}
