//! AWS error translation
//!
//! Every SDK failure is turned into an [`AwsError`] before it leaves the
//! `aws` module. Callers match on this closed set and never on SDK error
//! shapes. Classification uses the error metadata `.code()` rather than
//! string matching on the Debug format.

use aws_sdk_iam::error::{DisplayErrorContext, ProvideErrorMetadata};
use thiserror::Error;

/// Result alias for provider calls
pub type AwsResult<T> = std::result::Result<T, AwsError>;

/// Domain error taxonomy for provider failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AwsError {
    #[error("EntityAlreadyExists: {message}")]
    EntityAlreadyExists { message: String },

    #[error("AccessDenied: {message}")]
    AccessDenied { message: String },

    /// The named entity does not exist (safe to skip in cleanup)
    #[error("NoSuchEntity: {message}")]
    NoSuchEntity { message: String },

    /// The entity still has dependents attached
    #[error("DeleteConflict: {message}")]
    DeleteConflict { message: String },

    /// Structured provider error with a code outside the closed set
    #[error("{code}: {message}")]
    Unknown { code: String, message: String },

    /// Failure that carried no provider error code (timeout, dispatch
    /// failure, malformed response)
    #[error("{message}")]
    Opaque { message: String },
}

/// EC2 reports a security group still referenced by an ENI or another
/// group's rules with this code
pub const DEPENDENCY_VIOLATION: &str = "DependencyViolation";

impl AwsError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NoSuchEntity { .. })
    }

    /// Check if the entity could not be deleted because something still
    /// depends on it
    pub fn is_dependency_violation(&self) -> bool {
        match self {
            AwsError::DeleteConflict { .. } => true,
            AwsError::Unknown { code, .. } => code == DEPENDENCY_VIOLATION,
            _ => false,
        }
    }

    /// Check if this error came without a provider error code
    pub fn is_opaque(&self) -> bool {
        matches!(self, AwsError::Opaque { .. })
    }

    /// Provider error code, if there was one
    pub fn code(&self) -> Option<&str> {
        match self {
            AwsError::EntityAlreadyExists { .. } => Some("EntityAlreadyExists"),
            AwsError::AccessDenied { .. } => Some("AccessDenied"),
            AwsError::NoSuchEntity { .. } => Some("NoSuchEntity"),
            AwsError::DeleteConflict { .. } => Some("DeleteConflict"),
            AwsError::Unknown { code, .. } => Some(code),
            AwsError::Opaque { .. } => None,
        }
    }

    /// Error for a response that succeeded but lacked a required field.
    pub(crate) fn missing(what: &str) -> Self {
        AwsError::Opaque {
            message: format!("response did not include {what}"),
        }
    }
}

/// Map an error code and message onto the closed taxonomy.
pub fn classify_aws_error(code: &str, message: &str) -> AwsError {
    let message = message.to_string();

    match code {
        "EntityAlreadyExists" => AwsError::EntityAlreadyExists { message },
        "AccessDenied" => AwsError::AccessDenied { message },
        "NoSuchEntity" => AwsError::NoSuchEntity { message },
        "DeleteConflict" => AwsError::DeleteConflict { message },
        _ => AwsError::Unknown {
            code: code.to_string(),
            message,
        },
    }
}

/// Translate any SDK error into an [`AwsError`].
///
/// Errors whose metadata carries a code are classified by that code;
/// anything else is wrapped as [`AwsError::Opaque`] with its full cause
/// chain as the message.
pub fn translate<E>(error: &E) -> AwsError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    match error.code() {
        Some(code) => classify_aws_error(code, error.message().unwrap_or_default()),
        None => AwsError::Opaque {
            message: DisplayErrorContext(error).to_string(),
        },
    }
}

/// Convert a `NoSuchEntity` failure into `Ok(None)`.
pub fn ignore_not_found<T>(result: AwsResult<T>) -> AwsResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
