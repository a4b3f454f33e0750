//! Typed error handling for the action pipeline
//!
//! Every failure that crosses the pipeline boundary carries a stable
//! machine-readable kind plus a human-readable message. Internal collaborator
//! error types (storage, permission engine) never surface raw: they are
//! translated at the executor and transaction boundaries, with the original
//! cause attached for diagnostics but kept out of the message.
//!
//! # Error Categories
//!
//! - [`ValidationError`]: malformed or disallowed options, missing input
//! - [`NoPermissionError`]: authorization denied (authorization only)
//! - [`NotFoundError`]: target entity absent, resource-specific message
//! - [`OperationFailedError`]: a mutation could not be completed
//! - [`StoreError`]: storage boundary errors, translated before they surface

use http::StatusCode;
use thiserror::Error;

/// Errors raised by the option and input validator.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Option name not in the action's allowed list
    #[error("option `{option}` is not allowed for this action")]
    UnknownOption { option: String },

    /// Option value outside its enumerated allowed values
    #[error("`{value}` is not an accepted value for option `{option}`")]
    InvalidOptionValue { option: String, value: String },

    /// Required option absent
    #[error("option `{option}` is required")]
    MissingOption { option: String },

    /// Input entity has no submitted records
    #[error("`{entity}` input must contain at least one record")]
    MissingInput { entity: String },

    /// Required input field absent or null
    #[error("`{entity}` input is missing the required field `{field}`")]
    MissingField { entity: String, field: String },

    /// Input record could not be interpreted
    #[error("malformed `{entity}` input: {message}")]
    MalformedInput { entity: String, message: String },
}

/// The actor is not authorized to perform the action.
///
/// Raised for authorization outcomes only. An optional cause (a failed
/// dynamic resolution, a permission-engine fault) is attached for logging
/// but never rendered into the message.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct NoPermissionError {
    message: String,
    cause: Option<anyhow::Error>,
}

impl NoPermissionError {
    pub fn new(message: impl Into<String>) -> Self {
        NoPermissionError {
            message: message.into(),
            cause: None,
        }
    }

    pub fn caused_by(mut self, cause: impl Into<anyhow::Error>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.cause.as_ref()
    }
}

/// The target entity does not exist.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct NotFoundError {
    resource: String,
    message: String,
}

impl NotFoundError {
    pub fn new(resource: impl Into<String>, message: impl Into<String>) -> Self {
        NotFoundError {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }
}

/// A mutation could not be completed.
///
/// Transactional cascades that fail mid-way land here with a uniform
/// message; the underlying step failure travels as the attached cause.
#[derive(Debug, Error)]
#[error("could not complete the `{operation}` operation")]
pub struct OperationFailedError {
    operation: String,
    cause: Option<anyhow::Error>,
}

impl OperationFailedError {
    pub fn new(operation: impl Into<String>) -> Self {
        OperationFailedError {
            operation: operation.into(),
            cause: None,
        }
    }

    pub fn with_cause(operation: impl Into<String>, cause: impl Into<anyhow::Error>) -> Self {
        OperationFailedError {
            operation: operation.into(),
            cause: Some(cause.into()),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.cause.as_ref()
    }
}

/// Errors crossing the storage boundary.
///
/// Store implementations signal these; the executor and the transaction
/// helper translate them before anything reaches the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist
    #[error("record not found")]
    Missing,

    /// A data constraint was violated
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// The backend itself failed
    #[error("storage backend failure: {0}")]
    Backend(String),

    /// An operation referenced a transaction that is not open
    #[error("unknown transaction handle")]
    UnknownTransaction,
}

/// Failures signaled by an action's query function.
///
/// `TargetMissing` is a sentinel: the executor owns the translation into a
/// [`NotFoundError`] with a resource-specific localized message.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("target entity absent")]
    TargetMissing,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NoPermission(#[from] NoPermissionError),

    #[error(transparent)]
    OperationFailed(#[from] OperationFailedError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The error type surfaced by the action executor.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NoPermission(#[from] NoPermissionError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    OperationFailed(#[from] OperationFailedError),

    /// No action registered under (resource, action). A programmer error,
    /// not a user-facing condition.
    #[error("no action `{action}` is registered for resource `{resource}`")]
    UnknownAction { resource: String, action: String },
}

impl PipelineError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "VALIDATION_ERROR",
            PipelineError::NoPermission(_) => "NO_PERMISSION",
            PipelineError::NotFound(_) => "NOT_FOUND",
            PipelineError::OperationFailed(_) => "OPERATION_FAILED",
            PipelineError::UnknownAction { .. } => "UNKNOWN_ACTION",
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
            PipelineError::NoPermission(_) => StatusCode::FORBIDDEN,
            PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::OperationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::UnknownAction { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
