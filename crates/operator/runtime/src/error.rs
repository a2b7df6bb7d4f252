//! Error types for the operator runtime

use operator_types::{OperatorError, OperatorUri, ValidationContext};
use thiserror::Error;

/// Runtime infrastructure errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Domain error from the types crate
    #[error(transparent)]
    Operator(#[from] OperatorError),

    /// Transport failure talking to the remote peer
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote peer answered with a non-success status
    #[error("Remote API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Remote peer answered with an application-level error
    #[error("Remote error: {0}")]
    Remote(String),

    /// No remote peer configured
    #[error("Remote operators are not configured")]
    RemoteUnavailable,

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A background task was started off a tokio runtime
    #[error("No tokio runtime: {0}")]
    NoAsyncRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Failures that stop a dispatch before anything executes
///
/// Execution errors are not here: they are reported inside
/// `OperatorResult::error`.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// URI is not registered locally or remotely
    #[error("Operator \"{0}\" not found")]
    NotFound(String),

    /// URI could not be parsed
    #[error("Invalid operator URI: {0}")]
    InvalidUri(String),

    /// Params failed validation; the operator was not called
    #[error("Invalid inputs for {uri}: {} error(s)", validation.errors.len())]
    InvalidInputs {
        uri: OperatorUri,
        validation: ValidationContext,
    },

    /// The chosen submit option cannot be executed
    #[error("Submit option \"{0}\" is disabled")]
    SubmitOptionDisabled(String),

    /// Input schema could not be resolved
    #[error("Failed to resolve {target} schema for {uri}: {reason}")]
    SchemaResolution {
        uri: OperatorUri,
        target: &'static str,
        reason: String,
    },
}

impl DispatchError {
    /// Map a registry lookup failure
    pub(crate) fn from_lookup(error: OperatorError) -> Self {
        match error {
            OperatorError::NotFound(uri) => DispatchError::NotFound(uri),
            OperatorError::InvalidUri(uri) => DispatchError::InvalidUri(uri),
            other => DispatchError::InvalidUri(other.to_string()),
        }
    }

    /// Validation errors, if this is an input failure
    pub fn validation(&self) -> Option<&ValidationContext> {
        match self {
            DispatchError::InvalidInputs { validation, .. } => Some(validation),
            _ => None,
        }
    }
}
