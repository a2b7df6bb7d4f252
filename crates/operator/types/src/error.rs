//! Error types shared by every operator crate

use thiserror::Error;

/// Errors raised by operator domain types
#[derive(Debug, Error)]
pub enum OperatorError {
    /// No operator registered under the URI, locally or remotely
    #[error("Operator \"{0}\" not found")]
    NotFound(String),

    /// URI could not be parsed
    #[error("Invalid operator URI: {0}")]
    InvalidUri(String),

    /// Schema JSON named a type that is not in the type table
    #[error("Unknown property type: {0}")]
    UnknownType(String),

    /// Schema JSON was structurally wrong
    #[error("Malformed schema at {path}: {reason}")]
    MalformedSchema { path: String, reason: String },

    /// `trigger`/`log` called without a local execution owning the context
    #[error("No executor attached to the execution context; {0} is only valid during a local execution")]
    NoActiveExecutor(&'static str),

    /// Queue status would regress
    #[error("Invalid queue transition for item {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    /// Queue item does not exist
    #[error("Queue item not found: {0}")]
    QueueItemNotFound(String),

    /// Operator descriptor could not be decoded
    #[error("Invalid operator descriptor: {0}")]
    InvalidDescriptor(String),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for operator domain operations
pub type Result<T> = std::result::Result<T, OperatorError>;

impl OperatorError {
    /// Create a malformed-schema error at a path
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedSchema {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
