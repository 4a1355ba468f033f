//! Error types for the DMR value tree and wire codec

use thiserror::Error;

use crate::model::ModelType;

/// Result type for value tree operations
pub type DmrResult<T> = std::result::Result<T, DmrError>;

/// Errors raised while reading, mutating or encoding a [`ModelNode`](crate::ModelNode)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DmrError {
    /// An accessor was invoked on a node of a different type
    #[error("Type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        expected: ModelType,
        actual: ModelType,
    },

    /// A required child or index is absent
    #[error("No child found for '{0}'")]
    NotFound(String),

    /// Mutation of a protected node
    #[error("Node is protected and cannot be modified")]
    Protected,

    /// A value could not be converted (e.g. a string that is not a number)
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Malformed binary or base64 input
    #[error("Decode error: {0}")]
    Decode(String),

    /// A value that cannot be represented in the wire format
    #[error("Encode error: {0}")]
    Encode(String),

    /// A node that does not describe a management operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl DmrError {
    /// Create a type mismatch error
    pub fn mismatch(expected: ModelType, actual: ModelType) -> Self {
        Self::TypeMismatch { expected, actual }
    }

    /// Create an invalid value error
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue(message.into())
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Create an encode error
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode(message.into())
    }

    /// Create an invalid operation error
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }
}
