//! The transport seam
//!
//! [`Dispatcher`] is implemented by every component that can execute a
//! management operation: the HTTP client, test doubles, or a proxy adapter.
//! The metadata registry only ever talks to a `dyn Dispatcher`.

use async_trait::async_trait;
use thiserror::Error;

use crate::constants::RESULT;
use crate::error::DmrError;
use crate::model::ModelNode;
use crate::operation::{Composite, CompositeResult, Operation};
use crate::response;

/// Result type for dispatch operations
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;

/// Errors raised while executing an operation
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DispatchError {
    /// The endpoint answered with a non-success status
    #[error("Error executing operation '{operation}': {status} {reason}")]
    Failure {
        status: u16,
        reason: String,
        operation: String,
    },

    /// The server executed the operation and reported `outcome => failed`
    #[error("Operation '{operation}' failed: {description}")]
    OperationFailed {
        operation: String,
        description: String,
    },

    /// The request never produced a response
    #[error("Transport error executing '{operation}': {message}")]
    Transport { message: String, operation: String },

    /// The request or response payload was not valid DMR
    #[error("Codec error: {0}")]
    Codec(#[from] DmrError),
}

impl DispatchError {
    /// Create a failure status error
    pub fn failure(status: u16, reason: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Failure {
            status,
            reason: reason.into(),
            operation: operation.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            operation: operation.into(),
        }
    }

    /// HTTP status of a [`Failure`](Self::Failure)
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Failure { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Turn a raw management response into its `result`.
///
/// # Errors
///
/// Returns [`DispatchError::OperationFailed`] if the response reports a failed
/// outcome.
pub fn into_result(mut response: ModelNode, operation: &str) -> DispatchResult<ModelNode> {
    if response::is_failure(&response) {
        return Err(DispatchError::OperationFailed {
            operation: operation.to_string(),
            description: response::failure_description(&response),
        });
    }
    Ok(response.remove(RESULT)?.unwrap_or_default())
}

/// Executes management operations against one endpoint
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Execute a single operation and return its `result`
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] on transport failure, a non-success status or a
    /// failed outcome.
    async fn execute(&self, operation: &Operation) -> DispatchResult<ModelNode>;

    /// Execute a composite and return its step results
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute). A failed composite fails as a whole.
    async fn execute_composite(&self, composite: &Composite) -> DispatchResult<CompositeResult>;
}
