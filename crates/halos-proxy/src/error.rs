//! Error types for halos-proxy
//!
//! Lower level errors from the DMR model and the transport convert
//! automatically. Proxy specific errors carry the instance or configuration
//! key they relate to.

use axum::http::StatusCode;
use halos_dmr::{DispatchError, DmrError};
use thiserror::Error;

/// Result type for proxy operations
pub type ProxyResult<T> = std::result::Result<T, ProxyError>;

/// Main error type for halos-proxy
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    /// Unable to resolve or connect to a backend instance
    #[error("Unable to connect to instance {instance}: {message}")]
    Connection { message: String, instance: String },

    /// Closing the connection of an instance failed
    #[error("Unable to close connection for {instance}: {message}")]
    Close { message: String, instance: String },

    /// No instance with that name is registered
    #[error("Instance {name} not found")]
    InstanceNotFound { name: String },

    /// The instance can not be registered as given
    #[error("Invalid instance {name:?}: {reason}")]
    InvalidInstance { name: String, reason: String },

    /// Invalid proxy configuration
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        key: Option<String>,
    },

    /// Executing an operation against a backend failed
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// An operation or response was not valid DMR
    #[error("Unable to read operation: {0}")]
    Codec(#[from] DmrError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    /// Create a connection error
    pub fn connection(instance: impl ToString, message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            instance: instance.to_string(),
        }
    }

    /// Create a close error
    pub fn close(instance: impl ToString, message: impl Into<String>) -> Self {
        Self::Close {
            message: message.into(),
            instance: instance.to_string(),
        }
    }

    /// Create an instance not found error
    pub fn instance_not_found(name: impl Into<String>) -> Self {
        Self::InstanceNotFound { name: name.into() }
    }

    /// Create an invalid instance error
    pub fn invalid_instance(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInstance {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            key: None,
        }
    }

    /// Create a configuration error with key context
    pub fn configuration_with_key(message: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Sanitize error message for client responses
    ///
    /// Removes internal details such as resolved addresses and lower level
    /// error messages.
    pub fn sanitize(&self) -> String {
        match self {
            Self::Connection { instance, .. } => format!("Unable to connect to instance {instance}"),
            Self::Close { instance, .. } => format!("Unable to close connection for {instance}"),
            Self::InstanceNotFound { name } => format!("Instance {name} not found"),
            Self::InvalidInstance { reason, .. } => format!("Invalid instance: {reason}"),
            Self::Configuration { .. } => "Configuration error".to_string(),
            Self::Dispatch(_) => "Management operation failed".to_string(),
            Self::Codec(_) => "Unable to read operation".to_string(),
            Self::Io(_) => "IO error occurred".to_string(),
        }
    }

    /// HTTP status used when this error reaches the HTTP surface
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InstanceNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Codec(_) | Self::InvalidInstance { .. } => StatusCode::BAD_REQUEST,
            Self::Dispatch(_) => StatusCode::BAD_GATEWAY,
            Self::Connection { .. } | Self::Close { .. } | Self::Configuration { .. } | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<::config::ConfigError> for ProxyError {
    fn from(err: ::config::ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}

/// Extension trait for Result types to add proxy error context
pub trait ProxyErrorExt<T> {
    /// Turn the error into a connection error for `instance`
    fn connection_context(self, instance: impl ToString) -> ProxyResult<T>;

    /// Add configuration context to error
    fn config_context(self, key: impl Into<String>) -> ProxyResult<T>;
}

impl<T, E> ProxyErrorExt<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn connection_context(self, instance: impl ToString) -> ProxyResult<T> {
        self.map_err(|e| ProxyError::connection(instance, e.to_string()))
    }

    fn config_context(self, key: impl Into<String>) -> ProxyResult<T> {
        self.map_err(|e| ProxyError::configuration_with_key(e.to_string(), key))
    }
}
