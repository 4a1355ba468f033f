//! Error types for template resolution and metadata lookup

use halos_dmr::{DispatchError, DmrError};
use thiserror::Error;

/// Result type for metadata operations
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

/// Which part of the metadata was missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    /// Attribute, operation and child descriptions
    Description,
    /// Access control decisions
    SecurityContext,
}

impl std::fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Description => f.write_str("resource description"),
            Self::SecurityContext => f.write_str("security context"),
        }
    }
}

/// Errors raised by templates, resolvers and the registry
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MetadataError {
    /// The placeholder is known but has no value in the statement context
    #[error("No value found for placeholder {placeholder} in {template}")]
    UnresolvedPlaceholder {
        placeholder: String,
        template: String,
    },

    /// The statement context does not know the placeholder
    #[error("Unknown placeholder {placeholder} in {template}")]
    UnknownPlaceholder {
        placeholder: String,
        template: String,
    },

    /// A template segment could not be turned into an address segment
    #[error("Invalid segment '{segment}' in {template}")]
    InvalidSegment { segment: String, template: String },

    /// A sub template range does not fit the template
    #[error("Range {from}..{to} is out of bounds for {template}")]
    OutOfBounds {
        from: usize,
        to: usize,
        template: String,
    },

    /// Nothing is cached, yet no operations could be planned
    #[error("No fetch plan for {template}")]
    NoFetchPlan { template: String },

    /// Metadata is still absent after fetching
    #[error("No {kind} found for {template} ({address})")]
    MissingMetadata {
        kind: MetadataKind,
        template: String,
        address: String,
    },

    /// One step of a composite read-resource-description failed
    #[error("Failed step '{step}' in composite rrd result: {description}")]
    FailedStep { step: String, description: String },

    /// A constraint expression could not be parsed
    #[error("Invalid constraint '{0}'")]
    InvalidConstraint(String),

    /// Transport or server failure
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Malformed DMR payload
    #[error(transparent)]
    Dmr(#[from] DmrError),
}

impl MetadataError {
    /// Create an unresolved placeholder error
    pub fn unresolved(placeholder: impl Into<String>, template: impl ToString) -> Self {
        Self::UnresolvedPlaceholder {
            placeholder: placeholder.into(),
            template: template.to_string(),
        }
    }

    /// Create an unknown placeholder error
    pub fn unknown(placeholder: impl Into<String>, template: impl ToString) -> Self {
        Self::UnknownPlaceholder {
            placeholder: placeholder.into(),
            template: template.to_string(),
        }
    }

    /// Create a missing metadata error
    pub fn missing(kind: MetadataKind, template: impl ToString, address: impl ToString) -> Self {
        Self::MissingMetadata {
            kind,
            template: template.to_string(),
            address: address.to_string(),
        }
    }

    /// Check if the error stems from statement context resolution
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedPlaceholder { .. }
                | Self::UnknownPlaceholder { .. }
                | Self::InvalidSegment { .. }
        )
    }
}
