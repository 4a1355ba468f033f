//! # halos-meta
//!
//! Address templates, the statement context and the metadata registry.
//!
//! Templates such as `{selected.host}/server=*/subsystem=io` are resolved
//! against a [`StatementContext`] into concrete addresses. The
//! [`MetadataRegistry`] uses wildcard resolution to map templates onto cached
//! resource descriptions and security contexts and fetches missing entries
//! with batched `read-resource-description` operations.
//!
//! ```
//! use halos_meta::{AddressTemplate, CoreStatementContext};
//!
//! let context = CoreStatementContext::new();
//! context.assign("selected.host", "master");
//!
//! let template = AddressTemplate::of("{selected.host}/server=*");
//! let address = template.resolve_with_context(&context).unwrap();
//! assert_eq!(address.to_string(), "/host=master/server=*");
//! ```

pub mod authorisation;
pub mod capabilities;
pub mod context;
pub mod description;
pub mod error;
pub mod metadata;
pub mod registry;
pub mod resolver;
pub mod rrd;
pub mod scope;
pub mod security;
pub mod template;

pub use authorisation::{AccessControlProvider, AuthorisationDecision, Constraint, Constraints};
pub use capabilities::{Capabilities, ManagementVersion};
pub use context::{CoreStatementContext, LocalStatementContext, Placeholder, StatementContext};
pub use description::ResourceDescription;
pub use error::{MetadataError, MetadataKind, MetadataResult};
pub use metadata::{Metadata, MetadataRequest, MetadataResults};
pub use registry::{MetadataRegistry, RegistryConfig};
pub use resolver::{StatementContextResolver, WildcardResolver};
pub use scope::Scope;
pub use security::SecurityContext;
pub use template::{AddressTemplate, Segment, SegmentPosition, SegmentResolver};
