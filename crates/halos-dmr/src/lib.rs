//! # halos-dmr
//!
//! The detyped model representation (DMR) used by every WildFly management
//! request and response, plus the small set of types built directly on top of it.
//!
//! ## Contents
//!
//! - [`ModelNode`]: a recursive, dynamically-typed value tree
//! - [`codec`]: the length-prefixed binary wire format and its base64 wrapping
//! - [`ResourceAddress`]: a fully resolved `key=value` resource path
//! - [`Operation`], [`Composite`] and [`CompositeResult`]: management operations
//! - [`Dispatcher`]: the async seam every transport implements
//!
//! ## Example
//!
//! ```rust
//! use halos_dmr::{ModelNode, Operation, ResourceAddress};
//!
//! let address = ResourceAddress::root().add("subsystem", "io");
//! let operation = Operation::builder(address, "read-resource")
//!     .param("include-runtime", true)
//!     .build();
//! assert_eq!(operation.as_cli(), "/subsystem=io:read-resource(include-runtime=true)");
//!
//! let mut node = ModelNode::new();
//! node.get("name").unwrap().set("default").unwrap();
//! assert!(node.has_defined("name"));
//! ```

pub mod address;
pub mod codec;
pub mod constants;
pub mod dispatch;
pub mod error;
mod format;
mod json;
pub mod model;
pub mod operation;
pub mod response;

pub use address::ResourceAddress;
pub use codec::CONTENT_TYPE;
pub use dispatch::{DispatchError, DispatchResult, Dispatcher};
pub use error::{DmrError, DmrResult};
pub use model::{BigDecimal, ModelNode, ModelType, ModelValue, Property};
pub use operation::{Composite, CompositeResult, Operation, OperationBuilder};
