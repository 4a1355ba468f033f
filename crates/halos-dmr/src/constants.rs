//! Well-known DMR attribute, parameter and operation names

// operations
pub const COMPOSITE: &str = "composite";
pub const READ_RESOURCE_OPERATION: &str = "read-resource";
pub const READ_RESOURCE_DESCRIPTION_OPERATION: &str = "read-resource-description";
pub const READ_CHILDREN_NAMES_OPERATION: &str = "read-children-names";

// operation structure
pub const OPERATION: &str = "operation";
pub const ADDRESS: &str = "address";
pub const OPERATION_HEADERS: &str = "operation-headers";
pub const STEPS: &str = "steps";
pub const OUTCOME: &str = "outcome";
pub const SUCCESS: &str = "success";
pub const FAILED: &str = "failed";
pub const FAILURE_DESCRIPTION: &str = "failure-description";
pub const RESULT: &str = "result";

// read-resource-description
pub const ACCESS_CONTROL: &str = "access-control";
pub const COMBINED_DESCRIPTIONS: &str = "combined-descriptions";
pub const TRIM_DESCRIPTIONS: &str = "trim-descriptions";
pub const OPERATIONS: &str = "operations";
pub const LOCALE: &str = "locale";
pub const RECURSIVE_DEPTH: &str = "recursive-depth";
pub const CHILD_TYPE: &str = "child-type";

// resource description
pub const ATTRIBUTES: &str = "attributes";
pub const CHILDREN: &str = "children";
pub const DEFAULT: &str = "default";
pub const DEPRECATED: &str = "deprecated";
pub const DESCRIPTION: &str = "description";
pub const EXCEPTIONS: &str = "exceptions";
pub const MODEL_DESCRIPTION: &str = "model-description";

// security context
pub const READ: &str = "read";
pub const WRITE: &str = "write";
pub const EXECUTE: &str = "execute";

// address keys
pub const HOST: &str = "host";
pub const SERVER: &str = "server";
