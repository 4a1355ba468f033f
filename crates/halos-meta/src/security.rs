//! Security contexts derived from the `access-control` part of descriptions

use halos_dmr::constants::{ATTRIBUTES, EXECUTE, OPERATIONS, READ, WRITE};
use halos_dmr::ModelNode;

#[derive(Debug, Clone, PartialEq)]
enum Grants {
    Model(ModelNode),
    ReadOnly,
    All,
}

/// Read, write and execute permissions for one resource
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityContext {
    grants: Grants,
    recursive: bool,
}

static READ_ONLY: SecurityContext = SecurityContext::read_only();

impl SecurityContext {
    /// Permissions as reported by the server. The node is protected.
    pub fn new(node: ModelNode, recursive: bool) -> Self {
        Self {
            grants: Grants::Model(node.protected()),
            recursive,
        }
    }

    /// Read everything, write and execute nothing
    pub const fn read_only() -> Self {
        Self {
            grants: Grants::ReadOnly,
            recursive: false,
        }
    }

    /// Read, write and execute everything
    pub const fn rwx() -> Self {
        Self {
            grants: Grants::All,
            recursive: false,
        }
    }

    /// Shared read-only instance
    pub fn read_only_ref() -> &'static SecurityContext {
        &READ_ONLY
    }

    /// The raw payload, `None` for the hardcoded contexts
    pub fn node(&self) -> Option<&ModelNode> {
        match &self.grants {
            Grants::Model(node) => Some(node),
            _ => None,
        }
    }

    /// Whether the context was read with a recursive depth
    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    pub fn is_readable(&self) -> bool {
        match &self.grants {
            Grants::Model(node) => node.path_bool(READ, false),
            Grants::ReadOnly | Grants::All => true,
        }
    }

    pub fn is_writable(&self) -> bool {
        match &self.grants {
            Grants::Model(node) => node.path_bool(WRITE, false),
            Grants::ReadOnly => false,
            Grants::All => true,
        }
    }

    pub fn is_readable_attribute(&self, attribute: &str) -> bool {
        match &self.grants {
            Grants::Model(node) => flag(node, ATTRIBUTES, attribute, READ),
            Grants::ReadOnly | Grants::All => true,
        }
    }

    pub fn is_writable_attribute(&self, attribute: &str) -> bool {
        match &self.grants {
            Grants::Model(node) => flag(node, ATTRIBUTES, attribute, WRITE),
            Grants::ReadOnly => false,
            Grants::All => true,
        }
    }

    pub fn is_executable(&self, operation: &str) -> bool {
        match &self.grants {
            Grants::Model(node) => flag(node, OPERATIONS, operation, EXECUTE),
            Grants::ReadOnly => false,
            Grants::All => true,
        }
    }
}

// names may contain dots, so no dotted path here
fn flag(node: &ModelNode, section: &str, name: &str, permission: &str) -> bool {
    node.child(section)
        .and_then(|s| s.child(name))
        .and_then(|n| n.child(permission))
        .is_some_and(|p| p.as_bool_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> ModelNode {
        let mut node = ModelNode::new();
        node.get(READ).unwrap().set(true).unwrap();
        node.get(WRITE).unwrap().set(false).unwrap();
        let attribute = node.get(ATTRIBUTES).unwrap().get("io-threads").unwrap();
        attribute.get(READ).unwrap().set(true).unwrap();
        attribute.get(WRITE).unwrap().set(true).unwrap();
        node.get(OPERATIONS)
            .unwrap()
            .get("remove")
            .unwrap()
            .get(EXECUTE)
            .unwrap()
            .set(false)
            .unwrap();
        node.get(OPERATIONS)
            .unwrap()
            .get("read-resource")
            .unwrap()
            .get(EXECUTE)
            .unwrap()
            .set(true)
            .unwrap();
        node
    }

    #[test]
    fn test_model_permissions() {
        let context = SecurityContext::new(payload(), false);
        assert!(context.is_readable());
        assert!(!context.is_writable());
        assert!(context.is_readable_attribute("io-threads"));
        assert!(context.is_writable_attribute("io-threads"));
        assert!(!context.is_readable_attribute("unknown"));
        assert!(context.is_executable("read-resource"));
        assert!(!context.is_executable("remove"));
        assert!(!context.is_executable("unknown"));
        assert!(context.node().is_some());
    }

    #[test]
    fn test_hardcoded_contexts() {
        let read_only = SecurityContext::read_only_ref();
        assert!(read_only.is_readable());
        assert!(read_only.is_readable_attribute("anything"));
        assert!(!read_only.is_writable());
        assert!(!read_only.is_writable_attribute("anything"));
        assert!(!read_only.is_executable("add"));
        assert!(read_only.node().is_none());

        let rwx = SecurityContext::rwx();
        assert!(rwx.is_writable());
        assert!(rwx.is_writable_attribute("anything"));
        assert!(rwx.is_executable("add"));
    }
}
