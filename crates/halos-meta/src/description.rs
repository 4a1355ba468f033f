//! Resource descriptions as returned by `read-resource-description`

use halos_dmr::constants::{ATTRIBUTES, DEPRECATED, DESCRIPTION, OPERATIONS};
use halos_dmr::{ModelNode, Property};

/// Immutable view over a resource description payload
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescription {
    node: ModelNode,
    recursive: bool,
}

impl ResourceDescription {
    /// Wrap a description payload. The node is protected.
    pub fn new(node: ModelNode, recursive: bool) -> Self {
        Self {
            node: node.protected(),
            recursive,
        }
    }

    /// The raw payload
    pub fn node(&self) -> &ModelNode {
        &self.node
    }

    /// Whether the description was read with a recursive depth
    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// Human readable description text
    pub fn description(&self) -> Option<&str> {
        self.node.child(DESCRIPTION).and_then(ModelNode::as_str)
    }

    /// Attribute descriptions in declaration order
    pub fn attributes(&self) -> Vec<Property> {
        self.node
            .child(ATTRIBUTES)
            .map(ModelNode::as_property_list_or_empty)
            .unwrap_or_default()
    }

    /// Description of a single attribute
    pub fn attribute(&self, name: &str) -> Option<&ModelNode> {
        self.node.child(ATTRIBUTES).and_then(|a| a.child(name))
    }

    /// Operation descriptions in declaration order
    pub fn operations(&self) -> Vec<Property> {
        self.node
            .child(OPERATIONS)
            .map(ModelNode::as_property_list_or_empty)
            .unwrap_or_default()
    }

    /// Description of a single operation
    pub fn operation(&self, name: &str) -> Option<&ModelNode> {
        self.node.child(OPERATIONS).and_then(|o| o.child(name))
    }

    /// `true` if the resource carries a `deprecated` block
    pub fn is_deprecated(&self) -> bool {
        self.node.has_defined(DEPRECATED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halos_dmr::ModelType;

    fn worker() -> ModelNode {
        let mut node = ModelNode::new();
        node.get(DESCRIPTION).unwrap().set("An IO worker").unwrap();
        let attributes = node.get(ATTRIBUTES).unwrap();
        attributes.get("io-threads").unwrap().get("type").unwrap().set(ModelType::Int).unwrap();
        attributes.get("stack-size").unwrap().get("type").unwrap().set(ModelType::Long).unwrap();
        node.get(OPERATIONS).unwrap().get("add").unwrap().get(DESCRIPTION).unwrap().set("Add").unwrap();
        node
    }

    #[test]
    fn test_views() {
        let description = ResourceDescription::new(worker(), true);
        assert!(description.is_recursive());
        assert_eq!(description.description(), Some("An IO worker"));
        let names: Vec<_> = description.attributes().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, vec!["io-threads", "stack-size"]);
        assert_eq!(
            description.attribute("io-threads").unwrap().child("type").unwrap().as_type().unwrap(),
            ModelType::Int
        );
        assert!(description.attribute("missing").is_none());
        assert_eq!(description.operations().len(), 1);
        assert!(description.operation("add").is_some());
        assert!(!description.is_deprecated());
    }

    #[test]
    fn test_payload_is_protected() {
        let description = ResourceDescription::new(worker(), false);
        assert!(description.node().is_protected());
        assert!(description.node().child(DESCRIPTION).unwrap().is_protected());

        let mut copy = description.node().clone();
        assert!(copy.get(DESCRIPTION).unwrap().set("changed").is_ok());
        assert_ne!(copy.child(DESCRIPTION), description.node().child(DESCRIPTION));
    }
}
