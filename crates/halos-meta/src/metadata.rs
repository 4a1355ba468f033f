//! Metadata bundles and batch requests

use std::sync::Arc;

use indexmap::IndexMap;

use crate::capabilities::Capabilities;
use crate::description::ResourceDescription;
use crate::scope::Scope;
use crate::security::SecurityContext;
use crate::template::AddressTemplate;

/// Description, security context and capabilities for one template
#[derive(Debug, Clone)]
pub struct Metadata {
    template: AddressTemplate,
    scope: Scope,
    description: Option<Arc<ResourceDescription>>,
    security_context: Option<Arc<SecurityContext>>,
    capabilities: Arc<Capabilities>,
}

impl Metadata {
    pub fn new(
        template: AddressTemplate,
        scope: Scope,
        description: Option<Arc<ResourceDescription>>,
        security_context: Option<Arc<SecurityContext>>,
        capabilities: Arc<Capabilities>,
    ) -> Self {
        Self {
            template,
            scope,
            description,
            security_context,
            capabilities,
        }
    }

    /// Metadata with nothing but the capabilities
    pub fn empty(template: AddressTemplate, scope: Scope, capabilities: Arc<Capabilities>) -> Self {
        Self::new(template, scope, None, None, capabilities)
    }

    pub fn template(&self) -> &AddressTemplate {
        &self.template
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn description(&self) -> Option<&ResourceDescription> {
        self.description.as_deref()
    }

    /// The security context, or the read-only context if none was found
    pub fn security_context(&self) -> &SecurityContext {
        self.security_context
            .as_deref()
            .unwrap_or(SecurityContext::read_only_ref())
    }

    /// `true` if a security context was actually found
    pub fn has_security_context(&self) -> bool {
        self.security_context.is_some()
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Both parts are present
    pub fn is_complete(&self) -> bool {
        self.description.is_some() && self.security_context.is_some()
    }

    /// Neither part is present
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.security_context.is_none()
    }
}

/// Ordered set of templates to look up, each with its scope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRequest {
    entries: IndexMap<AddressTemplate, Scope>,
}

impl MetadataRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template. A template added twice keeps its last scope.
    pub fn add(mut self, template: AddressTemplate, scope: Scope) -> Self {
        self.entries.insert(template, scope);
        self
    }

    /// Add a template string with an optional scope prefix, e.g. `opt://subsystem=mail`
    pub fn add_str(self, template: &str) -> Self {
        let (scope, template) = Scope::split(template);
        self.add(AddressTemplate::of(template), scope)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AddressTemplate, Scope)> {
        self.entries.iter().map(|(template, scope)| (template, *scope))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(AddressTemplate, Scope)> for MetadataRequest {
    fn from_iter<I: IntoIterator<Item = (AddressTemplate, Scope)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Metadata for every template of a [`MetadataRequest`], in request order
#[derive(Debug, Clone, Default)]
pub struct MetadataResults {
    entries: IndexMap<AddressTemplate, Metadata>,
}

impl MetadataResults {
    pub(crate) fn insert(&mut self, metadata: Metadata) {
        self.entries.insert(metadata.template().clone(), metadata);
    }

    pub fn get(&self, template: &AddressTemplate) -> Option<&Metadata> {
        self.entries.get(template)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Metadata> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for MetadataResults {
    type Item = (AddressTemplate, Metadata);
    type IntoIter = indexmap::map::IntoIter<AddressTemplate, Metadata>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halos_dmr::ModelNode;

    #[test]
    fn test_empty_metadata_is_read_only() {
        let metadata = Metadata::empty(
            AddressTemplate::of("subsystem=io"),
            Scope::Optional,
            Arc::new(Capabilities::default()),
        );
        assert!(metadata.is_empty());
        assert!(!metadata.is_complete());
        assert!(!metadata.has_security_context());
        assert!(metadata.security_context().is_readable());
        assert!(!metadata.security_context().is_writable());
        assert!(metadata.description().is_none());
    }

    #[test]
    fn test_complete_metadata() {
        let metadata = Metadata::new(
            AddressTemplate::of("subsystem=io"),
            Scope::Normal,
            Some(Arc::new(ResourceDescription::new(ModelNode::new(), false))),
            Some(Arc::new(SecurityContext::rwx())),
            Arc::new(Capabilities::default()),
        );
        assert!(metadata.is_complete());
        assert!(metadata.security_context().is_writable());
    }

    #[test]
    fn test_request_order_and_prefixes() {
        let request = MetadataRequest::new()
            .add_str("subsystem=io")
            .add_str("opt://subsystem=mail")
            .add_str("recursive:/subsystem=logging");
        let entries: Vec<_> = request.iter().map(|(t, s)| (t.to_string(), s)).collect();
        assert_eq!(
            entries,
            vec![
                ("subsystem=io".to_string(), Scope::Normal),
                ("subsystem=mail".to_string(), Scope::Optional),
                ("subsystem=logging".to_string(), Scope::Recursive),
            ]
        );
    }
}
