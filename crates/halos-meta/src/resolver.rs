//! Built-in segment resolvers

use crate::context::StatementContext;
use crate::error::{MetadataError, MetadataResult};
use crate::template::{AddressTemplate, Segment, SegmentPosition, SegmentResolver};

/// Replaces placeholders with their values from the statement context.
///
/// `key={name}` becomes `key=<value>`; a bare `{name}` becomes
/// `<resource>=<value>` using the placeholder's resource type.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementContextResolver;

impl SegmentResolver for StatementContextResolver {
    fn resolve(
        &self,
        context: &dyn StatementContext,
        template: &AddressTemplate,
        segment: &Segment,
        _position: SegmentPosition,
    ) -> MetadataResult<Segment> {
        let Some(name) = segment.placeholder() else {
            return Ok(segment.clone());
        };
        let (placeholder, value) = context.resolve(name, template)?;
        match (segment.key(), placeholder.resource()) {
            (Some(key), _) | (None, Some(key)) => Ok(Segment::new(key, &value)),
            (None, None) => Err(MetadataError::unresolved(name, template)),
        }
    }
}

/// Generalises a template for metadata lookups.
///
/// Placeholders become `*`, and so does the value of the last segment. Any
/// resource of a given type shares one description, so `subsystem=io/worker=default`
/// and `subsystem=io/worker=*` map to the same cache entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct WildcardResolver;

impl SegmentResolver for WildcardResolver {
    fn resolve(
        &self,
        context: &dyn StatementContext,
        template: &AddressTemplate,
        segment: &Segment,
        position: SegmentPosition,
    ) -> MetadataResult<Segment> {
        if let Some(name) = segment.placeholder() {
            if let Some(key) = segment.key() {
                return Ok(Segment::new(key, "*"));
            }
            let placeholder = context
                .placeholder(name)
                .ok_or_else(|| MetadataError::unknown(name, template))?;
            return match placeholder.resource() {
                Some(resource) => Ok(Segment::new(resource, "*")),
                None => Err(MetadataError::unresolved(name, template)),
            };
        }
        match segment.key() {
            Some(key) if position.last && !segment.is_wildcard() => Ok(Segment::new(key, "*")),
            _ => Ok(segment.clone()),
        }
    }
}
