//! Address templates
//!
//! A template is an address whose segments may hold placeholders
//! (`{selected.host}/server=*`). Resolving it against a
//! [`StatementContext`] through a [`SegmentResolver`] yields a concrete
//! [`ResourceAddress`].
//!
//! Values are kept in encoded form: a `/` inside a value is stored as `%2F`
//! and decoded again when the template is resolved.

use std::fmt;
use std::hash::{Hash, Hasher};

use halos_dmr::ResourceAddress;

use crate::context::{Placeholder, StatementContext};
use crate::error::{MetadataError, MetadataResult};
use crate::resolver::StatementContextResolver;

const ENCODED_SLASH: &str = "%2F";

fn encode_value(value: &str) -> String {
    value.replace('/', ENCODED_SLASH)
}

fn decode_value(value: &str) -> String {
    value.replace(ENCODED_SLASH, "/")
}

/// One `key=value` or bare `value` token of a template
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    key: Option<String>,
    value: String,
}

impl Segment {
    /// A `key=value` segment. `/` in `value` is encoded.
    pub fn new(key: impl Into<String>, value: &str) -> Self {
        Self {
            key: Some(key.into()),
            value: encode_value(value),
        }
    }

    /// A segment without key, typically a bare `{placeholder}`
    pub fn bare(value: &str) -> Self {
        Self {
            key: None,
            value: encode_value(value),
        }
    }

    fn parse(token: &str) -> Self {
        match token.split_once('=') {
            Some((key, value)) => Self {
                key: Some(key.to_string()),
                value: value.to_string(),
            },
            None => Self {
                key: None,
                value: token.to_string(),
            },
        }
    }

    /// The resource type, `None` for bare segments
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// The encoded value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The value with `%2F` turned back into `/`
    pub fn decoded_value(&self) -> String {
        decode_value(&self.value)
    }

    /// `true` for `key=value` segments
    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// `true` if the value is a `{placeholder}` expression
    pub fn contains_placeholder(&self) -> bool {
        self.value.len() > 1 && self.value.starts_with('{') && self.value.ends_with('}')
    }

    /// Name of the placeholder, without braces
    pub fn placeholder(&self) -> Option<&str> {
        if self.contains_placeholder() {
            Some(&self.value[1..self.value.len() - 1])
        } else {
            None
        }
    }

    /// `true` for a `key=*` segment
    pub fn is_wildcard(&self) -> bool {
        self.value == "*"
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{key}={}", self.value),
            None => f.write_str(&self.value),
        }
    }
}

/// Position of a segment handed to a [`SegmentResolver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPosition {
    /// Zero based index
    pub index: usize,
    /// `true` for the first segment
    pub first: bool,
    /// `true` for the last segment
    pub last: bool,
}

impl SegmentPosition {
    fn of(index: usize, len: usize) -> Self {
        Self {
            index,
            first: index == 0,
            last: index + 1 == len,
        }
    }
}

/// Strategy turning a template segment into a concrete segment
///
/// Implemented for closures with the same signature as [`resolve`](Self::resolve).
pub trait SegmentResolver: Send + Sync {
    /// Resolve a single segment
    ///
    /// # Errors
    ///
    /// Returns a resolution error if a placeholder is unknown or has no value.
    fn resolve(
        &self,
        context: &dyn StatementContext,
        template: &AddressTemplate,
        segment: &Segment,
        position: SegmentPosition,
    ) -> MetadataResult<Segment>;
}

impl<F> SegmentResolver for F
where
    F: Fn(&dyn StatementContext, &AddressTemplate, &Segment, SegmentPosition) -> MetadataResult<Segment>
        + Send
        + Sync,
{
    fn resolve(
        &self,
        context: &dyn StatementContext,
        template: &AddressTemplate,
        segment: &Segment,
        position: SegmentPosition,
    ) -> MetadataResult<Segment> {
        self(context, template, segment, position)
    }
}

/// An address whose segments may contain placeholders and wildcards.
///
/// Equality and hashing use the canonical string, so `/subsystem=io` and
/// `subsystem=io` are the same template.
#[derive(Debug, Clone)]
pub struct AddressTemplate {
    segments: Vec<Segment>,
    template: String,
}

impl AddressTemplate {
    /// The root template `/`
    pub fn root() -> Self {
        Self::from_segments(Vec::new())
    }

    /// Parse an encoded template string. A leading `/` is optional.
    pub fn of(template: &str) -> Self {
        let segments = template
            .split('/')
            .filter(|token| !token.is_empty())
            .map(Segment::parse)
            .collect();
        Self::from_segments(segments)
    }

    /// A template consisting of a single `{placeholder}` segment
    pub fn of_placeholder(placeholder: &Placeholder) -> Self {
        Self::of(&placeholder.expression())
    }

    /// Build a template from already parsed segments
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        let template = segments
            .iter()
            .map(Segment::to_string)
            .collect::<Vec<_>>()
            .join("/");
        Self { segments, template }
    }

    /// Turn an address back into a template.
    ///
    /// `unresolver` receives every `(key, value)` pair with its position and
    /// returns the encoded token to use, e.g. `{selected.host}` for the first
    /// segment of a host scoped address.
    pub fn from_address<U>(address: &ResourceAddress, unresolver: U) -> Self
    where
        U: Fn(&str, &str, SegmentPosition) -> String,
    {
        let len = address.len();
        let tokens: Vec<String> = address
            .segments()
            .enumerate()
            .map(|(index, (key, value))| unresolver(key, value, SegmentPosition::of(index, len)))
            .collect();
        Self::of(&tokens.join("/"))
    }

    /// Append an encoded template string
    pub fn append(&self, template: &str) -> Self {
        Self::of(&format!("{}/{}", self.template, template))
    }

    /// Append another template
    pub fn append_template(&self, other: &AddressTemplate) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self::from_segments(segments)
    }

    /// Segments `from..to`
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::OutOfBounds`] if `from > to` or `to > len`.
    pub fn sub_template(&self, from: usize, to: usize) -> MetadataResult<Self> {
        self.segments
            .get(from..to)
            .map(|slice| Self::from_segments(slice.to_vec()))
            .ok_or_else(|| MetadataError::OutOfBounds {
                from,
                to,
                template: self.to_string(),
            })
    }

    /// The template without its last segment. The parent of root is root.
    pub fn parent(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self::from_segments(segments)
    }

    /// First segment, `None` for root or a template starting with a bare token
    pub fn first(&self) -> Option<&Segment> {
        self.segments.first().filter(|s| s.has_key())
    }

    /// Last segment, `None` for root or a template starting with a bare token
    pub fn last(&self) -> Option<&Segment> {
        if self.first().is_some() {
            self.segments.last()
        } else {
            None
        }
    }

    /// Key of the last segment
    pub fn last_name(&self) -> Option<&str> {
        self.last().and_then(Segment::key)
    }

    /// Decoded value of the last segment
    pub fn last_value(&self) -> Option<String> {
        self.last().map(Segment::decoded_value)
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// `true` for the root template
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments in order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Iterate over the segments
    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    /// The canonical encoded string without leading slash. Empty for root.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Replace `key=*` segments, left to right, with the given values.
    /// Surplus wildcards stay as they are.
    pub fn wildcards(&self, values: &[&str]) -> Self {
        let mut values = values.iter();
        let segments = self
            .segments
            .iter()
            .map(|segment| match segment.key() {
                Some(key) if segment.is_wildcard() => match values.next() {
                    Some(value) => Segment::new(key, value),
                    None => segment.clone(),
                },
                _ => segment.clone(),
            })
            .collect();
        Self::from_segments(segments)
    }

    /// Resolve against `context` with a custom resolver.
    ///
    /// # Errors
    ///
    /// Propagates resolver errors. A segment that is still without key after
    /// resolution yields [`MetadataError::InvalidSegment`].
    pub fn resolve(
        &self,
        context: &dyn StatementContext,
        resolver: &dyn SegmentResolver,
    ) -> MetadataResult<ResourceAddress> {
        let len = self.segments.len();
        let mut address = ResourceAddress::root();
        for (index, segment) in self.segments.iter().enumerate() {
            let resolved = resolver.resolve(context, self, segment, SegmentPosition::of(index, len))?;
            let Some(key) = resolved.key() else {
                return Err(MetadataError::InvalidSegment {
                    segment: resolved.to_string(),
                    template: self.to_string(),
                });
            };
            address.push(key, resolved.decoded_value());
        }
        Ok(address)
    }

    /// Resolve against `context`, replacing placeholders with their values
    ///
    /// # Errors
    ///
    /// Returns a resolution error for unknown or unassigned placeholders.
    pub fn resolve_with_context(&self, context: &dyn StatementContext) -> MetadataResult<ResourceAddress> {
        self.resolve(context, &StatementContextResolver)
    }
}

impl Default for AddressTemplate {
    fn default() -> Self {
        Self::root()
    }
}

impl PartialEq for AddressTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.template == other.template
    }
}

impl Eq for AddressTemplate {}

impl Hash for AddressTemplate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.template.hash(state);
    }
}

impl fmt::Display for AddressTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.template.is_empty() {
            f.write_str("/")
        } else {
            f.write_str(&self.template)
        }
    }
}

impl From<&str> for AddressTemplate {
    fn from(template: &str) -> Self {
        Self::of(template)
    }
}

impl<'a> IntoIterator for &'a AddressTemplate {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}
