//! Fully resolved resource addresses

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::error::{DmrError, DmrResult};
use crate::model::{ModelNode, Property};

/// An ordered list of `key=value` segments such as `/subsystem=io/worker=default`.
///
/// A literal `*` value is allowed and matches every resource of that type.
/// Equality and hashing are structural, so addresses are used directly as
/// cache keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceAddress {
    segments: Vec<(String, String)>,
}

impl ResourceAddress {
    /// The root address `/`
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse `/k1=v1/k2=v2`. Tokens that are not `key=value` are skipped.
    ///
    /// The text form has no escaping: a value containing `/` (such as a JNDI
    /// name) is split into several tokens, and only the first `=` separates key
    /// from value. Addresses with such values do not survive
    /// `to_string()` followed by `parse()`; build them with [`add`](Self::add)
    /// or exchange them in DMR form instead.
    pub fn parse(s: &str) -> Self {
        let segments = s
            .split('/')
            .filter_map(|token| token.split_once('='))
            .filter(|(key, value)| !key.is_empty() && !value.is_empty())
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Self { segments }
    }

    /// Append a segment
    pub fn add(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// Append a segment in place
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.segments.push((key.into(), value.into()));
    }

    /// Append all segments of `other`
    pub fn append(mut self, other: &ResourceAddress) -> Self {
        self.segments.extend(other.segments.iter().cloned());
        self
    }

    /// The address without its last segment. The parent of root is root.
    pub fn parent(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self { segments }
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// `true` for the root address
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments in order
    pub fn segments(&self) -> impl Iterator<Item = (&str, &str)> {
        self.segments.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Segment at `index`
    pub fn segment(&self, index: usize) -> Option<(&str, &str)> {
        self.segments.get(index).map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Value of the first segment
    pub fn first_value(&self) -> Option<&str> {
        self.segments.first().map(|(_, v)| v.as_str())
    }

    /// Key of the last segment
    pub fn last_name(&self) -> Option<&str> {
        self.segments.last().map(|(k, _)| k.as_str())
    }

    /// Value of the last segment
    pub fn last_value(&self) -> Option<&str> {
        self.segments.last().map(|(_, v)| v.as_str())
    }

    /// Copy with the value of every segment keyed `key` replaced
    pub fn replace_value(&self, key: &str, value: &str) -> Self {
        let segments = self
            .segments
            .iter()
            .map(|(k, v)| {
                if k == key {
                    (k.clone(), value.to_string())
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect();
        Self { segments }
    }

    /// DMR form: a list of `(key => value)` properties
    pub fn to_model_node(&self) -> ModelNode {
        self.segments
            .iter()
            .map(|(k, v)| ModelNode::from(Property::new(k.clone(), v.as_str())))
            .collect()
    }
}

/// `/k1=v1/k2=v2`, or `/` for the root. Values are written verbatim, see
/// [`ResourceAddress::parse`] for the values that do not read back.
impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for (key, value) in &self.segments {
            write!(f, "/{key}={value}")?;
        }
        Ok(())
    }
}

impl From<&str> for ResourceAddress {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl FromStr for ResourceAddress {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl FromIterator<(String, String)> for ResourceAddress {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

/// Read an address from its DMR form. Undefined means root.
impl TryFrom<&ModelNode> for ResourceAddress {
    type Error = DmrError;

    fn try_from(node: &ModelNode) -> DmrResult<Self> {
        if !node.is_defined() {
            return Ok(Self::root());
        }
        node.as_property_list()?
            .into_iter()
            .map(|property| -> DmrResult<(String, String)> {
                let value = property.value().as_string()?;
                Ok((property.name().to_string(), value))
            })
            .collect()
    }
}
