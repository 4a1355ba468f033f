//! The DMR value tree
//!
//! A [`ModelNode`] is a tagged value: undefined, one of the scalar types, a list,
//! an ordered object or a single named property. Nodes are created undefined and
//! change type on first mutation:
//!
//! - [`ModelNode::get`] turns an undefined node into an object and creates the key
//! - [`ModelNode::get_index`] turns it into a list and pads up to the index
//! - [`ModelNode::add`] turns it into a list and appends
//!
//! Accessors are strict: `as_long()` on a string that is not a number is an
//! error. Each accessor has an `_or` variant that falls back to a default.
//!
//! A node can be [protected](ModelNode::protect), after which any mutation of the
//! node or its descendants fails with [`DmrError::Protected`]. Copies taken with
//! `clone()` and values stored into another tree are unprotected. Cached metadata
//! is always protected.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use indexmap::IndexMap;
use indexmap::map::Entry;
use num_bigint::{BigInt, Sign};

use crate::error::{DmrError, DmrResult};

/// The type tag of a [`ModelNode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelType {
    BigDecimal,
    BigInteger,
    Boolean,
    Bytes,
    Double,
    Expression,
    Int,
    List,
    Long,
    Object,
    Property,
    String,
    Type,
    Undefined,
}

impl ModelType {
    /// All types in declaration order
    pub const ALL: [Self; 14] = [
        Self::BigDecimal,
        Self::BigInteger,
        Self::Boolean,
        Self::Bytes,
        Self::Double,
        Self::Expression,
        Self::Int,
        Self::List,
        Self::Long,
        Self::Object,
        Self::Property,
        Self::String,
        Self::Type,
        Self::Undefined,
    ];

    /// Wire tag byte
    pub const fn tag(self) -> u8 {
        match self {
            Self::BigDecimal => b'd',
            Self::BigInteger => b'i',
            Self::Boolean => b'Z',
            Self::Bytes => b'b',
            Self::Double => b'D',
            Self::Expression => b'e',
            Self::Int => b'I',
            Self::List => b'l',
            Self::Long => b'J',
            Self::Object => b'o',
            Self::Property => b'p',
            Self::String => b's',
            Self::Type => b't',
            Self::Undefined => b'u',
        }
    }

    /// Look up a type by its wire tag byte
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// Upper-case name as used in resource descriptions (`"STRING"`, `"BIG_DECIMAL"`)
    pub const fn name(self) -> &'static str {
        match self {
            Self::BigDecimal => "BIG_DECIMAL",
            Self::BigInteger => "BIG_INTEGER",
            Self::Boolean => "BOOLEAN",
            Self::Bytes => "BYTES",
            Self::Double => "DOUBLE",
            Self::Expression => "EXPRESSION",
            Self::Int => "INT",
            Self::List => "LIST",
            Self::Long => "LONG",
            Self::Object => "OBJECT",
            Self::Property => "PROPERTY",
            Self::String => "STRING",
            Self::Type => "TYPE",
            Self::Undefined => "UNDEFINED",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelType {
    type Err = DmrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| DmrError::invalid_value(format!("unknown model type '{s}'")))
    }
}

/// Arbitrary precision decimal: `unscaled × 10^-scale`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigDecimal {
    unscaled: BigInt,
    scale: i32,
}

impl BigDecimal {
    /// Create a decimal from its unscaled value and scale
    pub fn new(unscaled: BigInt, scale: i32) -> Self {
        Self { unscaled, scale }
    }

    /// The unscaled integer value
    pub fn unscaled(&self) -> &BigInt {
        &self.unscaled
    }

    /// Number of digits to the right of the decimal point
    pub fn scale(&self) -> i32 {
        self.scale
    }
}

impl From<i64> for BigDecimal {
    fn from(value: i64) -> Self {
        Self::new(BigInt::from(value), 0)
    }
}

impl fmt::Display for BigDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.unscaled.sign() == Sign::Minus {
            "-"
        } else {
            ""
        };
        let digits = self.unscaled.magnitude().to_string();
        if self.scale <= 0 {
            if digits == "0" {
                return f.write_str("0");
            }
            let zeros = "0".repeat(self.scale.unsigned_abs() as usize);
            return write!(f, "{sign}{digits}{zeros}");
        }
        let scale = self.scale as usize;
        let padded = if digits.len() <= scale {
            format!("{}{digits}", "0".repeat(scale - digits.len() + 1))
        } else {
            digits
        };
        let (integer, fraction) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{integer}.{fraction}")
    }
}

impl FromStr for BigDecimal {
    type Err = DmrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DmrError::invalid_value(format!("'{s}' is not a decimal number"));
        let trimmed = s.trim();
        let (sign, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (integer, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (integer.is_empty() && fraction.is_empty()) || !all_digits(integer) || !all_digits(fraction)
        {
            return Err(invalid());
        }
        let unscaled: BigInt = format!("{sign}{integer}{fraction}")
            .parse()
            .map_err(|_| invalid())?;
        let scale = i32::try_from(fraction.len()).map_err(|_| invalid())?;
        Ok(Self::new(unscaled, scale))
    }
}

/// A single `name => value` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Property {
    name: String,
    value: ModelNode,
}

impl Property {
    /// Create a property
    pub fn new(name: impl Into<String>, value: impl Into<ModelNode>) -> Self {
        let mut value = value.into();
        value.unprotect();
        Self {
            name: name.into(),
            value,
        }
    }

    /// Property name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Property value
    pub fn value(&self) -> &ModelNode {
        &self.value
    }

    /// Split into name and value
    pub fn into_parts(self) -> (String, ModelNode) {
        (self.name, self.value)
    }
}

/// The payload of a [`ModelNode`]
#[derive(Debug, Clone, Default)]
pub enum ModelValue {
    #[default]
    Undefined,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    BigInteger(BigInt),
    BigDecimal(BigDecimal),
    Bytes(Vec<u8>),
    String(String),
    /// An unevaluated `${...}` expression
    Expression(String),
    Type(ModelType),
    List(Vec<ModelNode>),
    Object(IndexMap<String, ModelNode>),
    Property(Box<Property>),
}

impl ModelValue {
    /// The type tag of this value
    pub fn model_type(&self) -> ModelType {
        match self {
            Self::Undefined => ModelType::Undefined,
            Self::Boolean(_) => ModelType::Boolean,
            Self::Int(_) => ModelType::Int,
            Self::Long(_) => ModelType::Long,
            Self::Double(_) => ModelType::Double,
            Self::BigInteger(_) => ModelType::BigInteger,
            Self::BigDecimal(_) => ModelType::BigDecimal,
            Self::Bytes(_) => ModelType::Bytes,
            Self::String(_) => ModelType::String,
            Self::Expression(_) => ModelType::Expression,
            Self::Type(_) => ModelType::Type,
            Self::List(_) => ModelType::List,
            Self::Object(_) => ModelType::Object,
            Self::Property(_) => ModelType::Property,
        }
    }
}

// Objects compare in key order so that equality agrees with `Hash`.
impl PartialEq for ModelValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Long(a), Self::Long(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::BigInteger(a), Self::BigInteger(b)) => a == b,
            (Self::BigDecimal(a), Self::BigDecimal(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::String(a), Self::String(b)) | (Self::Expression(a), Self::Expression(b)) => {
                a == b
            }
            (Self::Type(a), Self::Type(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            (Self::Property(a), Self::Property(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ModelValue {}

impl Hash for ModelValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Undefined => {}
            Self::Boolean(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Long(l) => l.hash(state),
            Self::Double(d) => d.to_bits().hash(state),
            Self::BigInteger(b) => b.hash(state),
            Self::BigDecimal(d) => d.hash(state),
            Self::Bytes(b) => b.hash(state),
            Self::String(s) | Self::Expression(s) => s.hash(state),
            Self::Type(t) => t.hash(state),
            Self::List(list) => list.hash(state),
            Self::Object(map) => {
                map.len().hash(state);
                for (key, value) in map {
                    key.hash(state);
                    value.hash(state);
                }
            }
            Self::Property(p) => p.hash(state),
        }
    }
}

/// A node in the DMR value tree
///
/// Equality and hashing are structural and ignore the protection flag.
/// Protection belongs to the node that was frozen: clones and values stored
/// with [`set`](Self::set) or [`add`](Self::add) are never protected.
#[derive(Debug, Default)]
pub struct ModelNode {
    value: ModelValue,
    protected: bool,
}

impl Clone for ModelNode {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            protected: false,
        }
    }
}

impl PartialEq for ModelNode {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for ModelNode {}

impl Hash for ModelNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl ModelNode {
    /// Create an undefined node
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty object node
    pub fn empty_object() -> Self {
        ModelValue::Object(IndexMap::new()).into()
    }

    /// Create an empty list node
    pub fn empty_list() -> Self {
        ModelValue::List(Vec::new()).into()
    }

    /// Create an expression node. The expression is stored verbatim.
    pub fn expression(expression: impl Into<String>) -> Self {
        ModelValue::Expression(expression.into()).into()
    }

    /// The payload, for exhaustive matching
    pub fn value(&self) -> &ModelValue {
        &self.value
    }

    /// Consume the node and return its payload
    pub fn into_value(self) -> ModelValue {
        self.value
    }

    /// The type tag
    pub fn model_type(&self) -> ModelType {
        self.value.model_type()
    }

    /// `false` only for undefined nodes
    pub fn is_defined(&self) -> bool {
        !matches!(self.value, ModelValue::Undefined)
    }

    /// Whether [`protect`](Self::protect) has been called on this node or an ancestor
    pub fn is_protected(&self) -> bool {
        self.protected
    }

    fn mismatch(&self, expected: ModelType) -> DmrError {
        DmrError::mismatch(expected, self.model_type())
    }

    fn check_writable(&self) -> DmrResult<()> {
        if self.protected {
            Err(DmrError::Protected)
        } else {
            Ok(())
        }
    }

    // ---- scalar accessors ----

    /// Boolean value. Strings `"true"` and `"false"` are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::TypeMismatch`] for other types.
    pub fn as_bool(&self) -> DmrResult<bool> {
        match &self.value {
            ModelValue::Boolean(b) => Ok(*b),
            ModelValue::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            ModelValue::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(self.mismatch(ModelType::Boolean)),
        }
    }

    /// Boolean value, or `default` if undefined or not convertible
    pub fn as_bool_or(&self, default: bool) -> bool {
        self.as_bool().unwrap_or(default)
    }

    /// 32-bit integer value
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::InvalidValue`] when a long or string does not fit, and
    /// [`DmrError::TypeMismatch`] for non-numeric types.
    pub fn as_int(&self) -> DmrResult<i32> {
        match &self.value {
            ModelValue::Int(i) => Ok(*i),
            ModelValue::Long(l) => i32::try_from(*l)
                .map_err(|_| DmrError::invalid_value(format!("{l} does not fit into INT"))),
            ModelValue::Double(d) => Ok(*d as i32),
            ModelValue::String(s) => s
                .trim()
                .parse()
                .map_err(|_| DmrError::invalid_value(format!("'{s}' is not an INT"))),
            _ => Err(self.mismatch(ModelType::Int)),
        }
    }

    /// 32-bit integer value, or `default` if undefined or not convertible
    pub fn as_int_or(&self, default: i32) -> i32 {
        self.as_int().unwrap_or(default)
    }

    /// 64-bit integer value. Ints widen losslessly.
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::InvalidValue`] for strings that are not numbers and
    /// [`DmrError::TypeMismatch`] for non-numeric types.
    pub fn as_long(&self) -> DmrResult<i64> {
        match &self.value {
            ModelValue::Int(i) => Ok(i64::from(*i)),
            ModelValue::Long(l) => Ok(*l),
            ModelValue::Double(d) => Ok(*d as i64),
            ModelValue::String(s) => s
                .trim()
                .parse()
                .map_err(|_| DmrError::invalid_value(format!("'{s}' is not a LONG"))),
            _ => Err(self.mismatch(ModelType::Long)),
        }
    }

    /// 64-bit integer value, or `default` if undefined or not convertible
    pub fn as_long_or(&self, default: i64) -> i64 {
        self.as_long().unwrap_or(default)
    }

    /// Floating point value
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::InvalidValue`] for strings that are not numbers and
    /// [`DmrError::TypeMismatch`] for non-numeric types.
    pub fn as_double(&self) -> DmrResult<f64> {
        match &self.value {
            ModelValue::Int(i) => Ok(f64::from(*i)),
            ModelValue::Long(l) => Ok(*l as f64),
            ModelValue::Double(d) => Ok(*d),
            ModelValue::String(s) => s
                .trim()
                .parse()
                .map_err(|_| DmrError::invalid_value(format!("'{s}' is not a DOUBLE"))),
            _ => Err(self.mismatch(ModelType::Double)),
        }
    }

    /// Floating point value, or `default` if undefined or not convertible
    pub fn as_double_or(&self, default: f64) -> f64 {
        self.as_double().unwrap_or(default)
    }

    /// Arbitrary precision integer value
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::InvalidValue`] for strings that are not numbers and
    /// [`DmrError::TypeMismatch`] for other types.
    pub fn as_big_integer(&self) -> DmrResult<BigInt> {
        match &self.value {
            ModelValue::BigInteger(b) => Ok(b.clone()),
            ModelValue::Int(i) => Ok(BigInt::from(*i)),
            ModelValue::Long(l) => Ok(BigInt::from(*l)),
            ModelValue::String(s) => s
                .trim()
                .parse()
                .map_err(|_| DmrError::invalid_value(format!("'{s}' is not a BIG_INTEGER"))),
            _ => Err(self.mismatch(ModelType::BigInteger)),
        }
    }

    /// Arbitrary precision integer value, or `default` if undefined or not convertible
    pub fn as_big_integer_or(&self, default: BigInt) -> BigInt {
        self.as_big_integer().unwrap_or(default)
    }

    /// Arbitrary precision decimal value
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::InvalidValue`] for strings that are not decimals and
    /// [`DmrError::TypeMismatch`] for other types.
    pub fn as_big_decimal(&self) -> DmrResult<BigDecimal> {
        match &self.value {
            ModelValue::BigDecimal(d) => Ok(d.clone()),
            ModelValue::BigInteger(b) => Ok(BigDecimal::new(b.clone(), 0)),
            ModelValue::Int(i) => Ok(BigDecimal::from(i64::from(*i))),
            ModelValue::Long(l) => Ok(BigDecimal::from(*l)),
            ModelValue::String(s) => s.parse(),
            _ => Err(self.mismatch(ModelType::BigDecimal)),
        }
    }

    /// Arbitrary precision decimal value, or `default` if undefined or not convertible
    pub fn as_big_decimal_or(&self, default: BigDecimal) -> BigDecimal {
        self.as_big_decimal().unwrap_or(default)
    }

    /// Raw bytes
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::TypeMismatch`] unless the node holds bytes.
    pub fn as_bytes(&self) -> DmrResult<&[u8]> {
        match &self.value {
            ModelValue::Bytes(b) => Ok(b),
            _ => Err(self.mismatch(ModelType::Bytes)),
        }
    }

    /// Raw bytes, or `default` if undefined or not bytes
    pub fn as_bytes_or<'a>(&'a self, default: &'a [u8]) -> &'a [u8] {
        self.as_bytes().unwrap_or(default)
    }

    /// String rendering of any defined scalar
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::TypeMismatch`] for undefined, bytes, lists, objects and
    /// properties.
    pub fn as_string(&self) -> DmrResult<String> {
        match &self.value {
            ModelValue::String(s) | ModelValue::Expression(s) => Ok(s.clone()),
            ModelValue::Boolean(b) => Ok(b.to_string()),
            ModelValue::Int(i) => Ok(i.to_string()),
            ModelValue::Long(l) => Ok(l.to_string()),
            ModelValue::Double(d) => Ok(d.to_string()),
            ModelValue::BigInteger(b) => Ok(b.to_string()),
            ModelValue::BigDecimal(d) => Ok(d.to_string()),
            ModelValue::Type(t) => Ok(t.to_string()),
            _ => Err(self.mismatch(ModelType::String)),
        }
    }

    /// String rendering, or `default` if undefined or not a scalar
    pub fn as_string_or(&self, default: &str) -> String {
        self.as_string().unwrap_or_else(|_| default.to_string())
    }

    /// Borrow the text of a string or expression node
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            ModelValue::String(s) | ModelValue::Expression(s) => Some(s),
            _ => None,
        }
    }

    /// Type tag value. Type names such as `"STRING"` are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::InvalidValue`] for unknown names and
    /// [`DmrError::TypeMismatch`] for other types.
    pub fn as_type(&self) -> DmrResult<ModelType> {
        match &self.value {
            ModelValue::Type(t) => Ok(*t),
            ModelValue::String(s) => s.parse(),
            _ => Err(self.mismatch(ModelType::Type)),
        }
    }

    /// Type tag value, or `default` if undefined or not convertible
    pub fn as_type_or(&self, default: ModelType) -> ModelType {
        self.as_type().unwrap_or(default)
    }

    /// The raw expression text
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::TypeMismatch`] unless the node holds an expression or string.
    pub fn as_expression(&self) -> DmrResult<&str> {
        match &self.value {
            ModelValue::Expression(s) | ModelValue::String(s) => Ok(s),
            _ => Err(self.mismatch(ModelType::Expression)),
        }
    }

    // ---- composite accessors ----

    /// List elements. An object yields one property node per entry.
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::TypeMismatch`] for every other type.
    pub fn as_list(&self) -> DmrResult<Vec<ModelNode>> {
        match &self.value {
            ModelValue::List(list) => Ok(list.clone()),
            ModelValue::Object(map) => Ok(map
                .iter()
                .map(|(k, v)| ModelNode::from(Property::new(k.clone(), v.clone())))
                .collect()),
            _ => Err(self.mismatch(ModelType::List)),
        }
    }

    /// Borrow the elements of a list node. Empty for every other type.
    pub fn elements(&self) -> &[ModelNode] {
        match &self.value {
            ModelValue::List(list) => list,
            _ => &[],
        }
    }

    /// Borrow the entries of an object node
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::TypeMismatch`] unless the node is an object.
    pub fn as_object(&self) -> DmrResult<&IndexMap<String, ModelNode>> {
        match &self.value {
            ModelValue::Object(map) => Ok(map),
            _ => Err(self.mismatch(ModelType::Object)),
        }
    }

    /// Interpret the node as a single property.
    ///
    /// Accepts a property node, a two-element list `[name, value]` and a
    /// single-key object.
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::TypeMismatch`] for every other shape.
    pub fn as_property(&self) -> DmrResult<Property> {
        match &self.value {
            ModelValue::Property(p) => Ok((**p).clone()),
            ModelValue::List(list) if list.len() == 2 => {
                Ok(Property::new(list[0].as_string()?, list[1].clone()))
            }
            ModelValue::Object(map) if map.len() == 1 => match map.first() {
                Some((name, value)) => Ok(Property::new(name.clone(), value.clone())),
                None => Err(self.mismatch(ModelType::Property)),
            },
            _ => Err(self.mismatch(ModelType::Property)),
        }
    }

    /// Interpret the node as a list of properties.
    ///
    /// Objects yield their entries, a property yields itself and each list element
    /// must be acceptable to [`as_property`](Self::as_property).
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::TypeMismatch`] if the node or one of its elements has
    /// another shape.
    pub fn as_property_list(&self) -> DmrResult<Vec<Property>> {
        match &self.value {
            ModelValue::Property(p) => Ok(vec![(**p).clone()]),
            ModelValue::Object(map) => Ok(map
                .iter()
                .map(|(k, v)| Property::new(k.clone(), v.clone()))
                .collect()),
            ModelValue::List(list) => list.iter().map(ModelNode::as_property).collect(),
            _ => Err(self.mismatch(ModelType::List)),
        }
    }

    /// Property list, or an empty list if the node has another shape
    pub fn as_property_list_or_empty(&self) -> Vec<Property> {
        self.as_property_list().unwrap_or_default()
    }

    /// Object keys in insertion order. A property yields its name.
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::TypeMismatch`] for other types.
    pub fn keys(&self) -> DmrResult<Vec<&str>> {
        match &self.value {
            ModelValue::Object(map) => Ok(map.keys().map(String::as_str).collect()),
            ModelValue::Property(p) => Ok(vec![p.name()]),
            _ => Err(self.mismatch(ModelType::Object)),
        }
    }

    /// Number of list elements or object entries
    pub fn len(&self) -> usize {
        match &self.value {
            ModelValue::List(list) => list.len(),
            ModelValue::Object(map) => map.len(),
            ModelValue::Property(_) => 1,
            _ => 0,
        }
    }

    /// `true` if [`len`](Self::len) is zero
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ---- navigation ----

    /// Non-mutating child lookup by key
    pub fn child(&self, key: &str) -> Option<&ModelNode> {
        match &self.value {
            ModelValue::Object(map) => map.get(key),
            ModelValue::Property(p) if p.name == key => Some(&p.value),
            _ => None,
        }
    }

    /// Non-mutating element lookup by index
    pub fn child_at(&self, index: usize) -> Option<&ModelNode> {
        match &self.value {
            ModelValue::List(list) => list.get(index),
            _ => None,
        }
    }

    /// Whether a child exists for `key`, defined or not
    pub fn has(&self, key: &str) -> bool {
        self.child(key).is_some()
    }

    /// Whether a defined child exists for `key`
    pub fn has_defined(&self, key: &str) -> bool {
        self.child(key).is_some_and(ModelNode::is_defined)
    }

    /// Child for `key`
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::NotFound`] if absent.
    pub fn require_child(&self, key: &str) -> DmrResult<&ModelNode> {
        self.child(key)
            .ok_or_else(|| DmrError::NotFound(key.to_string()))
    }

    /// Element at `index`
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::NotFound`] if out of range or not a list.
    pub fn require_index(&self, index: usize) -> DmrResult<&ModelNode> {
        self.child_at(index)
            .ok_or_else(|| DmrError::NotFound(format!("[{index}]")))
    }

    /// Follow a dot separated path of keys without creating anything.
    ///
    /// `node.path("access-control.default.read")` is `None` as soon as one
    /// segment is missing.
    pub fn path(&self, dotted: &str) -> Option<&ModelNode> {
        dotted
            .split('.')
            .filter(|key| !key.is_empty())
            .try_fold(self, |node, key| node.child(key))
    }

    /// Boolean at a dotted path, `default` if missing or not a boolean
    pub fn path_bool(&self, dotted: &str, default: bool) -> bool {
        self.path(dotted).map_or(default, |n| n.as_bool_or(default))
    }

    /// List at a dotted path, empty if missing or not a list
    pub fn path_list(&self, dotted: &str) -> Vec<ModelNode> {
        self.path(dotted)
            .and_then(|n| n.as_list().ok())
            .unwrap_or_default()
    }

    // ---- mutation ----

    /// Child for `key`, created on demand.
    ///
    /// An undefined node becomes an object. On a protected node existing children
    /// are still returned (and are themselves protected).
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::Protected`] if the child would have to be created on a
    /// protected node and [`DmrError::TypeMismatch`] if the node is not an object.
    pub fn get(&mut self, key: &str) -> DmrResult<&mut ModelNode> {
        if !self.is_defined() {
            self.check_writable()?;
            self.value = ModelValue::Object(IndexMap::new());
        }
        let protected = self.protected;
        let actual = self.model_type();
        match &mut self.value {
            ModelValue::Object(map) => match map.entry(key.to_string()) {
                Entry::Occupied(entry) => Ok(entry.into_mut()),
                Entry::Vacant(_) if protected => Err(DmrError::Protected),
                Entry::Vacant(entry) => Ok(entry.insert(ModelNode::new())),
            },
            ModelValue::Property(p) if p.name == key => Ok(&mut p.value),
            _ => Err(DmrError::mismatch(ModelType::Object, actual)),
        }
    }

    /// Element at `index`, padding the list with undefined nodes on demand.
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::Protected`] if the list would have to grow on a
    /// protected node and [`DmrError::TypeMismatch`] if the node is not a list.
    pub fn get_index(&mut self, index: usize) -> DmrResult<&mut ModelNode> {
        if !self.is_defined() {
            self.check_writable()?;
            self.value = ModelValue::List(Vec::new());
        }
        let protected = self.protected;
        let actual = self.model_type();
        match &mut self.value {
            ModelValue::List(list) => {
                if index >= list.len() {
                    if protected {
                        return Err(DmrError::Protected);
                    }
                    let len = index
                        .checked_add(1)
                        .ok_or_else(|| DmrError::invalid_value(format!("index {index} is out of range")))?;
                    list.resize_with(len, ModelNode::new);
                }
                list.get_mut(index)
                    .ok_or_else(|| DmrError::NotFound(format!("[{index}]")))
            }
            _ => Err(DmrError::mismatch(ModelType::List, actual)),
        }
    }

    /// Replace the value of this node
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::Protected`] if the node is protected.
    pub fn set(&mut self, value: impl Into<ModelNode>) -> DmrResult<&mut Self> {
        self.check_writable()?;
        let mut node = value.into();
        node.unprotect();
        self.value = node.value;
        Ok(self)
    }

    /// Replace the value of this node with a property
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::Protected`] if the node is protected.
    pub fn set_property(
        &mut self,
        name: impl Into<String>,
        value: impl Into<ModelNode>,
    ) -> DmrResult<&mut Self> {
        self.set(Property::new(name, value))
    }

    /// Append to a list. An undefined node becomes a list.
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::Protected`] if the node is protected and
    /// [`DmrError::TypeMismatch`] if it is neither undefined nor a list.
    pub fn add(&mut self, value: impl Into<ModelNode>) -> DmrResult<&mut Self> {
        self.check_writable()?;
        if !self.is_defined() {
            self.value = ModelValue::List(Vec::new());
        }
        let actual = self.model_type();
        match &mut self.value {
            ModelValue::List(list) => {
                let mut node = value.into();
                node.unprotect();
                list.push(node);
            }
            _ => return Err(DmrError::mismatch(ModelType::List, actual)),
        }
        Ok(self)
    }

    /// Append an undefined element and return it
    ///
    /// # Errors
    ///
    /// Same as [`add`](Self::add).
    pub fn add_empty(&mut self) -> DmrResult<&mut ModelNode> {
        self.add(ModelNode::new())?;
        let actual = self.model_type();
        match &mut self.value {
            ModelValue::List(list) => list
                .last_mut()
                .ok_or_else(|| DmrError::mismatch(ModelType::List, actual)),
            _ => Err(DmrError::mismatch(ModelType::List, actual)),
        }
    }

    /// Remove a child from an object, returning it
    ///
    /// # Errors
    ///
    /// Returns [`DmrError::Protected`] if the node is protected and
    /// [`DmrError::TypeMismatch`] if it is neither undefined nor an object.
    pub fn remove(&mut self, key: &str) -> DmrResult<Option<ModelNode>> {
        self.check_writable()?;
        let actual = self.model_type();
        match &mut self.value {
            ModelValue::Object(map) => Ok(map.shift_remove(key)),
            ModelValue::Undefined => Ok(None),
            _ => Err(DmrError::mismatch(ModelType::Object, actual)),
        }
    }

    /// Make this node and all its descendants immutable
    pub fn protect(&mut self) {
        self.protected = true;
        match &mut self.value {
            ModelValue::List(list) => list.iter_mut().for_each(ModelNode::protect),
            ModelValue::Object(map) => map.values_mut().for_each(ModelNode::protect),
            ModelValue::Property(p) => p.value.protect(),
            _ => {}
        }
    }

    /// Consume and return the node protected
    pub fn protected(mut self) -> Self {
        self.protect();
        self
    }

    // An unprotected node never has protected descendants, so the walk stops there.
    fn unprotect(&mut self) {
        if !self.protected {
            return;
        }
        self.protected = false;
        self.unprotect_children();
    }

    fn unprotect_children(&mut self) {
        match &mut self.value {
            ModelValue::List(list) => list.iter_mut().for_each(ModelNode::unprotect),
            ModelValue::Object(map) => map.values_mut().for_each(ModelNode::unprotect),
            ModelValue::Property(p) => p.value.unprotect(),
            _ => {}
        }
    }

    /// Deep, unprotected copy. Expressions are copied verbatim.
    pub fn resolve(&self) -> ModelNode {
        self.clone()
    }
}

impl From<ModelValue> for ModelNode {
    fn from(value: ModelValue) -> Self {
        let mut node = Self {
            value,
            protected: false,
        };
        node.unprotect_children();
        node
    }
}

impl From<bool> for ModelNode {
    fn from(value: bool) -> Self {
        ModelValue::Boolean(value).into()
    }
}

impl From<i32> for ModelNode {
    fn from(value: i32) -> Self {
        ModelValue::Int(value).into()
    }
}

impl From<i64> for ModelNode {
    fn from(value: i64) -> Self {
        ModelValue::Long(value).into()
    }
}

impl From<f64> for ModelNode {
    fn from(value: f64) -> Self {
        ModelValue::Double(value).into()
    }
}

impl From<&str> for ModelNode {
    fn from(value: &str) -> Self {
        ModelValue::String(value.to_string()).into()
    }
}

impl From<String> for ModelNode {
    fn from(value: String) -> Self {
        ModelValue::String(value).into()
    }
}

impl From<&String> for ModelNode {
    fn from(value: &String) -> Self {
        ModelValue::String(value.clone()).into()
    }
}

impl From<BigInt> for ModelNode {
    fn from(value: BigInt) -> Self {
        ModelValue::BigInteger(value).into()
    }
}

impl From<BigDecimal> for ModelNode {
    fn from(value: BigDecimal) -> Self {
        ModelValue::BigDecimal(value).into()
    }
}

impl From<Vec<u8>> for ModelNode {
    fn from(value: Vec<u8>) -> Self {
        ModelValue::Bytes(value).into()
    }
}

impl From<ModelType> for ModelNode {
    fn from(value: ModelType) -> Self {
        ModelValue::Type(value).into()
    }
}

impl From<Property> for ModelNode {
    fn from(value: Property) -> Self {
        ModelValue::Property(Box::new(value)).into()
    }
}

impl From<Vec<ModelNode>> for ModelNode {
    fn from(value: Vec<ModelNode>) -> Self {
        ModelValue::List(value).into()
    }
}

impl From<IndexMap<String, ModelNode>> for ModelNode {
    fn from(value: IndexMap<String, ModelNode>) -> Self {
        ModelValue::Object(value).into()
    }
}

impl FromIterator<ModelNode> for ModelNode {
    fn from_iter<I: IntoIterator<Item = ModelNode>>(iter: I) -> Self {
        ModelValue::List(iter.into_iter().collect()).into()
    }
}

impl FromIterator<(String, ModelNode)> for ModelNode {
    fn from_iter<I: IntoIterator<Item = (String, ModelNode)>>(iter: I) -> Self {
        ModelValue::Object(iter.into_iter().collect()).into()
    }
}
