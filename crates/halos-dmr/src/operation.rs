//! Management operations
//!
//! An [`Operation`] is a name, a [`ResourceAddress`] and optional parameters and
//! headers. A [`Composite`] bundles several operations into one atomic
//! `composite` request whose results come back as `step-1` .. `step-N`.

use indexmap::IndexMap;

use crate::address::ResourceAddress;
use crate::constants::{ADDRESS, COMPOSITE, OPERATION, OPERATION_HEADERS, STEPS};
use crate::error::{DmrError, DmrResult};
use crate::model::{ModelNode, ModelValue};

/// A single management operation. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    name: String,
    address: ResourceAddress,
    parameters: IndexMap<String, ModelNode>,
    headers: IndexMap<String, ModelNode>,
}

impl Operation {
    /// Start building an operation
    pub fn builder(address: ResourceAddress, name: impl Into<String>) -> OperationBuilder {
        OperationBuilder {
            operation: Operation {
                name: name.into(),
                address,
                parameters: IndexMap::new(),
                headers: IndexMap::new(),
            },
        }
    }

    /// Operation name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target address
    pub fn address(&self) -> &ResourceAddress {
        &self.address
    }

    /// Parameters in insertion order
    pub fn parameters(&self) -> &IndexMap<String, ModelNode> {
        &self.parameters
    }

    /// A single parameter
    pub fn parameter(&self, name: &str) -> Option<&ModelNode> {
        self.parameters.get(name)
    }

    /// Whether a parameter is present
    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    /// Operation headers
    pub fn headers(&self) -> &IndexMap<String, ModelNode> {
        &self.headers
    }

    /// The DMR request node: `{operation, address, params..., operation-headers}`
    pub fn to_model_node(&self) -> ModelNode {
        let mut map = IndexMap::with_capacity(self.parameters.len() + 3);
        map.insert(OPERATION.to_string(), ModelNode::from(self.name.as_str()));
        map.insert(ADDRESS.to_string(), self.address.to_model_node());
        for (key, value) in &self.parameters {
            map.insert(key.clone(), value.clone());
        }
        if !self.headers.is_empty() {
            map.insert(
                OPERATION_HEADERS.to_string(),
                ModelNode::from(self.headers.clone()),
            );
        }
        ModelNode::from(map)
    }

    /// Render in management CLI syntax, e.g.
    /// `/subsystem=io/worker=default:read-resource(include-runtime=true)`.
    /// The address is omitted for root; string values are not quoted.
    pub fn as_cli(&self) -> String {
        let mut cli = String::new();
        if !self.address.is_empty() {
            cli.push_str(&self.address.to_string());
        }
        cli.push(':');
        cli.push_str(&self.name);
        if !self.parameters.is_empty() {
            let params: Vec<String> = self
                .parameters
                .iter()
                .map(|(key, value)| format!("{key}={}", cli_value(value)))
                .collect();
            cli.push('(');
            cli.push_str(&params.join(","));
            cli.push(')');
        }
        cli
    }
}

fn cli_value(value: &ModelNode) -> String {
    match value.value() {
        ModelValue::List(list) => {
            let items: Vec<String> = list.iter().map(cli_value).collect();
            format!("[{}]", items.join(","))
        }
        ModelValue::Object(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{k}={}", cli_value(v)))
                .collect();
            format!("{{{}}}", entries.join(","))
        }
        ModelValue::Property(p) => format!("{}={}", p.name(), cli_value(p.value())),
        _ => value
            .as_string()
            .unwrap_or_else(|_| value.to_compact_string()),
    }
}

/// Parse a DMR request node. A node naming the `composite` operation keeps its
/// `steps` as a plain parameter; use [`Composite::try_from`] to get the steps.
impl TryFrom<&ModelNode> for Operation {
    type Error = DmrError;

    fn try_from(node: &ModelNode) -> DmrResult<Self> {
        let name = node
            .child(OPERATION)
            .and_then(ModelNode::as_str)
            .ok_or_else(|| DmrError::invalid_operation("missing operation name"))?;
        let address = match node.child(ADDRESS) {
            Some(address) => ResourceAddress::try_from(address)?,
            None => ResourceAddress::root(),
        };
        let mut builder = Operation::builder(address, name);
        for (key, value) in node.as_object()? {
            match key.as_str() {
                OPERATION | ADDRESS => {}
                OPERATION_HEADERS => {
                    for header in value.as_property_list_or_empty() {
                        let (name, value) = header.into_parts();
                        builder = builder.header(name, value);
                    }
                }
                _ => builder = builder.param(key.clone(), value.clone()),
            }
        }
        Ok(builder.build())
    }
}

/// Fluent builder for [`Operation`]
#[derive(Debug, Clone)]
pub struct OperationBuilder {
    operation: Operation,
}

impl OperationBuilder {
    /// Add or replace a parameter
    pub fn param(mut self, name: impl Into<String>, value: impl Into<ModelNode>) -> Self {
        self.operation.parameters.insert(name.into(), value.into());
        self
    }

    /// Add or replace an operation header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<ModelNode>) -> Self {
        self.operation.headers.insert(name.into(), value.into());
        self
    }

    /// Finish building
    pub fn build(self) -> Operation {
        self.operation
    }
}

/// An ordered batch of operations executed atomically
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composite {
    steps: Vec<Operation>,
    headers: IndexMap<String, ModelNode>,
}

impl Composite {
    /// Create a composite from its steps
    pub fn new(steps: Vec<Operation>) -> Self {
        Self {
            steps,
            headers: IndexMap::new(),
        }
    }

    /// Append a step
    pub fn add(&mut self, operation: Operation) {
        self.steps.push(operation);
    }

    /// Add or replace a header on the composite itself
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<ModelNode>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Steps in submission order
    pub fn steps(&self) -> &[Operation] {
        &self.steps
    }

    /// Step at `index` (zero based)
    pub fn step(&self, index: usize) -> Option<&Operation> {
        self.steps.get(index)
    }

    /// Iterate steps in submission order
    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.steps.iter()
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// `true` without steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The composite as a plain operation at root with a `steps` list parameter
    pub fn to_operation(&self) -> Operation {
        let steps: ModelNode = self.steps.iter().map(Operation::to_model_node).collect();
        let mut builder = Operation::builder(ResourceAddress::root(), COMPOSITE).param(STEPS, steps);
        for (name, value) in &self.headers {
            builder = builder.header(name.clone(), value.clone());
        }
        builder.build()
    }

    /// The DMR request node
    pub fn to_model_node(&self) -> ModelNode {
        self.to_operation().to_model_node()
    }

    /// One CLI line per step, joined by newlines
    pub fn as_cli(&self) -> String {
        self.steps
            .iter()
            .map(Operation::as_cli)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl<'a> IntoIterator for &'a Composite {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

impl From<Vec<Operation>> for Composite {
    fn from(steps: Vec<Operation>) -> Self {
        Self::new(steps)
    }
}

impl FromIterator<Operation> for Composite {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl TryFrom<&ModelNode> for Composite {
    type Error = DmrError;

    fn try_from(node: &ModelNode) -> DmrResult<Self> {
        let operation = Operation::try_from(node)?;
        if operation.name() != COMPOSITE {
            return Err(DmrError::invalid_operation(format!(
                "expected '{COMPOSITE}', found '{}'",
                operation.name()
            )));
        }
        let steps = operation
            .parameter(STEPS)
            .map(ModelNode::elements)
            .unwrap_or_default()
            .iter()
            .map(Operation::try_from)
            .collect::<DmrResult<Vec<_>>>()?;
        Ok(Self {
            steps,
            headers: operation.headers().clone(),
        })
    }
}

/// Step results of an executed [`Composite`]
///
/// Keeps the composite so step `i`'s result can be matched to step `i`'s
/// operation.
#[derive(Debug, Clone)]
pub struct CompositeResult {
    composite: Composite,
    steps: ModelNode,
}

impl CompositeResult {
    /// Wrap the `result` node of a composite response (an object with
    /// `step-1` .. `step-N` keys)
    pub fn new(composite: Composite, steps: ModelNode) -> Self {
        Self { composite, steps }
    }

    /// The originating composite
    pub fn composite(&self) -> &Composite {
        &self.composite
    }

    /// Operation of step `index` (zero based)
    pub fn operation(&self, index: usize) -> Option<&Operation> {
        self.composite.step(index)
    }

    /// Response of step `index` (zero based), including its `outcome`
    pub fn step(&self, index: usize) -> Option<&ModelNode> {
        self.steps.child(&step_key(index))
    }

    /// `(operation, step response)` pairs in submission order. Steps missing from
    /// the response are skipped.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Operation, &ModelNode)> {
        self.composite
            .iter()
            .enumerate()
            .filter_map(|(index, operation)| self.step(index).map(|step| (index, operation, step)))
    }

    /// Number of steps in the originating composite
    pub fn len(&self) -> usize {
        self.composite.len()
    }

    /// `true` if the composite had no steps
    pub fn is_empty(&self) -> bool {
        self.composite.is_empty()
    }

    /// The raw step results
    pub fn steps(&self) -> &ModelNode {
        &self.steps
    }
}

/// `step-N` key of the zero based step `index`
pub fn step_key(index: usize) -> String {
    format!("step-{}", index + 1)
}
