//! Placeholders and the statement context that assigns their values

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::trace;

use crate::error::{MetadataError, MetadataResult};

/// The selected resource of the current view. Bare use requires a key.
pub const SELECTED_RESOURCE: &str = "selected.resource";
/// The selected deployment, resolves to `deployment=<value>`
pub const SELECTED_DEPLOYMENT: &str = "selected.deployment";
/// The selected host, resolves to `host=<value>`
pub const SELECTED_HOST: &str = "selected.host";
/// The selected server, resolves to `server=<value>`
pub const SELECTED_SERVER: &str = "selected.server";
/// The selected profile, resolves to `profile=<value>`
pub const SELECTED_PROFILE: &str = "selected.profile";

/// A named variable usable as `{name}` in templates.
///
/// `resource` is the key used when the placeholder stands alone in a segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Placeholder {
    name: String,
    resource: Option<String>,
}

impl Placeholder {
    /// A placeholder that must always be used as `key={name}`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource: None,
        }
    }

    /// A placeholder that expands to `resource=<value>` when used bare
    pub fn with_resource(name: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource: Some(resource.into()),
        }
    }

    /// Placeholder name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resource type for bare use
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// `{name}`
    pub fn expression(&self) -> String {
        format!("{{{}}}", self.name)
    }

    /// The placeholders every [`CoreStatementContext`] knows
    pub fn well_known() -> Vec<Placeholder> {
        vec![
            Self::new(SELECTED_RESOURCE),
            Self::with_resource(SELECTED_DEPLOYMENT, "deployment"),
            Self::with_resource(SELECTED_HOST, "host"),
            Self::with_resource(SELECTED_SERVER, "server"),
            Self::with_resource(SELECTED_PROFILE, "profile"),
        ]
    }
}

/// Source of placeholder definitions and their current values
pub trait StatementContext: Send + Sync {
    /// Placeholder registered under `name`
    fn placeholder(&self, name: &str) -> Option<Placeholder>;

    /// Current value of `placeholder`
    fn value(&self, placeholder: &Placeholder) -> Option<String>;

    /// Look up a placeholder and its value in one go.
    ///
    /// `template` only appears in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::UnknownPlaceholder`] or
    /// [`MetadataError::UnresolvedPlaceholder`].
    fn resolve(&self, name: &str, template: &dyn std::fmt::Display) -> MetadataResult<(Placeholder, String)> {
        let placeholder = self
            .placeholder(name)
            .ok_or_else(|| MetadataError::unknown(name, template))?;
        let value = self
            .value(&placeholder)
            .ok_or_else(|| MetadataError::unresolved(name, template))?;
        Ok((placeholder, value))
    }
}

#[derive(Debug, Default)]
struct State {
    placeholders: HashMap<String, Placeholder>,
    values: HashMap<String, String>,
}

/// Thread safe statement context shared across the application
#[derive(Debug)]
pub struct CoreStatementContext {
    state: RwLock<State>,
}

impl CoreStatementContext {
    /// A context with the well-known placeholders registered and no values
    pub fn new() -> Self {
        let context = Self {
            state: RwLock::new(State::default()),
        };
        for placeholder in Placeholder::well_known() {
            context.register(placeholder);
        }
        context
    }

    /// Register or replace a placeholder
    pub fn register(&self, placeholder: Placeholder) {
        self.state
            .write()
            .placeholders
            .insert(placeholder.name.clone(), placeholder);
    }

    /// Assign a value. Unknown placeholders are ignored and `false` is returned.
    pub fn assign(&self, name: &str, value: impl Into<String>) -> bool {
        let mut state = self.state.write();
        if !state.placeholders.contains_key(name) {
            trace!(placeholder = name, "Ignoring value for unknown placeholder");
            return false;
        }
        state.values.insert(name.to_string(), value.into());
        true
    }

    /// Remove the value of a placeholder
    pub fn clear(&self, name: &str) {
        self.state.write().values.remove(name);
    }

    /// Value of the placeholder called `name`
    pub fn value_of(&self, name: &str) -> Option<String> {
        self.state.read().values.get(name).cloned()
    }
}

impl Default for CoreStatementContext {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementContext for CoreStatementContext {
    fn placeholder(&self, name: &str) -> Option<Placeholder> {
        self.state.read().placeholders.get(name).cloned()
    }

    fn value(&self, placeholder: &Placeholder) -> Option<String> {
        self.value_of(&placeholder.name)
    }
}

/// Overlay with local values on top of another context
pub struct LocalStatementContext<'a> {
    delegate: &'a dyn StatementContext,
    overrides: HashMap<String, String>,
}

impl<'a> LocalStatementContext<'a> {
    /// An overlay without overrides
    pub fn new(delegate: &'a dyn StatementContext) -> Self {
        Self {
            delegate,
            overrides: HashMap::new(),
        }
    }

    /// Override the value of `name`
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }
}

impl StatementContext for LocalStatementContext<'_> {
    fn placeholder(&self, name: &str) -> Option<Placeholder> {
        self.delegate.placeholder(name)
    }

    fn value(&self, placeholder: &Placeholder) -> Option<String> {
        self.overrides
            .get(placeholder.name())
            .cloned()
            .or_else(|| self.delegate.value(placeholder))
    }
}
