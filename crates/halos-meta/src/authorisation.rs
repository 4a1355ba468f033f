//! Access decisions for RBAC aware callers
//!
//! A [`Constraint`] names a permission on an attribute or operation of a
//! template, written as `executable(subsystem=io/worker=*:add)` or
//! `writable(subsystem=io/worker=*@io-threads)`. An [`AuthorisationDecision`]
//! checks constraints against security contexts.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::error;

use crate::error::MetadataError;
use crate::registry::MetadataRegistry;
use crate::scope::Scope;
use crate::security::SecurityContext;
use crate::template::AddressTemplate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Readable,
    Writable,
    Executable,
}

impl Permission {
    fn name(self) -> &'static str {
        match self {
            Self::Readable => "readable",
            Self::Writable => "writable",
            Self::Executable => "executable",
        }
    }
}

/// What a constraint is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Attribute,
    Operation,
}

/// A single permission requirement
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constraint {
    pub template: AddressTemplate,
    pub target: Target,
    pub name: String,
    pub permission: Permission,
}

impl Constraint {
    /// `executable(template:operation)`
    pub fn executable(template: AddressTemplate, operation: impl Into<String>) -> Self {
        Self {
            template,
            target: Target::Operation,
            name: operation.into(),
            permission: Permission::Executable,
        }
    }

    /// `writable(template@attribute)`
    pub fn writable(template: AddressTemplate, attribute: impl Into<String>) -> Self {
        Self {
            template,
            target: Target::Attribute,
            name: attribute.into(),
            permission: Permission::Writable,
        }
    }

    /// `readable(template@attribute)`
    pub fn readable(template: AddressTemplate, attribute: impl Into<String>) -> Self {
        Self {
            template,
            target: Target::Attribute,
            name: attribute.into(),
            permission: Permission::Readable,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = match self.target {
            Target::Attribute => '@',
            Target::Operation => ':',
        };
        write!(
            f,
            "{}({}{}{})",
            self.permission.name(),
            self.template,
            separator,
            self.name
        )
    }
}

impl FromStr for Constraint {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MetadataError::InvalidConstraint(s.to_string());
        let (permission, rest) = s.trim().split_once('(').ok_or_else(invalid)?;
        let inner = rest.strip_suffix(')').ok_or_else(invalid)?;
        let permission = match permission {
            "readable" => Permission::Readable,
            "writable" => Permission::Writable,
            "executable" => Permission::Executable,
            _ => return Err(invalid()),
        };
        let (template, target, name) = if let Some((template, attribute)) = inner.rsplit_once('@') {
            (template, Target::Attribute, attribute)
        } else if let Some((template, operation)) = inner.rsplit_once(':') {
            (template, Target::Operation, operation)
        } else {
            return Err(invalid());
        };
        if name.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            template: AddressTemplate::of(template),
            target,
            name: name.to_string(),
            permission,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    #[default]
    And,
    Or,
}

impl Operator {
    fn symbol(self) -> char {
        match self {
            Self::And => '&',
            Self::Or => '|',
        }
    }
}

/// Constraints joined by one operator
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Constraints {
    constraints: Vec<Constraint>,
    operator: Operator,
}

impl Constraints {
    pub fn single(constraint: Constraint) -> Self {
        Self::and([constraint])
    }

    pub fn and(constraints: impl IntoIterator<Item = Constraint>) -> Self {
        Self::of(constraints, Operator::And)
    }

    pub fn or(constraints: impl IntoIterator<Item = Constraint>) -> Self {
        Self::of(constraints, Operator::Or)
    }

    fn of(constraints: impl IntoIterator<Item = Constraint>, operator: Operator) -> Self {
        let mut unique = Vec::new();
        for constraint in constraints {
            if !unique.contains(&constraint) {
                unique.push(constraint);
            }
        }
        Self {
            constraints: unique,
            operator,
        }
    }

    /// Parse constraints joined by `&` or `|`. Malformed parts are dropped.
    pub fn parse(input: &str) -> Self {
        let operator = if input.contains('|') && !input.contains('&') {
            Operator::Or
        } else {
            Operator::And
        };
        let constraints = input
            .split(operator.symbol())
            .filter(|part| !part.trim().is_empty())
            .filter_map(|part| part.parse().ok());
        Self::of(constraints, operator)
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Constraint> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

impl fmt::Display for Constraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, constraint) in self.constraints.iter().enumerate() {
            if index > 0 {
                write!(f, "{}", self.operator.symbol())?;
            }
            write!(f, "{constraint}")?;
        }
        Ok(())
    }
}

/// How the server controls access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessControlProvider {
    /// Every authenticated user may do everything
    #[default]
    Simple,
    /// Role based access control
    Rbac,
}

/// Decides constraints against the security contexts returned by `lookup`
pub struct AuthorisationDecision<F> {
    provider: AccessControlProvider,
    lookup: F,
}

impl<F> AuthorisationDecision<F>
where
    F: Fn(&AddressTemplate) -> Option<Arc<SecurityContext>>,
{
    pub fn new(provider: AccessControlProvider, lookup: F) -> Self {
        Self { provider, lookup }
    }

    /// `true` if the constraint holds. Unknown security contexts deny.
    pub fn is_allowed(&self, constraint: &Constraint) -> bool {
        if self.provider == AccessControlProvider::Simple {
            return true;
        }
        let Some(context) = (self.lookup)(&constraint.template) else {
            return false;
        };
        match (constraint.target, constraint.permission) {
            (Target::Operation, Permission::Executable) => context.is_executable(&constraint.name),
            (Target::Attribute, Permission::Readable) => context.is_readable_attribute(&constraint.name),
            (Target::Attribute, Permission::Writable) => context.is_writable_attribute(&constraint.name),
            _ => {
                error!(%constraint, "Unsupported permission for constraint target");
                false
            }
        }
    }

    /// Combine the constraints with their operator. Empty constraints allow.
    pub fn is_allowed_all(&self, constraints: &Constraints) -> bool {
        if self.provider == AccessControlProvider::Simple || constraints.is_empty() {
            return true;
        }
        match constraints.operator() {
            Operator::And => constraints.iter().all(|c| self.is_allowed(c)),
            Operator::Or => constraints.iter().any(|c| self.is_allowed(c)),
        }
    }
}

/// A decision backed by the registry caches. Nothing is fetched.
pub fn registry_decision(
    provider: AccessControlProvider,
    registry: &MetadataRegistry,
) -> AuthorisationDecision<impl Fn(&AddressTemplate) -> Option<Arc<SecurityContext>> + '_> {
    AuthorisationDecision::new(provider, move |template: &AddressTemplate| {
        let metadata = registry.lookup(template, Scope::Normal).ok()?;
        metadata
            .has_security_context()
            .then(|| Arc::new(metadata.security_context().clone()))
    })
}
