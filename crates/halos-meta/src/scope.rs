//! Lookup scope

use std::fmt;

/// How metadata is looked up and fetched.
///
/// Recursive scopes want descriptions of child resources too. Optional
/// scopes tolerate metadata that can not be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    #[default]
    Normal,
    Recursive,
    Optional,
    OptionalRecursive,
}

impl Scope {
    /// Every scope, longest prefix first
    pub const ALL: [Scope; 4] = [
        Scope::OptionalRecursive,
        Scope::Recursive,
        Scope::Optional,
        Scope::Normal,
    ];

    /// Combine the two flags into a scope
    pub fn of(recursive: bool, optional: bool) -> Self {
        match (recursive, optional) {
            (false, false) => Self::Normal,
            (true, false) => Self::Recursive,
            (false, true) => Self::Optional,
            (true, true) => Self::OptionalRecursive,
        }
    }

    /// `true` for recursive and optional recursive
    pub fn is_recursive(self) -> bool {
        matches!(self, Self::Recursive | Self::OptionalRecursive)
    }

    /// `true` for optional and optional recursive
    pub fn is_optional(self) -> bool {
        matches!(self, Self::Optional | Self::OptionalRecursive)
    }

    /// Prefix used in string requests such as `opt:/subsystem=io`
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Normal => "",
            Self::Recursive => "recursive:/",
            Self::Optional => "opt:/",
            Self::OptionalRecursive => "opt+recursive:/",
        }
    }

    /// Split a prefixed template string into scope and template
    pub fn split(template: &str) -> (Self, &str) {
        for scope in Self::ALL {
            let prefix = scope.prefix();
            if !prefix.is_empty() {
                if let Some(rest) = template.strip_prefix(prefix) {
                    return (scope, rest);
                }
            }
        }
        (Self::Normal, template)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "normal",
            Self::Recursive => "recursive",
            Self::Optional => "optional",
            Self::OptionalRecursive => "optional+recursive",
        };
        f.write_str(name)
    }
}
