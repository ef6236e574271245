use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Name of the default (main) history. Never a lane object.
pub const MAIN_LANE: &str = "main";

/// Logical identity of a component.
///
/// Identity is `(namespace, name)`; the optional `scope` is attached when the
/// component is exported to a remote scope. Two ids with the same namespace
/// and name address the same component whatever their scope, which is what
/// [`ComponentId::key`] encodes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    namespace: String,
    name: String,
}

impl ComponentId {
    /// Create an unscoped component id. `namespace` may be empty.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self, TypeError> {
        let id = Self {
            scope: None,
            namespace: namespace.into(),
            name: name.into(),
        };
        id.validate()?;
        Ok(id)
    }

    /// Parse an unscoped id of the form `namespace/name` or `name`.
    ///
    /// Everything before the last `/` is the namespace.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        match s.rsplit_once('/') {
            Some((namespace, name)) => Self::new(namespace, name),
            None => Self::new("", s),
        }
    }

    /// Return a copy of this id qualified with `scope`.
    pub fn with_scope(&self, scope: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
            ..self.clone()
        }
    }

    /// Return a copy of this id without a scope.
    pub fn without_scope(&self) -> Self {
        Self {
            scope: None,
            ..self.clone()
        }
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }

    /// The scope-independent identity key: `namespace/name` or `name`.
    pub fn key(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.namespace, self.name)
        }
    }

    /// Returns `true` if both ids name the same logical component.
    pub fn same_component(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.name == other.name
    }

    fn validate(&self) -> Result<(), TypeError> {
        let invalid = |reason: &str| TypeError::InvalidComponentId {
            id: self.key(),
            reason: reason.into(),
        };
        if self.name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if self.name.contains('/') {
            return Err(invalid("name cannot contain '/'"));
        }
        if !self.namespace.is_empty() && self.namespace.split('/').any(str::is_empty) {
            return Err(invalid("namespace has an empty segment"));
        }
        let all = self.namespace.chars().chain(self.name.chars());
        for c in all {
            if c.is_whitespace() || c.is_control() || matches!(c, '@' | ':' | '\\' | '*' | '+') {
                return Err(invalid(&format!("character {c:?} is not allowed")));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({self})")
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scope) = &self.scope {
            write!(f, "{scope}/")?;
        }
        write!(f, "{}", self.key())
    }
}

/// Identity of a lane: a lane name, optionally qualified by the scope it was
/// exported to.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LaneId {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    name: String,
}

impl LaneId {
    /// Create a local lane id.
    ///
    /// Lane names follow branch naming rules: non-empty, no whitespace, no
    /// `/`, no `..`, and `main` is reserved for the default history.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        let invalid = |reason: &str| TypeError::InvalidLaneName {
            name: name.clone(),
            reason: reason.into(),
        };
        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name == MAIN_LANE {
            return Err(invalid("'main' is reserved"));
        }
        if name.contains("..") {
            return Err(invalid("cannot contain '..'"));
        }
        if name.starts_with('-') || name.starts_with('.') {
            return Err(invalid("cannot start with '-' or '.'"));
        }
        let forbidden = |c: char| {
            c.is_whitespace()
                || c.is_control()
                || matches!(c, '/' | '~' | '^' | ':' | '?' | '*' | '[' | '\\')
        };
        if name.chars().any(forbidden) {
            return Err(invalid("contains a forbidden character"));
        }
        Ok(Self { scope: None, name })
    }

    /// Parse `name` or `scope/name`.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        match s.rsplit_once('/') {
            Some((scope, name)) => Ok(Self::new(name)?.with_scope(scope)),
            None => Self::new(s),
        }
    }

    pub fn with_scope(&self, scope: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
            name: self.name.clone(),
        }
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LaneId({self})")
    }
}

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{scope}/{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}
