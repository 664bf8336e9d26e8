//! Policy definitions.
//!
//! A policy is a named rule: an effect, the permissions it governs, a guard
//! expression, and the set of tables the guard needs. Policies are
//! configuration data; they are built once and never mutated by the engine.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::expression::Expression;

// ============================================================================
// Effect
// ============================================================================

/// The effect of a policy whose guard is true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Effect {
    /// Grant access.
    Allow,
    /// Deny access.
    Deny,
}

impl Default for Effect {
    /// Defaults to `Deny` (deny unless explicitly allowed).
    fn default() -> Self {
        Self::Deny
    }
}

impl Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Allow => f.write_str("ALLOW"),
            Effect::Deny => f.write_str("DENY"),
        }
    }
}

// ============================================================================
// Permission
// ============================================================================

/// Opaque permission identifier, e.g. `CAN_VIEW`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    /// Creates a permission from a static string, usable in `const` items.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Permission {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for Permission {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

// ============================================================================
// Policy
// ============================================================================

/// Error describing a malformed policy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("policy name must not be empty")]
    EmptyName,

    #[error("policy '{0}' governs no permissions")]
    NoPermissions(String),

    /// The guard reads tables the policy does not declare; those predicates
    /// would always resolve to UNKNOWN.
    #[error("policy '{policy}' references undeclared tables: {}", tables.join(", "))]
    UndeclaredTables { policy: String, tables: Vec<String> },
}

/// A named access rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Unique identifier within an engine.
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub effect: Effect,
    /// Permissions this policy governs.
    pub permissions: BTreeSet<Permission>,
    /// Condition under which the effect applies.
    pub guard: Expression,
    /// Tables the guard may read. Trusted as declared; see
    /// [`Policy::undeclared_tables`].
    #[serde(default)]
    pub required_data: BTreeSet<String>,
}

impl Policy {
    /// Creates a policy with no permissions and no declared tables.
    pub fn new(name: impl Into<String>, effect: Effect, guard: Expression) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            effect,
            permissions: BTreeSet::new(),
            guard,
            required_data: BTreeSet::new(),
        }
    }

    /// Shorthand for an `Allow` policy.
    pub fn allow(name: impl Into<String>, guard: Expression) -> Self {
        Self::new(name, Effect::Allow, guard)
    }

    /// Shorthand for a `Deny` policy.
    pub fn deny(name: impl Into<String>, guard: Expression) -> Self {
        Self::new(name, Effect::Deny, guard)
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<Permission>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    #[must_use]
    pub fn with_permissions<P: Into<Permission>>(
        mut self,
        permissions: impl IntoIterator<Item = P>,
    ) -> Self {
        self.permissions.extend(permissions.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_required_data<T: Into<String>>(
        mut self,
        tables: impl IntoIterator<Item = T>,
    ) -> Self {
        self.required_data.extend(tables.into_iter().map(Into::into));
        self
    }

    /// Whether this policy applies to `permission`.
    pub fn governs(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
    }

    /// Tables the guard references that `required_data` does not declare.
    pub fn undeclared_tables(&self) -> BTreeSet<String> {
        self.guard
            .referenced_tables()
            .into_iter()
            .filter(|table| !self.required_data.contains(table))
            .collect()
    }

    /// Checks the structural invariants of the policy.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant: empty name, no permissions, or
    /// a guard reading undeclared tables.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.name.trim().is_empty() {
            return Err(PolicyError::EmptyName);
        }
        if self.permissions.is_empty() {
            return Err(PolicyError::NoPermissions(self.name.clone()));
        }
        let undeclared = self.undeclared_tables();
        if !undeclared.is_empty() {
            return Err(PolicyError::UndeclaredTables {
                policy: self.name.clone(),
                tables: undeclared.into_iter().collect(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Requirements
// ============================================================================

/// Union of the declared `required_data` of `policies`.
///
/// Trusts the declarations and does not walk the guards.
pub fn collect_required_tables<'a>(
    policies: impl IntoIterator<Item = &'a Policy>,
) -> BTreeSet<String> {
    policies
        .into_iter()
        .flat_map(|policy| policy.required_data.iter().cloned())
        .collect()
}

/// How an engine treats a policy whose guard reads undeclared tables when
/// the policy is added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementCheck {
    /// Skip the check.
    Off,
    /// Log a warning and accept the policy.
    #[default]
    Warn,
    /// Refuse the policy.
    Reject,
}

// ============================================================================
// Tests
// ============================================================================
