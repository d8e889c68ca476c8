//! Grant definitions and assignments as reported by the directory.

use serde::{Deserialize, Serialize};

use crate::principal::{PrincipalId, PrincipalType};

/// Opaque identifier of a grant definition within the directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrantDefinitionId(String);

impl GrantDefinitionId {
    /// Creates a grant definition identifier from a directory value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for GrantDefinitionId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A named privilege assignable to principals.
///
/// Display names are unique within tenant scope; name-to-identifier
/// resolution is exact-match only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantDefinition {
    /// Stable directory identifier.
    pub id: GrantDefinitionId,
    /// Human-readable name, unique in tenant scope.
    pub display_name: String,
}

/// A direct principal-to-grant binding reported by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantAssignment {
    /// Principal holding the grant.
    pub principal_id: PrincipalId,
    /// Grant definition being held.
    pub grant_definition_id: GrantDefinitionId,
    /// Directory type of the principal (user, group, service principal).
    pub principal_type: PrincipalType,
}
