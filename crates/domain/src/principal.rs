//! Principal identities and per-principal resolution outcomes.

use serde::{Deserialize, Serialize};

/// Opaque identifier of a principal within the directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Creates a principal identifier from a directory value.
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

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Directory type discriminator attached to a grant assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalType {
    /// A plain user identity record.
    User,
    /// A directory group.
    Group,
    /// A service principal.
    ServicePrincipal,
    /// Any other directory object type, carrying the raw discriminator.
    Other(String),
}

impl PrincipalType {
    /// Parses a directory type discriminator such as `#microsoft.graph.user`.
    #[must_use]
    pub fn from_directory_type(value: &str) -> Self {
        match value.rsplit('.').next() {
            Some("user") => Self::User,
            Some("group") => Self::Group,
            Some("servicePrincipal") => Self::ServicePrincipal,
            _ => Self::Other(value.to_owned()),
        }
    }

    /// Returns a short label for reporting.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::ServicePrincipal => "service principal",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

/// Read-only snapshot of a directory identity, fetched fresh per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Stable directory identifier.
    pub id: PrincipalId,
    /// Human-readable name.
    pub display_name: String,
    /// Stable external login key; absent for non-addressable identities.
    pub user_principal_name: Option<String>,
}

/// Why a candidate principal was excluded from a migration plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The principal no longer exists in the directory.
    NotFound,
    /// The assignment's principal is not a plain user identity.
    NonUserPrincipal(PrincipalType),
    /// The principal resolved but carries no external login key.
    MissingLoginKey,
    /// The principal no longer holds the grant being migrated away from.
    NoLongerHoldsGrant,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(formatter, "principal no longer exists"),
            Self::NonUserPrincipal(principal_type) => {
                write!(formatter, "not a user identity ({})", principal_type.as_str())
            }
            Self::MissingLoginKey => write!(formatter, "no external login key"),
            Self::NoLongerHoldsGrant => write!(formatter, "no longer holds the source grant"),
        }
    }
}

/// A principal excluded from a plan, with an inspectable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPrincipal {
    /// Identifier of the excluded principal.
    pub principal_id: PrincipalId,
    /// Why it was excluded.
    pub reason: SkipReason,
}

/// Outcome of resolving one candidate principal for a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalResolution {
    /// The principal resolved to an addressable user identity.
    Resolved(Principal),
    /// The principal was excluded; the reason is carried for reporting.
    Skipped(SkippedPrincipal),
}
