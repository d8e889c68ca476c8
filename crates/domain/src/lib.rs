//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod grant;
mod migration;
mod principal;

pub use grant::{GrantAssignment, GrantDefinition, GrantDefinitionId};
pub use migration::{
    AffectedPrincipal, MigrationDirection, MigrationLog, MigrationRecord,
};
pub use principal::{
    Principal, PrincipalId, PrincipalResolution, PrincipalType, SkipReason, SkippedPrincipal,
};
