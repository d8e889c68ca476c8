//! Ports consumed by the migration services.

use async_trait::async_trait;

use grantshift_core::MigrationResult;
use grantshift_domain::{
    GrantAssignment, GrantDefinition, GrantDefinitionId, MigrationLog, MigrationRecord, Principal,
    PrincipalId,
};

/// Directory port for grant discovery and mutation.
///
/// Permanent principal absence surfaces as `Ok(None)` from
/// [`get_principal`](Self::get_principal); transient failures (network,
/// auth, throttling) surface as [`grantshift_core::MigrationError::DirectoryUnavailable`].
#[async_trait]
pub trait GrantDirectory: Send + Sync {
    /// Lists every grant definition in tenant scope.
    async fn list_grant_definitions(&self) -> MigrationResult<Vec<GrantDefinition>>;

    /// Lists every direct principal-to-grant assignment in tenant scope.
    async fn list_grant_assignments(&self) -> MigrationResult<Vec<GrantAssignment>>;

    /// Resolves a principal to its identity snapshot, or `None` if the
    /// principal no longer exists as an addressable identity.
    async fn get_principal(&self, principal_id: &PrincipalId)
    -> MigrationResult<Option<Principal>>;

    /// Applies a grant to a principal. Exactly one attempt per call.
    async fn apply_grant(
        &self,
        grant_id: &GrantDefinitionId,
        principal_id: &PrincipalId,
    ) -> MigrationResult<()>;

    /// Revokes a grant from a principal. Exactly one attempt per call.
    async fn revoke_grant(
        &self,
        grant_id: &GrantDefinitionId,
        principal_id: &PrincipalId,
    ) -> MigrationResult<()>;
}

/// Persistence port for the append-only migration log.
#[async_trait]
pub trait MigrationStateStore: Send + Sync {
    /// Loads the full migration log. A store with no prior runs returns an
    /// empty log, not an error.
    async fn load_log(&self) -> MigrationResult<MigrationLog>;

    /// Appends a record to the log. Never truncates prior records.
    async fn append_record(&self, record: MigrationRecord) -> MigrationResult<()>;
}
