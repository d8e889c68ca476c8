//! Plan resolution: grant identifiers and the current principal set.

use std::collections::HashSet;
use std::sync::Arc;

use grantshift_core::{GrantName, MigrationError, MigrationResult};
use grantshift_domain::{
    GrantDefinition, MigrationRecord, Principal, PrincipalId, PrincipalResolution, PrincipalType,
    SkipReason, SkippedPrincipal,
};

use crate::migration_ports::GrantDirectory;

/// Resolved inputs for one migration run.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    /// Grant principals are moved away from.
    pub source: GrantDefinition,
    /// Grant principals are moved onto.
    pub target: GrantDefinition,
    /// Principals to migrate, in directory enumeration order.
    pub principals: Vec<Principal>,
    /// Candidates excluded from the plan, with inspectable reasons.
    pub skipped: Vec<SkippedPrincipal>,
}

impl MigrationPlan {
    /// Returns true when no principal holds the source grant.
    ///
    /// An empty plan is a valid terminal state, not an error.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}

/// Resolves grant identifiers and the current holder set for a run.
#[derive(Clone)]
pub struct MigrationPlanner {
    directory: Arc<dyn GrantDirectory>,
}

impl MigrationPlanner {
    /// Creates a planner over the given directory.
    #[must_use]
    pub fn new(directory: Arc<dyn GrantDirectory>) -> Self {
        Self { directory }
    }

    /// Resolves a forward plan: all addressable direct holders of
    /// `source_name`, to be moved onto `target_name`.
    pub async fn resolve_plan(
        &self,
        source_name: &GrantName,
        target_name: &GrantName,
    ) -> MigrationResult<MigrationPlan> {
        let source = self.resolve_grant(source_name.as_str()).await?;
        let target = self.resolve_grant(target_name.as_str()).await?;

        let assignments = self.directory.list_grant_assignments().await?;

        let mut principals = Vec::new();
        let mut skipped = Vec::new();
        let mut seen: HashSet<PrincipalId> = HashSet::new();

        for assignment in assignments
            .into_iter()
            .filter(|assignment| assignment.grant_definition_id == source.id)
        {
            if !seen.insert(assignment.principal_id.clone()) {
                continue;
            }

            let resolution = self
                .resolve_candidate(assignment.principal_id, assignment.principal_type)
                .await?;
            match resolution {
                PrincipalResolution::Resolved(principal) => principals.push(principal),
                PrincipalResolution::Skipped(skip) => skipped.push(skip),
            }
        }

        Ok(MigrationPlan {
            source,
            target,
            principals,
            skipped,
        })
    }

    /// Resolves a rollback plan from a persisted record.
    ///
    /// The record's endpoints are swapped: principals move from the
    /// record's `to_role` back onto its `from_role`. Plan principals come
    /// from the record's affected users, re-resolved against the live
    /// directory; they are not re-enumerated from grant membership.
    pub async fn resolve_rollback_plan(
        &self,
        record: &MigrationRecord,
    ) -> MigrationResult<MigrationPlan> {
        let source = self.resolve_grant(record.to_role.as_str()).await?;
        let target = self.resolve_grant(record.from_role.as_str()).await?;

        let assignments = self.directory.list_grant_assignments().await?;
        let holders: HashSet<&str> = assignments
            .iter()
            .filter(|assignment| assignment.grant_definition_id == source.id)
            .map(|assignment| assignment.principal_id.as_str())
            .collect();

        let mut principals = Vec::new();
        let mut skipped = Vec::new();

        for affected in &record.affected_users {
            let principal_id = PrincipalId::new(affected.user_id.clone());

            if !holders.contains(principal_id.as_str()) {
                skipped.push(SkippedPrincipal {
                    principal_id,
                    reason: SkipReason::NoLongerHoldsGrant,
                });
                continue;
            }

            match self.directory.get_principal(&principal_id).await? {
                Some(principal) => principals.push(principal),
                None => skipped.push(SkippedPrincipal {
                    principal_id,
                    reason: SkipReason::NotFound,
                }),
            }
        }

        Ok(MigrationPlan {
            source,
            target,
            principals,
            skipped,
        })
    }

    /// Resolves a grant definition by exact display name.
    ///
    /// No fuzzy or partial matching: a missing name is `GrantNotFound`, a
    /// duplicated name is a validation error rather than a silent pick.
    async fn resolve_grant(&self, name: &str) -> MigrationResult<GrantDefinition> {
        let definitions = self.directory.list_grant_definitions().await?;
        let mut matches = definitions
            .into_iter()
            .filter(|definition| definition.display_name == name);

        let Some(definition) = matches.next() else {
            return Err(MigrationError::GrantNotFound(name.to_owned()));
        };

        if matches.next().is_some() {
            return Err(MigrationError::Validation(format!(
                "grant name '{name}' matches more than one definition"
            )));
        }

        Ok(definition)
    }

    /// Resolves one assignment candidate to a tagged result.
    async fn resolve_candidate(
        &self,
        principal_id: PrincipalId,
        principal_type: PrincipalType,
    ) -> MigrationResult<PrincipalResolution> {
        if principal_type != PrincipalType::User {
            return Ok(PrincipalResolution::Skipped(SkippedPrincipal {
                principal_id,
                reason: SkipReason::NonUserPrincipal(principal_type),
            }));
        }

        let Some(principal) = self.directory.get_principal(&principal_id).await? else {
            return Ok(PrincipalResolution::Skipped(SkippedPrincipal {
                principal_id,
                reason: SkipReason::NotFound,
            }));
        };

        if principal.user_principal_name.is_none() {
            return Ok(PrincipalResolution::Skipped(SkippedPrincipal {
                principal_id,
                reason: SkipReason::MissingLoginKey,
            }));
        }

        Ok(PrincipalResolution::Resolved(principal))
    }
}
