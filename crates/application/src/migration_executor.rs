//! Per-principal plan execution with grant-before-revoke ordering.

use std::sync::Arc;

use grantshift_core::MigrationError;
use grantshift_domain::{AffectedPrincipal, Principal};

use crate::migration_planner::MigrationPlan;
use crate::migration_ports::GrantDirectory;

/// Which of the two per-principal calls failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Applying the target grant failed; the principal was not changed.
    Apply,
    /// Revoking the source grant failed; the principal holds both grants.
    Revoke,
}

impl FailureStage {
    /// Returns a short label for reporting.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apply => "apply",
            Self::Revoke => "revoke",
        }
    }
}

/// One per-principal failure surfaced to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalFailure {
    /// Identity of the principal that failed.
    pub principal: AffectedPrincipal,
    /// Which call failed.
    pub stage: FailureStage,
    /// Directory error detail.
    pub detail: String,
}

/// Accumulated outcome of executing a plan.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// Principals holding the intended end state, in execution order.
    ///
    /// Includes revoke-stage failures: those principals already hold the
    /// target grant for practical access purposes.
    pub affected: Vec<AffectedPrincipal>,
    /// Per-principal failures, in execution order.
    pub failures: Vec<PrincipalFailure>,
    /// Set when the directory became unavailable mid-run and the remaining
    /// principals were not attempted.
    pub halted: Option<String>,
}

impl ExecutionResult {
    /// Returns the number of apply-stage failures.
    ///
    /// Invariant: `affected.len() == plan.principals.len() -
    /// apply_failure_count()` for a run that was not halted.
    #[must_use]
    pub fn apply_failure_count(&self) -> usize {
        self.failures
            .iter()
            .filter(|failure| failure.stage == FailureStage::Apply)
            .count()
    }

    /// Returns the revoke-stage failures left for manual cleanup.
    #[must_use]
    pub fn stale_source_grants(&self) -> impl Iterator<Item = &PrincipalFailure> {
        self.failures
            .iter()
            .filter(|failure| failure.stage == FailureStage::Revoke)
    }
}

/// Applies a resolved plan, one principal at a time.
#[derive(Clone)]
pub struct MigrationExecutor {
    directory: Arc<dyn GrantDirectory>,
}

impl MigrationExecutor {
    /// Creates an executor over the given directory.
    #[must_use]
    pub fn new(directory: Arc<dyn GrantDirectory>) -> Self {
        Self { directory }
    }

    /// Executes the plan sequentially in plan order.
    ///
    /// Per principal the target grant is applied before the source grant is
    /// revoked, so an interruption between the two calls leaves the
    /// principal dual-granted, never grant-less. Each call is attempted
    /// exactly once; retrying is an operator decision.
    pub async fn execute(&self, plan: &MigrationPlan) -> ExecutionResult {
        let mut result = ExecutionResult::default();

        for principal in &plan.principals {
            let affected = affected_identity(principal);

            if let Err(error) = self
                .directory
                .apply_grant(&plan.target.id, &principal.id)
                .await
            {
                let fatal = matches!(error, MigrationError::DirectoryUnavailable(_));
                result.failures.push(PrincipalFailure {
                    principal: affected,
                    stage: FailureStage::Apply,
                    detail: error.to_string(),
                });
                if fatal {
                    result.halted = Some(error.to_string());
                    break;
                }
                // Never revoke a grant that was not successfully replaced.
                continue;
            }

            match self
                .directory
                .revoke_grant(&plan.source.id, &principal.id)
                .await
            {
                Ok(()) => result.affected.push(affected),
                Err(error) => {
                    let fatal = matches!(error, MigrationError::DirectoryUnavailable(_));
                    result.affected.push(affected.clone());
                    result.failures.push(PrincipalFailure {
                        principal: affected,
                        stage: FailureStage::Revoke,
                        detail: error.to_string(),
                    });
                    if fatal {
                        result.halted = Some(error.to_string());
                        break;
                    }
                }
            }
        }

        result
    }
}

fn affected_identity(principal: &Principal) -> AffectedPrincipal {
    AffectedPrincipal {
        user_id: principal.id.as_str().to_owned(),
        display_name: principal.display_name.clone(),
        user_principal_name: principal
            .user_principal_name
            .clone()
            .unwrap_or_else(|| "unknown".to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use grantshift_core::{MigrationError, MigrationResult};
    use grantshift_domain::{
        GrantAssignment, GrantDefinition, GrantDefinitionId, Principal, PrincipalId,
    };

    use crate::migration_planner::MigrationPlan;
    use crate::migration_ports::GrantDirectory;

    use super::{FailureStage, MigrationExecutor};

    /// Records every mutation in call order; per-principal failures are
    /// injected by id.
    #[derive(Default)]
    struct RecordingDirectory {
        calls: Mutex<Vec<String>>,
        fail_apply_for: Option<String>,
        fail_revoke_for: Option<String>,
        unavailable_on_apply_for: Option<String>,
    }

    #[async_trait]
    impl GrantDirectory for RecordingDirectory {
        async fn list_grant_definitions(&self) -> MigrationResult<Vec<GrantDefinition>> {
            Ok(Vec::new())
        }

        async fn list_grant_assignments(&self) -> MigrationResult<Vec<GrantAssignment>> {
            Ok(Vec::new())
        }

        async fn get_principal(
            &self,
            _principal_id: &PrincipalId,
        ) -> MigrationResult<Option<Principal>> {
            Ok(None)
        }

        async fn apply_grant(
            &self,
            grant_id: &GrantDefinitionId,
            principal_id: &PrincipalId,
        ) -> MigrationResult<()> {
            self.calls
                .lock()
                .await
                .push(format!("apply:{grant_id}:{principal_id}"));
            if self.unavailable_on_apply_for.as_deref() == Some(principal_id.as_str()) {
                return Err(MigrationError::DirectoryUnavailable(
                    "connection reset".to_owned(),
                ));
            }
            if self.fail_apply_for.as_deref() == Some(principal_id.as_str()) {
                return Err(MigrationError::DirectoryRejected(
                    "assignment refused".to_owned(),
                ));
            }
            Ok(())
        }

        async fn revoke_grant(
            &self,
            grant_id: &GrantDefinitionId,
            principal_id: &PrincipalId,
        ) -> MigrationResult<()> {
            self.calls
                .lock()
                .await
                .push(format!("revoke:{grant_id}:{principal_id}"));
            if self.fail_revoke_for.as_deref() == Some(principal_id.as_str()) {
                return Err(MigrationError::DirectoryRejected(
                    "assignment missing".to_owned(),
                ));
            }
            Ok(())
        }
    }

    fn user(id: &str, name: &str) -> Principal {
        Principal {
            id: PrincipalId::new(id),
            display_name: name.to_owned(),
            user_principal_name: Some(format!("{id}@contoso.example")),
        }
    }

    fn plan(principals: Vec<Principal>) -> MigrationPlan {
        MigrationPlan {
            source: GrantDefinition {
                id: GrantDefinitionId::new("g-src"),
                display_name: "Too Many Perms".to_owned(),
            },
            target: GrantDefinition {
                id: GrantDefinitionId::new("g-dst"),
                display_name: "Just Right Perms".to_owned(),
            },
            principals,
            skipped: Vec::new(),
        }
    }

    #[tokio::test]
    async fn apply_happens_strictly_before_revoke_per_principal() {
        let directory = Arc::new(RecordingDirectory::default());
        let executor = MigrationExecutor::new(directory.clone());

        let result = executor.execute(&plan(vec![user("u-1", "Ada")])).await;

        assert_eq!(result.affected.len(), 1);
        let calls = directory.calls.lock().await;
        assert_eq!(
            calls.as_slice(),
            ["apply:g-dst:u-1", "revoke:g-src:u-1"]
        );
    }

    #[tokio::test]
    async fn failed_apply_skips_revoke_for_that_principal() {
        let directory = Arc::new(RecordingDirectory {
            fail_apply_for: Some("u-1".to_owned()),
            ..RecordingDirectory::default()
        });
        let executor = MigrationExecutor::new(directory.clone());

        let result = executor.execute(&plan(vec![user("u-1", "Ada")])).await;

        assert!(result.affected.is_empty());
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].stage, FailureStage::Apply);
        let calls = directory.calls.lock().await;
        assert!(!calls.iter().any(|call| call.starts_with("revoke")));
    }

    #[tokio::test]
    async fn affected_count_equals_plan_minus_apply_failures() {
        let directory = Arc::new(RecordingDirectory {
            fail_apply_for: Some("u-2".to_owned()),
            ..RecordingDirectory::default()
        });
        let executor = MigrationExecutor::new(directory);

        let result = executor
            .execute(&plan(vec![
                user("u-1", "Ada"),
                user("u-2", "Bob"),
                user("u-3", "Grace"),
            ]))
            .await;

        assert_eq!(result.affected.len(), 3 - result.apply_failure_count());
        let ids: Vec<&str> = result
            .affected
            .iter()
            .map(|affected| affected.user_id.as_str())
            .collect();
        assert_eq!(ids, vec!["u-1", "u-3"]);
    }

    #[tokio::test]
    async fn revoke_failure_still_counts_principal_as_affected() {
        let directory = Arc::new(RecordingDirectory {
            fail_revoke_for: Some("u-1".to_owned()),
            ..RecordingDirectory::default()
        });
        let executor = MigrationExecutor::new(directory);

        let result = executor.execute(&plan(vec![user("u-1", "Ada")])).await;

        assert_eq!(result.affected.len(), 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].stage, FailureStage::Revoke);
        assert_eq!(result.stale_source_grants().count(), 1);
        assert_eq!(result.apply_failure_count(), 0);
    }

    #[tokio::test]
    async fn directory_unavailable_halts_remaining_principals() {
        let directory = Arc::new(RecordingDirectory {
            unavailable_on_apply_for: Some("u-2".to_owned()),
            ..RecordingDirectory::default()
        });
        let executor = MigrationExecutor::new(directory.clone());

        let result = executor
            .execute(&plan(vec![
                user("u-1", "Ada"),
                user("u-2", "Bob"),
                user("u-3", "Grace"),
            ]))
            .await;

        assert_eq!(result.affected.len(), 1);
        assert!(result.halted.is_some());
        let calls = directory.calls.lock().await;
        assert!(!calls.iter().any(|call| call.ends_with(":u-3")));
    }
}
