//! Orchestration of a single migration invocation.
//!
//! One invocation walks `Idle -> PlanResolved -> (DryRunRendered |
//! Executing) -> Persisted -> Done`. Plan resolution always happens, even
//! for zero principals; execution and persistence happen only on live runs
//! with a non-empty plan.

use std::sync::Arc;

use chrono::Utc;

use grantshift_core::{GrantName, MigrationError, MigrationResult};
use grantshift_domain::{MigrationDirection, MigrationRecord};

use crate::migration_executor::{ExecutionResult, MigrationExecutor};
use crate::migration_planner::{MigrationPlan, MigrationPlanner};
use crate::migration_ports::{GrantDirectory, MigrationStateStore};

/// Caller-selected mode for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationOptions {
    /// Forward or rollback.
    pub direction: MigrationDirection,
    /// When set, resolve and render the plan without mutating anything.
    pub dry_run: bool,
    /// Rollback target record id; defaults to the latest record.
    pub rollback_target: Option<u64>,
}

/// Outcome of one invocation, consumed by the report renderer.
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    /// Direction the invocation ran in.
    pub direction: MigrationDirection,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// The resolved plan.
    pub plan: MigrationPlan,
    /// Execution result; `None` for dry runs and empty plans.
    pub execution: Option<ExecutionResult>,
    /// Identifier of the persisted record, when one was written.
    pub record_id: Option<u64>,
}

/// Orchestrates planning, execution and persistence for one grant pair.
#[derive(Clone)]
pub struct MigrationService {
    planner: MigrationPlanner,
    executor: MigrationExecutor,
    state_store: Arc<dyn MigrationStateStore>,
    from_grant: GrantName,
    to_grant: GrantName,
}

impl MigrationService {
    /// Creates a service for one configured source/target grant pair.
    #[must_use]
    pub fn new(
        directory: Arc<dyn GrantDirectory>,
        state_store: Arc<dyn MigrationStateStore>,
        from_grant: GrantName,
        to_grant: GrantName,
    ) -> Self {
        Self {
            planner: MigrationPlanner::new(directory.clone()),
            executor: MigrationExecutor::new(directory),
            state_store,
            from_grant,
            to_grant,
        }
    }

    /// Runs one migration invocation.
    ///
    /// A rollback invocation loads the migration log before any directory
    /// call; an empty log, or an unknown target id, is a hard stop. An
    /// empty plan on a live run writes no state. Partial per-principal
    /// failure still persists the principals that were changed, so a later
    /// rollback reverts only what actually happened.
    pub async fn migrate(&self, options: MigrationOptions) -> MigrationResult<MigrationOutcome> {
        let plan = self.resolve(&options).await?;

        if options.dry_run {
            return Ok(MigrationOutcome {
                direction: options.direction,
                dry_run: true,
                plan,
                execution: None,
                record_id: None,
            });
        }

        if plan.is_empty() {
            return Ok(MigrationOutcome {
                direction: options.direction,
                dry_run: false,
                plan,
                execution: None,
                record_id: None,
            });
        }

        let execution = self.executor.execute(&plan).await;
        let record_id = self.persist(&options, &plan, &execution).await?;

        Ok(MigrationOutcome {
            direction: options.direction,
            dry_run: false,
            plan,
            execution: Some(execution),
            record_id,
        })
    }

    async fn resolve(&self, options: &MigrationOptions) -> MigrationResult<MigrationPlan> {
        match options.direction {
            MigrationDirection::Forward => {
                self.planner
                    .resolve_plan(&self.from_grant, &self.to_grant)
                    .await
            }
            MigrationDirection::Rollback => {
                let log = self.state_store.load_log().await?;
                let record = match options.rollback_target {
                    Some(id) => log.find(id),
                    None => log.latest(),
                }
                .ok_or(MigrationError::NoPriorMigration)?;

                self.planner.resolve_rollback_plan(record).await
            }
        }
    }

    /// Appends a record containing exactly the principals that changed.
    ///
    /// A run in which every principal failed at apply changed nothing and
    /// persists nothing, preserving the previous record as a rollback
    /// target.
    async fn persist(
        &self,
        options: &MigrationOptions,
        plan: &MigrationPlan,
        execution: &ExecutionResult,
    ) -> MigrationResult<Option<u64>> {
        if execution.affected.is_empty() {
            return Ok(None);
        }

        let log = self.state_store.load_log().await?;
        let record = MigrationRecord {
            id: log.next_id(),
            timestamp: Utc::now(),
            direction: options.direction,
            from_role: plan.source.display_name.clone(),
            to_role: plan.target.display_name.clone(),
            affected_users: execution.affected.clone(),
        };
        let record_id = record.id;

        self.state_store.append_record(record).await?;

        Ok(Some(record_id))
    }
}
