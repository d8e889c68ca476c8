//! Application services and ports for grant migrations.

#![forbid(unsafe_code)]

mod migration_executor;
mod migration_planner;
mod migration_ports;
mod migration_report;
mod migration_service;

pub use migration_executor::{
    ExecutionResult, FailureStage, MigrationExecutor, PrincipalFailure,
};
pub use migration_planner::{MigrationPlan, MigrationPlanner};
pub use migration_ports::{GrantDirectory, MigrationStateStore};
pub use migration_report::{render_preview, render_summary};
pub use migration_service::{MigrationOptions, MigrationOutcome, MigrationService};
