//! Pure rendering of dry-run previews and final summaries.
//!
//! Nothing here touches the directory; a dry-run preview must show the
//! exact principal list a live run would act on.

use std::fmt::Write as _;

use crate::migration_planner::MigrationPlan;
use crate::migration_service::MigrationOutcome;

/// Renders a dry-run preview of the plan, ending with an explicit
/// "no changes made" marker.
#[must_use]
pub fn render_preview(plan: &MigrationPlan) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "DRY RUN - no changes will be made");
    let _ = writeln!(
        output,
        "Direction: '{}' -> '{}'",
        plan.source.display_name, plan.target.display_name
    );
    let _ = writeln!(output);

    render_plan_body(&mut output, plan);

    let _ = writeln!(output);
    let _ = write!(output, "Dry-run complete. No changes made.");
    output
}

/// Renders the final summary of a live run.
#[must_use]
pub fn render_summary(outcome: &MigrationOutcome) -> String {
    let plan = &outcome.plan;
    let mut output = String::new();
    let _ = writeln!(
        output,
        "{} run: '{}' -> '{}'",
        outcome.direction.as_str(),
        plan.source.display_name,
        plan.target.display_name
    );
    let _ = writeln!(output);

    let Some(execution) = &outcome.execution else {
        render_skipped(&mut output, plan);
        let _ = write!(
            output,
            "No principals hold '{}'. Nothing to do.",
            plan.source.display_name
        );
        return output;
    };

    let _ = writeln!(output, "Migrated {} principal(s):", execution.affected.len());
    for affected in &execution.affected {
        let _ = writeln!(
            output,
            "  - {} ({})",
            affected.display_name, affected.user_principal_name
        );
    }

    if !execution.failures.is_empty() {
        let _ = writeln!(output, "Failed {} call(s):", execution.failures.len());
        for failure in &execution.failures {
            let _ = writeln!(
                output,
                "  - {} ({}): {}: {}",
                failure.principal.display_name,
                failure.principal.user_principal_name,
                failure.stage.as_str(),
                failure.detail
            );
        }
    }

    let stale: Vec<_> = execution.stale_source_grants().collect();
    if !stale.is_empty() {
        let _ = writeln!(
            output,
            "Stale source grant left on {} principal(s); revoke manually:",
            stale.len()
        );
        for failure in stale {
            let _ = writeln!(
                output,
                "  - {} ({})",
                failure.principal.display_name, failure.principal.user_principal_name
            );
        }
    }

    render_skipped(&mut output, plan);

    if let Some(reason) = &execution.halted {
        let _ = writeln!(
            output,
            "Run halted early: {reason}. Remaining principals were not attempted."
        );
    }

    match outcome.record_id {
        Some(record_id) => {
            let _ = write!(output, "State saved (record #{record_id}).");
        }
        None => {
            let _ = write!(output, "No changes were persisted.");
        }
    }

    output
}

fn render_plan_body(output: &mut String, plan: &MigrationPlan) {
    if plan.is_empty() {
        let _ = writeln!(
            output,
            "No principals hold '{}'. Nothing to do.",
            plan.source.display_name
        );
    } else {
        let _ = writeln!(
            output,
            "Found {} principal(s) holding '{}':",
            plan.principals.len(),
            plan.source.display_name
        );
        for principal in &plan.principals {
            let _ = writeln!(
                output,
                "  - {} ({})",
                principal.display_name,
                principal
                    .user_principal_name
                    .as_deref()
                    .unwrap_or("unknown")
            );
        }
    }

    render_skipped(output, plan);
}

fn render_skipped(output: &mut String, plan: &MigrationPlan) {
    if plan.skipped.is_empty() {
        return;
    }

    let _ = writeln!(output, "Skipped {} candidate(s):", plan.skipped.len());
    for skip in &plan.skipped {
        let _ = writeln!(output, "  - {}: {}", skip.principal_id, skip.reason);
    }
}

#[cfg(test)]
mod tests {
    use grantshift_domain::{
        AffectedPrincipal, GrantDefinition, GrantDefinitionId, MigrationDirection, Principal,
        PrincipalId, PrincipalType, SkipReason, SkippedPrincipal,
    };

    use crate::migration_executor::{ExecutionResult, FailureStage, PrincipalFailure};
    use crate::migration_planner::MigrationPlan;
    use crate::migration_service::MigrationOutcome;

    use super::{render_preview, render_summary};

    fn plan() -> MigrationPlan {
        MigrationPlan {
            source: GrantDefinition {
                id: GrantDefinitionId::new("g-src"),
                display_name: "Too Many Perms".to_owned(),
            },
            target: GrantDefinition {
                id: GrantDefinitionId::new("g-dst"),
                display_name: "Just Right Perms".to_owned(),
            },
            principals: vec![Principal {
                id: PrincipalId::new("u-1"),
                display_name: "Ada Lovelace".to_owned(),
                user_principal_name: Some("ada@contoso.example".to_owned()),
            }],
            skipped: vec![SkippedPrincipal {
                principal_id: PrincipalId::new("grp-1"),
                reason: SkipReason::NonUserPrincipal(PrincipalType::Group),
            }],
        }
    }

    #[test]
    fn preview_lists_principals_and_ends_with_no_changes_marker() {
        let rendered = render_preview(&plan());

        assert!(rendered.contains("Ada Lovelace (ada@contoso.example)"));
        assert!(rendered.contains("grp-1: not a user identity (group)"));
        assert!(rendered.ends_with("Dry-run complete. No changes made."));
    }

    #[test]
    fn preview_of_empty_plan_says_nothing_to_do() {
        let mut empty = plan();
        empty.principals.clear();
        empty.skipped.clear();

        let rendered = render_preview(&empty);

        assert!(rendered.contains("No principals hold 'Too Many Perms'. Nothing to do."));
    }

    #[test]
    fn summary_without_execution_is_the_nothing_to_do_terminal() {
        let mut empty = plan();
        empty.principals.clear();
        let outcome = MigrationOutcome {
            direction: MigrationDirection::Forward,
            dry_run: false,
            plan: empty,
            execution: None,
            record_id: None,
        };

        let rendered = render_summary(&outcome);

        assert!(rendered.ends_with("Nothing to do."));
    }

    #[test]
    fn summary_reports_failures_by_stage_and_record_id() {
        let execution = ExecutionResult {
            affected: vec![AffectedPrincipal {
                user_id: "u-1".to_owned(),
                display_name: "Ada Lovelace".to_owned(),
                user_principal_name: "ada@contoso.example".to_owned(),
            }],
            failures: vec![PrincipalFailure {
                principal: AffectedPrincipal {
                    user_id: "u-2".to_owned(),
                    display_name: "Bob".to_owned(),
                    user_principal_name: "bob@contoso.example".to_owned(),
                },
                stage: FailureStage::Apply,
                detail: "assignment refused".to_owned(),
            }],
            halted: None,
        };
        let outcome = MigrationOutcome {
            direction: MigrationDirection::Forward,
            dry_run: false,
            plan: plan(),
            execution: Some(execution),
            record_id: Some(3),
        };

        let rendered = render_summary(&outcome);

        assert!(rendered.starts_with("forward run: 'Too Many Perms' -> 'Just Right Perms'"));
        assert!(rendered.contains("Migrated 1 principal(s):"));
        assert!(rendered.contains("Bob (bob@contoso.example): apply: assignment refused"));
        assert!(rendered.ends_with("State saved (record #3)."));
    }
}
