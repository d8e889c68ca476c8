//! Grantshift command-line orchestrator.
//!
//! Plain invocation runs a forward live migration; `--dry-run` previews
//! without mutating, `--rollback` reverses the most recent persisted run.

#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use grantshift_application::{
    MigrationOptions, MigrationService, render_preview, render_summary,
};
use grantshift_core::{GrantName, MigrationError, MigrationResult};
use grantshift_domain::MigrationDirection;
use grantshift_infrastructure::{
    GraphDirectoryClient, GraphDirectoryConfig, JsonFileMigrationLog,
};

const DEFAULT_STATE_FILE: &str = "grant_migration_log.json";

/// Migrate grant holders from one directory role to another, with
/// dry-run preview and rollback support.
#[derive(Debug, Parser)]
#[command(name = "grantshift", version, about)]
struct Cli {
    /// Show what would happen without changing anything.
    #[arg(long)]
    dry_run: bool,

    /// Reverse the most recent persisted migration.
    #[arg(long)]
    rollback: bool,

    /// Reverse a specific persisted migration record (implies --rollback).
    #[arg(long, value_name = "RECORD_ID")]
    rollback_id: Option<u64>,

    /// Override the migration log path.
    #[arg(long, value_name = "PATH")]
    state_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
struct CliConfig {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    from_role: String,
    to_role: String,
    graph_base_url: Option<String>,
    state_file: PathBuf,
}

impl CliConfig {
    fn load(state_file_override: Option<PathBuf>) -> MigrationResult<Self> {
        let state_file = state_file_override
            .or_else(|| env::var("STATE_FILE").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE));

        Ok(Self {
            tenant_id: required_env("TENANT_ID")?,
            client_id: required_env("ROLE_CHANGES_CLIENT_ID")?,
            client_secret: required_env("ROLE_CHANGES_CLIENT_SECRET")?,
            from_role: required_env("FROM_ROLE_NAME")?,
            to_role: required_env("TO_ROLE_NAME")?,
            graph_base_url: env::var("GRAPH_BASE_URL").ok(),
            state_file,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = CliConfig::load(cli.state_file.clone())?;

    let direction = if cli.rollback || cli.rollback_id.is_some() {
        MigrationDirection::Rollback
    } else {
        MigrationDirection::Forward
    };

    let mut graph_config = GraphDirectoryConfig::new(
        config.tenant_id.clone(),
        config.client_id.clone(),
        config.client_secret.clone(),
    );
    if let Some(base_url) = config.graph_base_url.clone() {
        graph_config.graph_base_url = base_url;
    }

    let directory = Arc::new(GraphDirectoryClient::new(graph_config)?);
    let state_store = Arc::new(JsonFileMigrationLog::new(config.state_file.clone()));
    let service = MigrationService::new(
        directory,
        state_store,
        GrantName::new(config.from_role.clone())?,
        GrantName::new(config.to_role.clone())?,
    );

    info!(
        direction = direction.as_str(),
        dry_run = cli.dry_run,
        state_file = %config.state_file.display(),
        "starting migration run"
    );

    let outcome = match service
        .migrate(MigrationOptions {
            direction,
            dry_run: cli.dry_run,
            rollback_target: cli.rollback_id,
        })
        .await
    {
        Ok(outcome) => outcome,
        Err(error) => {
            if matches!(error, MigrationError::StatePersistence(_)) {
                error!(
                    error = %error,
                    "changes were applied but could not be recorded; \
                     automatic rollback of this run is not possible"
                );
            }
            return Err(error);
        }
    };

    if outcome.dry_run {
        println!("{}", render_preview(&outcome.plan));
        return Ok(());
    }

    println!("{}", render_summary(&outcome));

    // A halted run already persisted what completed; surface the outage
    // through the exit code so operators notice the unattempted remainder.
    if let Some(reason) = outcome
        .execution
        .as_ref()
        .and_then(|execution| execution.halted.clone())
    {
        return Err(MigrationError::DirectoryUnavailable(reason));
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> MigrationResult<String> {
    env::var(name).map_err(|_| MigrationError::Validation(format!("{name} is required")))
}
