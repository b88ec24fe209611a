#![deny(unused)]
//! Backup retention service.
//!
//! Applies a tiered retention policy (daily, weekly, monthly) to the backup
//! archives under one bucket prefix, either once from the command line or on
//! demand through the admin API.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use retention_admin::AdminState;
use retention_core::config::AppConfig;
use retention_core::traits::BackupCatalog;
use retention_core::types::{PolicyOverride, RetentionPolicy};
use retention_engine::{deadline_token, render, render_plan, RetentionEngine, RunScheduler};
use retention_governance::{NoOpRbacConnector, RbacConnector, StaticTokenRbacConnector};
use retention_store::S3BackupCatalog;

#[derive(Parser)]
#[command(name = "backup-retention", version, about = "Tiered retention for backup archives")]
struct Cli {
    /// Directory holding default.toml and environment overlays.
    #[arg(long, env = "RETENTION_CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the admin API.
    Serve,
    /// Apply the policy once and print a report.
    Run(RunArgs),
    /// Print the configured default policy.
    Policy,
}

#[derive(Args)]
struct RunArgs {
    /// Compute and print the plan without deleting anything.
    #[arg(long)]
    dry_run: bool,
    /// Override the daily retention window, in days.
    #[arg(long)]
    daily: Option<u32>,
    /// Override the weekly retention window, in weeks.
    #[arg(long)]
    weekly: Option<u32>,
    /// Override the monthly retention window, in months.
    #[arg(long)]
    monthly: Option<u32>,
    /// Override the backup count cap (0 disables it).
    #[arg(long)]
    max_count: Option<u32>,
    /// Override the total size cap in bytes (0 disables it).
    #[arg(long)]
    max_size: Option<u64>,
}

impl RunArgs {
    fn overrides(&self) -> PolicyOverride {
        PolicyOverride {
            daily_retention_days: self.daily,
            weekly_retention_weeks: self.weekly,
            monthly_retention_months: self.monthly,
            max_total_size_bytes: self.max_size,
            max_backup_count: self.max_count,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config_dir)?;
    retention_governance::configure_tracing(config.governance.json_logs)?;
    config.validate()?;

    tracing::info!("Starting backup-retention v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Policy => {
            let policy = config.retention.default_policy();
            for field in policy.describe() {
                println!("{:<24} {:>14}  {}", field.name, field.value, field.description);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Run(args) => run_once(&config, &args).await,
        Command::Serve => {
            serve(config).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// =========================================================================
// Storage
// =========================================================================

/// Build the S3 catalog and the lane key runs on it are serialized under.
async fn build_catalog(config: &AppConfig) -> anyhow::Result<(Arc<dyn BackupCatalog>, String)> {
    let storage = &config.storage;
    let bucket = storage
        .bucket
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("storage.bucket is required"))?;
    tracing::info!(
        bucket = %bucket,
        prefix = %storage.prefix,
        endpoint = ?storage.endpoint,
        "Initializing S3 backup catalog"
    );
    let catalog = S3BackupCatalog::new(
        bucket,
        storage.endpoint.as_deref(),
        storage.region.as_deref(),
        storage.force_path_style,
    )
    .await;
    Ok((
        Arc::new(catalog),
        RunScheduler::lane_key(bucket, &storage.prefix),
    ))
}

fn build_engine(config: &AppConfig, catalog: Arc<dyn BackupCatalog>) -> RetentionEngine {
    RetentionEngine::new(catalog, config.storage.prefix.clone())
        .with_delete_concurrency(config.retention.delete_concurrency)
}

fn run_timeout(config: &AppConfig) -> Option<Duration> {
    config.retention.run_timeout_secs.map(Duration::from_secs)
}

// =========================================================================
// Commands
// =========================================================================

async fn run_once(config: &AppConfig, args: &RunArgs) -> anyhow::Result<ExitCode> {
    let policy: RetentionPolicy = config.retention.default_policy().merged(&args.overrides());
    policy.validate()?;

    let (catalog, _) = build_catalog(config).await?;
    let engine = build_engine(config, catalog);

    if args.dry_run {
        let plan = engine.plan(&policy).await?;
        println!("{}", render_plan(&plan));
        return Ok(ExitCode::SUCCESS);
    }

    let (cancel, timer) = deadline_token(run_timeout(config));
    let result = engine.run(&policy, &cancel).await;
    if let Some(timer) = timer {
        timer.abort();
    }
    let result = result?;

    println!("{}", render(&result));
    if result.has_errors() || !result.skipped.is_empty() {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    config.validate_for_serve()?;
    let rbac = admin_rbac(&config);

    let (catalog, lane) = build_catalog(&config).await?;
    let engine = Arc::new(build_engine(&config, catalog));

    let metrics = match retention_governance::setup_metrics_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Metrics disabled");
            None
        }
    };

    let state = Arc::new(AdminState {
        engine,
        scheduler: Arc::new(RunScheduler::new()),
        lane,
        default_policy: config.retention.default_policy(),
        rbac,
        metrics,
        run_timeout: run_timeout(&config),
    });

    retention_admin::serve(&config.server.host, config.server.port, state).await?;
    Ok(())
}

/// Token check for the admin API. Callers run `validate_for_serve` first, so
/// the development connector is only reachable through `allow_dev_token`.
fn admin_rbac(config: &AppConfig) -> Arc<dyn RbacConnector> {
    match config.governance.admin_token() {
        Some(token) => Arc::new(StaticTokenRbacConnector::new(token.clone())),
        None => {
            tracing::warn!("governance.allow_dev_token is set; accepting the development token");
            Arc::new(NoOpRbacConnector)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_map_to_overrides() {
        let cli = Cli::parse_from([
            "backup-retention",
            "run",
            "--dry-run",
            "--daily",
            "3",
            "--max-size",
            "1024",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.dry_run);
        let overrides = args.overrides();
        assert_eq!(overrides.daily_retention_days, Some(3));
        assert_eq!(overrides.max_total_size_bytes, Some(1024));
        assert_eq!(overrides.weekly_retention_weeks, None);
        assert_eq!(cli.config_dir, PathBuf::from("config"));
    }

    fn served_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.bucket = Some("db-backups".into());
        config
    }

    #[tokio::test]
    async fn test_configured_token_replaces_dev_token() {
        let mut config = served_config();
        config.governance.admin_token = Some(secrecy::Secret::new("s3cr3t".into()));
        config.governance.allow_dev_token = true;

        let rbac = admin_rbac(&config);
        assert!(rbac.validate("s3cr3t").await.unwrap().is_admin);
        assert!(rbac.validate("admin").await.is_err());
    }

    #[tokio::test]
    async fn test_dev_token_only_with_flag() {
        let mut config = served_config();
        assert!(config.validate_for_serve().is_err());

        config.governance.allow_dev_token = true;
        config.validate_for_serve().unwrap();
        let rbac = admin_rbac(&config);
        assert!(rbac.validate("admin").await.unwrap().is_admin);
    }
}
