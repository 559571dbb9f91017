//! CLI command definitions and dispatch.

pub mod config;
pub mod dashboard;
pub mod dlq;
pub mod enqueue;
pub mod list;
pub mod metrics;
pub mod purge;
pub mod status;
pub mod worker;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use qctl_sqlite::SqliteStore;

/// qctl, a durable background job queue
#[derive(Debug, Parser)]
#[command(name = "qctl", version, about, long_about = None)]
pub struct Cli {
    /// Path to the job database
    #[arg(long, env = "QCTL_DB", default_value = "qctl.db", global = true)]
    pub db: PathBuf,

    /// Directory for per-job log files
    #[arg(long, env = "QCTL_LOGDIR", default_value = "logs", global = true)]
    pub log_dir: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Enqueue a job (JSON literal or path to a job file)
    Enqueue(enqueue::EnqueueArgs),
    /// Manage the worker pool
    Worker(worker::WorkerArgs),
    /// Show supervisor and queue status
    Status,
    /// List jobs
    List(list::ListArgs),
    /// Dead letter queue commands
    Dlq(dlq::DlqArgs),
    /// Get or set configuration
    Config(config::ConfigArgs),
    /// Delete finished jobs
    Purge(purge::PurgeArgs),
    /// Show queue metrics
    Metrics,
    /// Serve the read-only web dashboard
    Dashboard(dashboard::DashboardArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> anyhow::Result<()> {
        match &self.command {
            Commands::Enqueue(args) => enqueue::execute(args, &self.db).await,
            Commands::Worker(args) => worker::execute(args, &self.db, &self.log_dir).await,
            Commands::Status => status::execute(&self.db, self.format).await,
            Commands::List(args) => list::execute(args, &self.db, self.format).await,
            Commands::Dlq(args) => dlq::execute(args, &self.db, self.format).await,
            Commands::Config(args) => config::execute(args, &self.db).await,
            Commands::Purge(args) => purge::execute(args, &self.db).await,
            Commands::Metrics => metrics::execute(&self.db, self.format).await,
            Commands::Dashboard(args) => dashboard::execute(args, &self.db).await,
        }
    }
}

/// Helper: open the store, bootstrapping the schema if needed
pub async fn open_store(db: &Path) -> anyhow::Result<SqliteStore> {
    Ok(qctl_sqlite::connect(db).await?)
}
