//! Worker pool management CLI commands.

use std::path::Path;

use clap::{Args, Subcommand};

use crate::commands::open_store;
use crate::output;
use qctl::prelude::{Supervisor, SupervisorOptions};

/// Arguments for worker commands
#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Worker subcommand
    #[command(subcommand)]
    pub command: WorkerCommand,
}

/// Worker subcommands
#[derive(Debug, Subcommand)]
pub enum WorkerCommand {
    /// Run a supervisor with N workers in the foreground
    Start {
        /// Number of workers to run
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        count: u32,
    },
    /// Ask the running supervisor to shut down gracefully
    Stop,
}

/// Execute worker commands
pub async fn execute(args: &WorkerArgs, db: &Path, log_dir: &Path) -> anyhow::Result<()> {
    let store = open_store(db).await?;
    let mut options = SupervisorOptions::default();
    options.log_dir = log_dir.to_path_buf();
    let supervisor = Supervisor::new(store, options);

    match args.command {
        WorkerCommand::Start { count } => {
            supervisor.start(count).await?;
        }
        WorkerCommand::Stop => {
            supervisor.stop().await?;
            output::print_success("Supervisor stopped");
        }
    }
    Ok(())
}
