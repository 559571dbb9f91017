//! Dead letter queue CLI commands.

use std::path::Path;

use clap::{Args, Subcommand};

use crate::commands::open_store;
use crate::output::{self, OutputFormat};
use qctl::prelude::Admin;

/// Arguments for dlq commands
#[derive(Debug, Args)]
pub struct DlqArgs {
    /// DLQ subcommand
    #[command(subcommand)]
    pub command: DlqCommand,
}

/// DLQ subcommands
#[derive(Debug, Subcommand)]
pub enum DlqCommand {
    /// List dead jobs
    List,
    /// Move a dead job back to pending with a fresh retry budget
    Retry {
        /// Id of the dead job
        job_id: String,
    },
}

/// Execute dlq commands
pub async fn execute(args: &DlqArgs, db: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let admin = Admin::new(open_store(db).await?);

    match &args.command {
        DlqCommand::List => {
            let jobs = admin.dlq_list().await?;
            output::print_jobs(&jobs, format);
        }
        DlqCommand::Retry { job_id } => {
            admin.dlq_retry(job_id).await?;
            output::print_success(&format!("Requeued job '{job_id}'"));
        }
    }
    Ok(())
}
