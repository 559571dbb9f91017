//! List CLI command.

use std::path::Path;

use clap::Args;

use crate::commands::open_store;
use crate::output::{self, OutputFormat};
use qctl::prelude::{Admin, JobFilter, StateFilter};

/// Arguments for list
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Filter by state (pending, processing, completed, failed, dead)
    #[arg(long, value_parser = parse_state)]
    pub state: Option<StateFilter>,

    /// Only jobs whose id starts with this prefix
    #[arg(long)]
    pub prefix: Option<String>,
}

fn parse_state(s: &str) -> Result<StateFilter, String> {
    s.parse()
}

/// Execute the list command
pub async fn execute(args: &ListArgs, db: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let admin = Admin::new(open_store(db).await?);
    let jobs = admin
        .list(JobFilter {
            state: args.state,
            id_prefix: args.prefix.clone(),
        })
        .await?;
    output::print_jobs(&jobs, format);
    Ok(())
}
