//! Purge CLI command.

use std::path::Path;

use clap::Args;

use crate::commands::open_store;
use crate::output;
use qctl::prelude::Admin;

/// Arguments for purge
#[derive(Debug, Args)]
pub struct PurgeArgs {
    /// Delete completed jobs (the only supported selector)
    #[arg(long, required = true)]
    pub completed: bool,
}

/// Execute the purge command
pub async fn execute(args: &PurgeArgs, db: &Path) -> anyhow::Result<()> {
    debug_assert!(args.completed);
    let admin = Admin::new(open_store(db).await?);
    let deleted = admin.purge_completed().await?;
    output::print_success(&format!("Deleted {deleted} completed jobs"));
    Ok(())
}
