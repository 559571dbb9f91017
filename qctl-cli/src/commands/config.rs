//! Config CLI commands.

use std::path::Path;

use clap::{Args, Subcommand};

use crate::commands::open_store;
use crate::output;
use qctl::prelude::Admin;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Read a config value
    Get {
        /// Key to read
        key: String,
    },
    /// Write a config value
    Set {
        /// Key to write
        key: String,
        /// New value
        value: String,
    },
}

/// Execute config commands
pub async fn execute(args: &ConfigArgs, db: &Path) -> anyhow::Result<()> {
    let admin = Admin::new(open_store(db).await?);

    match &args.command {
        ConfigCommand::Get { key } => {
            let value = admin.config_get(key).await?;
            println!("{}", value.unwrap_or_default());
        }
        ConfigCommand::Set { key, value } => {
            admin.config_set(key, value).await?;
            output::print_success(&format!("Set {key}={value}"));
        }
    }
    Ok(())
}
