//! Status CLI command.

use std::path::Path;

use crate::commands::open_store;
use crate::output::{self, OutputFormat};
use qctl::prelude::{Supervisor, SupervisorOptions};

/// Execute the status command
pub async fn execute(db: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(db).await?;
    let supervisor = Supervisor::new(store, SupervisorOptions::default());
    let status = supervisor.status().await?;

    match format {
        OutputFormat::Json => output::print_json(&status),
        OutputFormat::Table => {
            println!("Supervisor:");
            output::print_kv("Running", if status.running { "yes" } else { "no" });
            if let Some(record) = &status.record {
                output::print_kv("Pid", &record.pid.to_string());
                output::print_kv("Started", &record.started_at.to_rfc3339());
                output::print_kv("Workers", &record.worker_count.to_string());
                if record.shutdown_requested {
                    output::print_kv("Shutdown", "requested");
                }
            }
            println!("Job counts:");
            output::print_kv("Pending", &status.counts.pending.to_string());
            output::print_kv("Processing", &status.counts.processing.to_string());
            output::print_kv("Completed", &status.counts.completed.to_string());
            output::print_kv("Dead", &status.counts.dead.to_string());
        }
    }
    Ok(())
}
