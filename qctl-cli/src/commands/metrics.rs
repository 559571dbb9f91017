//! Metrics CLI command.

use std::path::Path;

use crate::commands::open_store;
use crate::output::{self, OutputFormat};
use qctl::prelude::Admin;

/// Execute the metrics command
pub async fn execute(db: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let admin = Admin::new(open_store(db).await?);
    let metrics = admin.metrics().await?;

    match format {
        OutputFormat::Json => output::print_json(&metrics),
        OutputFormat::Table => {
            println!("Queue metrics:");
            output::print_kv("Total jobs", &metrics.total.to_string());
            output::print_kv("Completed", &metrics.completed.to_string());
            output::print_kv("Failed", &metrics.failed.to_string());
            output::print_kv("Dead", &metrics.dead.to_string());
            if let Some(avg) = metrics.avg_duration_seconds {
                output::print_kv("Avg execution time", &format!("{avg:.2}s"));
            }
        }
    }
    Ok(())
}
