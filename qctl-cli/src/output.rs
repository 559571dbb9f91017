//! Table and JSON output formatting for CLI commands.

use serde::Serialize;
use tabled::{Table, Tabled};

use qctl::core::job::Job;

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

#[derive(Tabled)]
struct JobLine {
    id: String,
    state: String,
    priority: i64,
    attempts: u32,
    command: String,
    run_at: String,
    exit: String,
    error: String,
}

impl From<&Job> for JobLine {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            state: job.state.to_string(),
            priority: job.priority,
            attempts: job.attempts,
            command: truncate(&job.command, 40),
            run_at: job.run_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            exit: job
                .exit_code
                .map(|code| code.to_string())
                .unwrap_or_default(),
            error: job
                .last_error
                .as_deref()
                .map(|e| truncate(e, 32))
                .unwrap_or_default(),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

/// Print jobs in the selected format
pub fn print_jobs(jobs: &[Job], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if jobs.is_empty() {
                println!("No jobs found.");
            } else {
                let lines: Vec<JobLine> = jobs.iter().map(JobLine::from).collect();
                println!("{}", Table::new(lines));
            }
        }
        OutputFormat::Json => print_json(&jobs),
    }
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) {
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
    println!("{json}");
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {msg}");
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<24} {}", format!("{key}:"), value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate("echo hi", 40), "echo hi");
    }

    #[test]
    fn truncate_marks_long_strings() {
        let long = "x".repeat(60);
        let cut = truncate(&long, 40);
        assert!(cut.chars().count() <= 40);
        assert!(cut.ends_with('…'));
    }
}
