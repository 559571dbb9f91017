//! Enqueue CLI command.

use std::path::Path;

use chrono::Duration;
use clap::Args;

use crate::commands::open_store;
use crate::output;
use qctl::prelude::{Admin, DateTime, JobSpec, Utc};

/// Arguments for enqueue
#[derive(Debug, Args)]
pub struct EnqueueArgs {
    /// Job JSON or path to a job file (must include id and command)
    pub spec: String,

    /// Delay in seconds before allowing the job to run
    #[arg(long)]
    pub delay: Option<u64>,

    /// ISO-8601 time to run the job at (e.g. 2026-08-02T12:00:00Z)
    #[arg(long)]
    pub run_at: Option<DateTime>,

    /// Job priority (higher runs first)
    #[arg(long)]
    pub priority: Option<i64>,

    /// Job timeout in seconds
    #[arg(long)]
    pub timeout: Option<u32>,
}

/// Execute the enqueue command
pub async fn execute(args: &EnqueueArgs, db: &Path) -> anyhow::Result<()> {
    let raw = if Path::new(&args.spec).exists() {
        std::fs::read_to_string(&args.spec)?
    } else {
        args.spec.clone()
    };

    let spec = apply_overrides(JobSpec::parse(&raw)?, args);
    spec.validate()?;

    let admin = Admin::new(open_store(db).await?);
    let id = admin.enqueue(spec).await?;
    output::print_success(&format!("Enqueued job '{id}'"));
    Ok(())
}

/// Flags win over the JSON spec; `--run-at` wins over `--delay`.
fn apply_overrides(mut spec: JobSpec, args: &EnqueueArgs) -> JobSpec {
    if let Some(delay) = args.delay {
        if delay > 0 {
            spec.run_at = Some(Utc::now() + Duration::seconds(delay as i64));
        }
    }
    if let Some(run_at) = args.run_at {
        spec.run_at = Some(run_at);
    }
    if let Some(priority) = args.priority {
        spec.priority = Some(priority);
    }
    if let Some(timeout) = args.timeout {
        spec.timeout_seconds = Some(timeout);
    }
    spec
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> EnqueueArgs {
        EnqueueArgs {
            spec: String::new(),
            delay: None,
            run_at: None,
            priority: None,
            timeout: None,
        }
    }

    #[test]
    fn no_flags_leaves_spec_alone() {
        let spec = JobSpec::new("a", "true").with_priority(3);
        let merged = apply_overrides(spec, &args());
        assert_eq!(merged.priority, Some(3));
        assert_eq!(merged.run_at, None);
    }

    #[test]
    fn delay_sets_a_future_run_at() {
        let before = Utc::now();
        let merged = apply_overrides(
            JobSpec::new("a", "true"),
            &EnqueueArgs {
                delay: Some(60),
                ..args()
            },
        );
        assert!(merged.run_at.unwrap() >= before + Duration::seconds(59));
    }

    #[test]
    fn zero_delay_is_a_no_op() {
        let merged = apply_overrides(
            JobSpec::new("a", "true"),
            &EnqueueArgs {
                delay: Some(0),
                ..args()
            },
        );
        assert_eq!(merged.run_at, None);
    }

    #[test]
    fn explicit_run_at_wins_over_delay() {
        let at = "2026-01-01T00:00:00Z".parse::<DateTime>().unwrap();
        let merged = apply_overrides(
            JobSpec::new("a", "true"),
            &EnqueueArgs {
                delay: Some(60),
                run_at: Some(at),
                ..args()
            },
        );
        assert_eq!(merged.run_at, Some(at));
    }

    #[test]
    fn flags_override_json_fields() {
        let spec = JobSpec::parse(r#"{"id":"a","command":"true","priority":1,"timeout_seconds":5}"#)
            .unwrap();
        let merged = apply_overrides(
            spec,
            &EnqueueArgs {
                priority: Some(9),
                timeout: Some(7),
                ..args()
            },
        );
        assert_eq!(merged.priority, Some(9));
        assert_eq!(merged.timeout_seconds, Some(7));
    }
}
