//! The job model: states, specs submitted by users, filters and aggregates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::store::StoreError;
use crate::core::DateTime;

/// Persisted lifecycle state of a job.
///
/// `completed` and `dead` are terminal. There is no persisted `failed`
/// state: a job whose last execution failed but still has retry budget
/// goes back to `pending` with `attempts > 0` and a future `run_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Dead,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Dead => "dead",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Dead)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobState::Pending),
            "processing" => Ok(JobState::Processing),
            "completed" => Ok(JobState::Completed),
            "dead" => Ok(JobState::Dead),
            other => Err(format!("unknown job state '{other}'")),
        }
    }
}

/// State selector accepted by `list`.
///
/// Adds the pseudo-state `failed` on top of [`JobState`]: jobs that are
/// `pending` with at least one recorded attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFilter {
    Pending,
    Processing,
    Completed,
    Failed,
    Dead,
}

impl StateFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateFilter::Pending => "pending",
            StateFilter::Processing => "processing",
            StateFilter::Completed => "completed",
            StateFilter::Failed => "failed",
            StateFilter::Dead => "dead",
        }
    }
}

impl fmt::Display for StateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StateFilter::Pending),
            "processing" => Ok(StateFilter::Processing),
            "completed" => Ok(StateFilter::Completed),
            "failed" => Ok(StateFilter::Failed),
            "dead" => Ok(StateFilter::Dead),
            other => Err(format!(
                "unknown state '{other}' (expected pending, processing, completed, failed or dead)"
            )),
        }
    }
}

/// A persisted job row.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub command: String,
    pub state: JobState,
    pub priority: i64,
    pub attempts: u32,
    pub max_retries: u32,
    pub timeout_seconds: u32,
    pub run_at: DateTime,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    pub claimed_by: Option<String>,
    pub last_error: Option<String>,
    pub exit_code: Option<i32>,
}

impl Job {
    /// Remaining executions before the job would go dead, including the
    /// one currently owed.
    pub fn remaining_attempts(&self) -> u32 {
        (self.max_retries + 1).saturating_sub(self.attempts)
    }
}

/// A job submission, decoded from user-supplied JSON.
///
/// Unknown keys are rejected at the deserialization boundary. Optional
/// fields fall back to configured defaults at enqueue time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    pub id: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_at: Option<DateTime>,
}

impl JobSpec {
    /// Minimal spec with defaults for everything optional.
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            priority: None,
            max_retries: None,
            timeout_seconds: None,
            run_at: None,
        }
    }

    /// Decode a spec from a JSON document.
    pub fn parse(json: &str) -> Result<Self, StoreError> {
        let spec: JobSpec =
            serde_json::from_str(json).map_err(|e| StoreError::InvalidSpec(e.to_string()))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Check field-level constraints the type system cannot express.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.id.is_empty() {
            return Err(StoreError::InvalidSpec("'id' must be non-empty".into()));
        }
        if self.command.is_empty() {
            return Err(StoreError::InvalidSpec(
                "'command' must be non-empty".into(),
            ));
        }
        if let Some(0) = self.timeout_seconds {
            return Err(StoreError::InvalidSpec(
                "'timeout_seconds' must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_timeout(mut self, timeout_seconds: u32) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    pub fn with_run_at(mut self, run_at: DateTime) -> Self {
        self.run_at = Some(run_at);
        self
    }
}

/// Read-only query over jobs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub state: Option<StateFilter>,
    pub id_prefix: Option<String>,
}

impl JobFilter {
    pub fn with_state(state: StateFilter) -> Self {
        Self {
            state: Some(state),
            id_prefix: None,
        }
    }
}

/// Per-state job tallies used by `status` and the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub dead: u64,
}

impl JobCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.dead
    }
}

/// Aggregate metrics over the whole queue.
///
/// `failed` counts pending jobs with at least one attempt, matching the
/// `failed` pseudo-state. `avg_duration_seconds` averages
/// `updated_at - created_at` over completed jobs.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct QueueMetrics {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    pub dead: u64,
    pub avg_duration_seconds: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;

    #[test]
    fn state_round_trips_through_str() {
        for state in [
            JobState::Pending,
            JobState::Processing,
            JobState::Completed,
            JobState::Dead,
        ] {
            assert_eq!(state.as_str().parse::<JobState>().unwrap(), state);
        }
        assert!("failed".parse::<JobState>().is_err());
        assert!("failed".parse::<StateFilter>().is_ok());
    }

    #[test]
    fn terminal_states() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Dead.is_terminal());
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Processing.is_terminal());
    }

    #[test]
    fn parse_minimal_spec() {
        let spec = JobSpec::parse(r#"{"id":"a","command":"echo hi"}"#).unwrap();
        assert_eq!(spec.id, "a");
        assert_eq!(spec.command, "echo hi");
        assert_eq!(spec.priority, None);
        assert_eq!(spec.max_retries, None);
        assert_eq!(spec.timeout_seconds, None);
        assert_eq!(spec.run_at, None);
    }

    #[test]
    fn parse_full_spec() {
        let spec = JobSpec::parse(
            r#"{"id":"b","command":"exit 1","priority":5,"max_retries":2,
                "timeout_seconds":10,"run_at":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(spec.priority, Some(5));
        assert_eq!(spec.max_retries, Some(2));
        assert_eq!(spec.timeout_seconds, Some(10));
        assert_eq!(
            spec.run_at,
            Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = JobSpec::parse(r#"{"id":"a","command":"true","nope":1}"#).unwrap_err();
        assert!(matches!(err, StoreError::InvalidSpec(_)), "got {err:?}");
    }

    #[test]
    fn empty_id_is_rejected() {
        let err = JobSpec::parse(r#"{"id":"","command":"true"}"#).unwrap_err();
        assert!(err.to_string().contains("id"));
    }

    #[test]
    fn empty_command_is_rejected() {
        let err = JobSpec::parse(r#"{"id":"a","command":""}"#).unwrap_err();
        assert!(err.to_string().contains("command"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err =
            JobSpec::parse(r#"{"id":"a","command":"true","timeout_seconds":0}"#).unwrap_err();
        assert!(err.to_string().contains("timeout_seconds"));
    }

    #[test]
    fn negative_retries_is_rejected() {
        // u32 field, so a negative value fails at the serde layer
        let err = JobSpec::parse(r#"{"id":"a","command":"true","max_retries":-1}"#).unwrap_err();
        assert!(matches!(err, StoreError::InvalidSpec(_)));
    }

    #[test]
    fn bad_run_at_is_rejected() {
        let err =
            JobSpec::parse(r#"{"id":"a","command":"true","run_at":"tomorrow"}"#).unwrap_err();
        assert!(matches!(err, StoreError::InvalidSpec(_)));
    }

    #[test]
    fn remaining_attempts_saturates() {
        let job = Job {
            id: "x".into(),
            command: "true".into(),
            state: JobState::Dead,
            priority: 0,
            attempts: 4,
            max_retries: 2,
            timeout_seconds: 30,
            run_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            claimed_by: None,
            last_error: None,
            exit_code: None,
        };
        assert_eq!(job.remaining_attempts(), 0);
    }

    #[test]
    fn counts_total() {
        let counts = JobCounts {
            pending: 1,
            processing: 2,
            completed: 3,
            dead: 4,
        };
        assert_eq!(counts.total(), 10);
    }
}
