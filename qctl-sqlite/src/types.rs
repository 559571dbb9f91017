use sqlx::FromRow;

use qctl::core::job::{Job, JobState};
use qctl::core::DateTime;

// Helper to convert SQLite INTEGER (Unix timestamp in milliseconds) to DateTime
pub(crate) fn timestamp_to_datetime(ts_ms: i64) -> DateTime {
    DateTime::from_timestamp_millis(ts_ms).unwrap_or(DateTime::UNIX_EPOCH)
}

// Helper to convert DateTime to SQLite INTEGER (Unix timestamp in milliseconds)
pub(crate) fn datetime_to_timestamp(dt: DateTime) -> i64 {
    dt.timestamp_millis()
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct JobRow {
    pub(crate) id: String,
    pub(crate) command: String,
    pub(crate) state: String,
    pub(crate) priority: i64,
    pub(crate) attempts: i64,
    pub(crate) max_retries: i64,
    pub(crate) timeout_seconds: i64,
    pub(crate) run_at: i64,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
    pub(crate) claimed_by: Option<String>,
    pub(crate) last_error: Option<String>,
    pub(crate) exit_code: Option<i64>,
}

impl JobRow {
    pub(crate) fn into_job(self) -> Result<Job, qctl::core::store::StoreError> {
        let state: JobState = self
            .state
            .parse()
            .map_err(|e: String| anyhow::anyhow!("corrupt job row '{}': {e}", self.id))?;
        Ok(Job {
            id: self.id,
            command: self.command,
            state,
            priority: self.priority,
            attempts: self.attempts as u32,
            max_retries: self.max_retries as u32,
            timeout_seconds: self.timeout_seconds as u32,
            run_at: timestamp_to_datetime(self.run_at),
            created_at: timestamp_to_datetime(self.created_at),
            updated_at: timestamp_to_datetime(self.updated_at),
            claimed_by: self.claimed_by,
            last_error: self.last_error,
            exit_code: self.exit_code.map(|code| code as i32),
        })
    }
}
