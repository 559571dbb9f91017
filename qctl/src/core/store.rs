//! The durable store interface all backends implement.
//!
//! Every state transition in the job lifecycle happens through this
//! trait; workers and front-ends never mutate rows directly. The claim
//! operation is the concurrency-critical piece: two concurrent callers
//! must never observe the same job as claimed.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::core::job::{Job, JobCounts, JobFilter, JobSpec, JobState, QueueMetrics};
use crate::core::DateTime;

/// Predicate deciding whether the worker named in `claimed_by` is still
/// alive. Used during orphan reclamation.
pub type LivenessFn<'a> = &'a (dyn Fn(&str) -> bool + Send + Sync);

/// The single persisted row identifying the supervisor process that
/// currently owns the worker pool on this host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupervisorRecord {
    pub pid: i32,
    pub started_at: DateTime,
    pub worker_count: u32,
    pub shutdown_requested: bool,
}

/// An interface to the durable job store. Responsible for persisting
/// jobs, handing them to workers exactly once, and recording outcomes.
///
/// ### Priority
///
/// When a job is enqueued one can specify priority. Jobs with higher
/// priority will get claimed first even if submitted after lower
/// priority jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new pending job.
    ///
    /// Optional spec fields fall back to the configured defaults
    /// (`max_retries`, `default_timeout`); a missing `run_at` means
    /// immediately eligible. Fails with [`StoreError::DuplicateId`] if a
    /// job with the same id already exists.
    async fn enqueue(&self, spec: JobSpec) -> Result<String, StoreError>;

    /// Atomically claim the single most eligible pending job.
    ///
    /// Eligible means `state = pending` and `run_at <= now`; most
    /// eligible is decided by `(priority DESC, run_at ASC, created_at
    /// ASC)`. The claimed job transitions to `processing` with
    /// `claimed_by = worker_id` in the same operation. Returns `None`
    /// when nothing is eligible.
    async fn claim(&self, worker_id: &str, now: DateTime) -> Result<Option<Job>, StoreError>;

    /// Record a successful execution: `completed`, claim cleared,
    /// exit code stored.
    async fn finalize_success(
        &self,
        job_id: &str,
        exit_code: i32,
        now: DateTime,
    ) -> Result<(), StoreError>;

    /// Record a failed execution.
    ///
    /// Increments `attempts`; if the budget is exhausted the job goes
    /// `dead`, otherwise back to `pending` with
    /// `run_at = now + backoff_base ^ attempts` seconds. Returns the
    /// state the job ended up in.
    async fn finalize_failure(
        &self,
        job_id: &str,
        exit_code: i32,
        error: &str,
        now: DateTime,
    ) -> Result<JobState, StoreError>;

    /// Move a dead job back to `pending` with a fresh retry budget.
    ///
    /// Fails with [`StoreError::NotFound`] if the id is unknown and
    /// [`StoreError::NotDead`] if the job exists in any other state.
    async fn requeue_dead(&self, job_id: &str, now: DateTime) -> Result<(), StoreError>;

    /// Fail every `processing` job whose claimant is no longer alive.
    ///
    /// Called on supervisor startup. Each orphan goes through the normal
    /// failure path with the error `worker-crashed`, so exhausted jobs
    /// land in the dead letter queue. Returns the number of reclaimed
    /// jobs.
    async fn reclaim_orphans(
        &self,
        now: DateTime,
        liveness: LivenessFn<'_>,
    ) -> Result<u64, StoreError>;

    /// List jobs matching the filter, ordered by
    /// `(priority DESC, run_at ASC)`.
    async fn list(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError>;

    /// Point lookup by id.
    async fn job(&self, job_id: &str) -> Result<Option<Job>, StoreError>;

    /// Delete all completed jobs, returning how many were removed.
    async fn purge_completed(&self) -> Result<u64, StoreError>;

    /// Per-state job tallies.
    async fn counts(&self) -> Result<JobCounts, StoreError>;

    /// Aggregate queue metrics (totals and average completed duration).
    async fn metrics(&self) -> Result<QueueMetrics, StoreError>;

    /// Read a config value. Recognized keys are seeded with defaults at
    /// bootstrap; unknown keys fail with [`StoreError::UnknownConfig`].
    async fn config_get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a config value after validating it for the key.
    async fn config_set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// The current supervisor record, if any.
    async fn supervisor_record(&self) -> Result<Option<SupervisorRecord>, StoreError>;

    /// Install `record` as the current supervisor, replacing any stale
    /// one.
    async fn put_supervisor_record(&self, record: &SupervisorRecord) -> Result<(), StoreError>;

    /// Remove the supervisor record, but only if it still belongs to
    /// `pid`.
    async fn clear_supervisor_record(&self, pid: i32) -> Result<(), StoreError>;

    /// Flip the persisted shutdown flag on the current record.
    async fn request_supervisor_shutdown(&self) -> Result<(), StoreError>;
}

/// Errors related to store operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    /// Enqueue with an id that already exists.
    #[error("duplicate job id '{0}'")]
    DuplicateId(String),

    /// Malformed job JSON or an out-of-range field.
    #[error("invalid job spec: {0}")]
    InvalidSpec(String),

    /// Config key outside the recognized set.
    #[error("unknown config key '{0}'")]
    UnknownConfig(String),

    /// Recognized config key with a value that fails its validation.
    #[error("invalid value for config key '{key}': {reason}")]
    InvalidConfig { key: String, reason: String },

    /// No job with the given id.
    #[error("no job with id '{0}'")]
    NotFound(String),

    /// DLQ retry on a job that is not dead.
    #[error("job '{0}' is not in the dead letter queue")]
    NotDead(String),

    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl StoreError {
    pub fn duplicate_id(id: impl Into<String>) -> Self {
        Self::DuplicateId(id.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn invalid_config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_message_mentions_duplicate() {
        let err = StoreError::duplicate_id("job-1");
        let msg = err.to_string();
        assert!(msg.contains("duplicate"));
        assert!(msg.contains("job-1"));
    }

    #[test]
    fn invalid_config_names_key_and_reason() {
        let err = StoreError::invalid_config("backoff_base", "must be an integer >= 2");
        let msg = err.to_string();
        assert!(msg.contains("backoff_base"));
        assert!(msg.contains(">= 2"));
    }

    #[test]
    fn source_chain_is_preserved() {
        use std::error::Error;

        let err = StoreError::Database(anyhow::anyhow!("root cause"));
        assert!(err.source().is_some());
    }
}
