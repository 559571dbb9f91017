use anyhow::Context;
use async_trait::async_trait;
use sqlx::{QueryBuilder, SqlitePool};
use tracing::instrument;

use qctl::core::config::{ConfigKey, RuntimeConfig};
use qctl::core::job::{Job, JobCounts, JobFilter, JobSpec, JobState, QueueMetrics, StateFilter};
use qctl::core::store::{JobStore, LivenessFn, StoreError, SupervisorRecord};
use qctl::core::{DateTime, Utc};

use crate::types::{datetime_to_timestamp, timestamp_to_datetime, JobRow};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS qctl_jobs (
        id              TEXT PRIMARY KEY,
        command         TEXT NOT NULL,
        state           TEXT NOT NULL,
        priority        INTEGER NOT NULL DEFAULT 0,
        attempts        INTEGER NOT NULL DEFAULT 0,
        max_retries     INTEGER NOT NULL,
        timeout_seconds INTEGER NOT NULL,
        run_at          INTEGER NOT NULL,
        created_at      INTEGER NOT NULL,
        updated_at      INTEGER NOT NULL,
        claimed_by      TEXT,
        last_error      TEXT,
        exit_code       INTEGER
    )",
    "CREATE INDEX IF NOT EXISTS qctl_jobs_claim_idx
        ON qctl_jobs (state, priority, run_at)",
    "CREATE TABLE IF NOT EXISTS qctl_config (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS qctl_supervisor (
        id           INTEGER PRIMARY KEY CHECK (id = 1),
        pid          INTEGER NOT NULL,
        started_at   INTEGER NOT NULL,
        worker_count INTEGER NOT NULL,
        shutdown     INTEGER NOT NULL DEFAULT 0
    )",
];

/// An implementation of the JobStore backed by SQLite
#[derive(Clone)]
pub struct SqliteStore {
    pub(crate) pool: SqlitePool,
}

impl SqliteStore {
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create tables and seed config defaults. Idempotent.
    pub async fn bootstrap(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to create schema")?;
        }
        for key in ConfigKey::ALL {
            sqlx::query(
                "INSERT INTO qctl_config (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO NOTHING",
            )
            .bind(key.name())
            .bind(key.default_value())
            .execute(&self.pool)
            .await
            .context("Failed to seed config defaults")?;
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for SqliteStore {
    #[instrument(skip_all, err, fields(job_id = %spec.id))]
    async fn enqueue(&self, spec: JobSpec) -> Result<String, StoreError> {
        spec.validate()?;
        let defaults = RuntimeConfig::load(self).await?;

        let now = Utc::now();
        let now_ms = datetime_to_timestamp(now);
        let run_at = spec.run_at.map(datetime_to_timestamp).unwrap_or(now_ms);

        let result = sqlx::query(
            "INSERT INTO qctl_jobs
                (id, command, state, priority, attempts, max_retries,
                 timeout_seconds, run_at, created_at, updated_at)
             VALUES (?1, ?2, 'pending', ?3, 0, ?4, ?5, ?6, ?7, ?7)",
        )
        .bind(&spec.id)
        .bind(&spec.command)
        .bind(spec.priority.unwrap_or(0))
        .bind(i64::from(spec.max_retries.unwrap_or(defaults.max_retries)))
        .bind(i64::from(
            spec.timeout_seconds.unwrap_or(defaults.default_timeout),
        ))
        .bind(run_at)
        .bind(now_ms)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(spec.id),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::duplicate_id(spec.id))
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context("Failed to enqueue job")
                .into()),
        }
    }

    #[instrument(skip_all, err, fields(worker_id = %worker_id))]
    async fn claim(&self, worker_id: &str, now: DateTime) -> Result<Option<Job>, StoreError> {
        let now_ms = datetime_to_timestamp(now);

        // Single statement, so the select-and-flip is atomic under the
        // database's write lock: concurrent claimants can never both see
        // the subquery row as pending.
        let row = sqlx::query_as::<_, JobRow>(
            "UPDATE qctl_jobs
             SET state = 'processing', claimed_by = ?1,
                 updated_at = MAX(updated_at, ?2)
             WHERE id IN (
                 SELECT id FROM qctl_jobs
                 WHERE state = 'pending' AND run_at <= ?2
                 ORDER BY priority DESC, run_at ASC, created_at ASC
                 LIMIT 1
             )
             RETURNING *",
        )
        .bind(worker_id)
        .bind(now_ms)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to claim a job")?;

        row.map(JobRow::into_job).transpose()
    }

    #[instrument(skip_all, err, fields(job_id = %job_id))]
    async fn finalize_success(
        &self,
        job_id: &str,
        exit_code: i32,
        now: DateTime,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE qctl_jobs
             SET state = 'completed', attempts = attempts + 1,
                 claimed_by = NULL, exit_code = ?2,
                 updated_at = MAX(updated_at, ?3)
             WHERE id = ?1 AND state = 'processing'",
        )
        .bind(job_id)
        .bind(exit_code)
        .bind(datetime_to_timestamp(now))
        .execute(&self.pool)
        .await
        .context("Failed to mark job as completed")?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(job_id));
        }
        Ok(())
    }

    #[instrument(skip_all, err, fields(job_id = %job_id))]
    async fn finalize_failure(
        &self,
        job_id: &str,
        exit_code: i32,
        error: &str,
        now: DateTime,
    ) -> Result<JobState, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start transaction")?;

        let row: Option<(i64, i64)> =
            sqlx::query_as("SELECT attempts, max_retries FROM qctl_jobs WHERE id = ?1")
                .bind(job_id)
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to read retry state")?;
        let Some((attempts, max_retries)) = row else {
            return Err(StoreError::not_found(job_id));
        };

        let attempts = attempts + 1;
        let now_ms = datetime_to_timestamp(now);

        let state = if attempts > max_retries {
            sqlx::query(
                "UPDATE qctl_jobs
                 SET state = 'dead', attempts = ?2, claimed_by = NULL,
                     last_error = ?3, exit_code = ?4,
                     updated_at = MAX(updated_at, ?5)
                 WHERE id = ?1",
            )
            .bind(job_id)
            .bind(attempts)
            .bind(error)
            .bind(exit_code)
            .bind(now_ms)
            .execute(&mut *tx)
            .await
            .context("Failed to move job to the dead letter queue")?;
            JobState::Dead
        } else {
            let base: i64 = sqlx::query_scalar::<_, String>(
                "SELECT value FROM qctl_config WHERE key = 'backoff_base'",
            )
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to read backoff base")?
            .and_then(|value| value.parse().ok())
            .unwrap_or(2);

            let delay_seconds = base.saturating_pow(attempts as u32);
            let next_run = now_ms.saturating_add(delay_seconds.saturating_mul(1000));

            sqlx::query(
                "UPDATE qctl_jobs
                 SET state = 'pending', attempts = ?2, claimed_by = NULL,
                     last_error = ?3, exit_code = ?4, run_at = ?5,
                     updated_at = MAX(updated_at, ?6)
                 WHERE id = ?1",
            )
            .bind(job_id)
            .bind(attempts)
            .bind(error)
            .bind(exit_code)
            .bind(next_run)
            .bind(now_ms)
            .execute(&mut *tx)
            .await
            .context("Failed to schedule retry")?;
            JobState::Pending
        };

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(state)
    }

    #[instrument(skip_all, err, fields(job_id = %job_id))]
    async fn requeue_dead(&self, job_id: &str, now: DateTime) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start transaction")?;

        let state: Option<String> =
            sqlx::query_scalar("SELECT state FROM qctl_jobs WHERE id = ?1")
                .bind(job_id)
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to read job state")?;
        match state.as_deref() {
            None => return Err(StoreError::not_found(job_id)),
            Some("dead") => {}
            Some(_) => return Err(StoreError::NotDead(job_id.to_string())),
        }

        let now_ms = datetime_to_timestamp(now);
        sqlx::query(
            "UPDATE qctl_jobs
             SET state = 'pending', attempts = 0, run_at = ?2,
                 last_error = NULL, exit_code = NULL,
                 updated_at = MAX(updated_at, ?2)
             WHERE id = ?1 AND state = 'dead'",
        )
        .bind(job_id)
        .bind(now_ms)
        .execute(&mut *tx)
        .await
        .context("Failed to requeue dead job")?;

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(())
    }

    #[instrument(skip_all, err)]
    async fn reclaim_orphans(
        &self,
        now: DateTime,
        liveness: LivenessFn<'_>,
    ) -> Result<u64, StoreError> {
        let rows: Vec<(String, Option<String>)> =
            sqlx::query_as("SELECT id, claimed_by FROM qctl_jobs WHERE state = 'processing'")
                .fetch_all(&self.pool)
                .await
                .context("Failed to scan processing jobs")?;

        let mut reclaimed = 0;
        for (id, claimed_by) in rows {
            let alive = claimed_by.as_deref().map(liveness).unwrap_or(false);
            if alive {
                continue;
            }
            tracing::warn!(job_id = %id, claimed_by = ?claimed_by, "Reclaiming orphaned job");
            self.finalize_failure(&id, -1, "worker-crashed", now).await?;
            reclaimed += 1;
        }
        Ok(reclaimed)
    }

    #[instrument(skip_all, err)]
    async fn list(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError> {
        let mut builder = QueryBuilder::new("SELECT * FROM qctl_jobs WHERE 1 = 1");
        match filter.state {
            Some(StateFilter::Failed) => {
                builder.push(" AND state = 'pending' AND attempts > 0");
            }
            Some(state) => {
                builder.push(" AND state = ");
                builder.push_bind(state.as_str());
            }
            None => {}
        }
        if let Some(prefix) = &filter.id_prefix {
            let escaped = prefix
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            builder.push(" AND id LIKE ");
            builder.push_bind(format!("{escaped}%"));
            builder.push(" ESCAPE '\\'");
        }
        builder.push(" ORDER BY priority DESC, run_at ASC");

        let rows = builder
            .build_query_as::<JobRow>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list jobs")?;
        rows.into_iter().map(JobRow::into_job).collect()
    }

    #[instrument(skip_all, err, fields(job_id = %job_id))]
    async fn job(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM qctl_jobs WHERE id = ?1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch job")?;
        row.map(JobRow::into_job).transpose()
    }

    #[instrument(skip_all, err)]
    async fn purge_completed(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM qctl_jobs WHERE state = 'completed'")
            .execute(&self.pool)
            .await
            .context("Failed to purge completed jobs")?;
        Ok(result.rows_affected())
    }

    #[instrument(skip_all, err)]
    async fn counts(&self) -> Result<JobCounts, StoreError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM qctl_jobs GROUP BY state")
                .fetch_all(&self.pool)
                .await
                .context("Failed to count jobs")?;

        let mut counts = JobCounts::default();
        for (state, count) in rows {
            let count = count as u64;
            match state.as_str() {
                "pending" => counts.pending = count,
                "processing" => counts.processing = count,
                "completed" => counts.completed = count,
                "dead" => counts.dead = count,
                _ => {}
            }
        }
        Ok(counts)
    }

    #[instrument(skip_all, err)]
    async fn metrics(&self) -> Result<QueueMetrics, StoreError> {
        let counts = self.counts().await?;
        let failed: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM qctl_jobs WHERE state = 'pending' AND attempts > 0",
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to count failed jobs")?;

        let avg_ms: Option<f64> = sqlx::query_scalar(
            "SELECT AVG(updated_at - created_at) FROM qctl_jobs WHERE state = 'completed'",
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to compute average duration")?;

        Ok(QueueMetrics {
            total: counts.total(),
            completed: counts.completed,
            failed: failed as u64,
            dead: counts.dead,
            avg_duration_seconds: avg_ms.map(|ms| ms / 1000.0),
        })
    }

    #[instrument(skip_all, err, fields(key = %key))]
    async fn config_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if ConfigKey::from_name(key).is_none() {
            return Err(StoreError::UnknownConfig(key.to_string()));
        }
        let value = sqlx::query_scalar("SELECT value FROM qctl_config WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read config")?;
        Ok(value)
    }

    #[instrument(skip_all, err, fields(key = %key))]
    async fn config_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let Some(known) = ConfigKey::from_name(key) else {
            return Err(StoreError::UnknownConfig(key.to_string()));
        };
        known.validate(value)?;

        sqlx::query(
            "INSERT INTO qctl_config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .context("Failed to write config")?;
        Ok(())
    }

    #[instrument(skip_all, err)]
    async fn supervisor_record(&self) -> Result<Option<SupervisorRecord>, StoreError> {
        let row: Option<(i64, i64, i64, i64)> = sqlx::query_as(
            "SELECT pid, started_at, worker_count, shutdown FROM qctl_supervisor WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .context("Failed to read supervisor record")?;

        Ok(row.map(|(pid, started_at, worker_count, shutdown)| SupervisorRecord {
            pid: pid as i32,
            started_at: timestamp_to_datetime(started_at),
            worker_count: worker_count as u32,
            shutdown_requested: shutdown != 0,
        }))
    }

    #[instrument(skip_all, err, fields(pid = record.pid))]
    async fn put_supervisor_record(&self, record: &SupervisorRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO qctl_supervisor (id, pid, started_at, worker_count, shutdown)
             VALUES (1, ?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 pid = excluded.pid,
                 started_at = excluded.started_at,
                 worker_count = excluded.worker_count,
                 shutdown = excluded.shutdown",
        )
        .bind(i64::from(record.pid))
        .bind(datetime_to_timestamp(record.started_at))
        .bind(i64::from(record.worker_count))
        .bind(i64::from(record.shutdown_requested))
        .execute(&self.pool)
        .await
        .context("Failed to write supervisor record")?;
        Ok(())
    }

    #[instrument(skip_all, err, fields(pid = pid))]
    async fn clear_supervisor_record(&self, pid: i32) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM qctl_supervisor WHERE id = 1 AND pid = ?1")
            .bind(i64::from(pid))
            .execute(&self.pool)
            .await
            .context("Failed to clear supervisor record")?;
        Ok(())
    }

    #[instrument(skip_all, err)]
    async fn request_supervisor_shutdown(&self) -> Result<(), StoreError> {
        sqlx::query("UPDATE qctl_supervisor SET shutdown = 1 WHERE id = 1")
            .execute(&self.pool)
            .await
            .context("Failed to set shutdown flag")?;
        Ok(())
    }
}
