//! End-to-end worker scenarios against a file-backed store.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::task::JoinHandle;

use qctl::prelude::*;
use qctl_sqlite::SqliteStore;

struct Harness {
    _dir: TempDir,
    store: SqliteStore,
    log_dir: std::path::PathBuf,
    shutdown: CancellationToken,
    kill: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl Harness {
    async fn start() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = qctl_sqlite::connect(dir.path().join("qctl.db"))
            .await
            .expect("connect");
        let log_dir = dir.path().join("logs");

        let shutdown = CancellationToken::new();
        let kill = CancellationToken::new();
        let executor = CommandExecutor::new(Arc::new(FileLogSink::new(&log_dir)));
        let worker = Worker::new(
            "qworker-1@1",
            store.clone(),
            executor,
            Duration::from_millis(50),
            shutdown.child_token(),
            kill.child_token(),
        );

        Self {
            _dir: dir,
            store,
            log_dir,
            shutdown,
            kill,
            worker: Some(tokio::spawn(worker.run())),
        }
    }

    async fn stop(mut self) {
        self.shutdown.cancel();
        if let Some(worker) = self.worker.take() {
            tokio::time::timeout(Duration::from_secs(10), worker)
                .await
                .expect("worker did not stop after shutdown")
                .expect("worker panicked");
        }
        drop(self.kill);
    }

    async fn wait_for_state(&self, job_id: &str, state: JobState, timeout: Duration) -> Job {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(job) = self.store.job(job_id).await.expect("job lookup") {
                if job.state == state {
                    return job;
                }
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job '{job_id}' did not reach state {state} within {timeout:?}"
            );
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

#[tokio::test]
async fn happy_path_completes_with_exit_zero() {
    let harness = Harness::start().await;
    harness
        .store
        .enqueue(JobSpec::parse(r#"{"id":"a","command":"exit 0"}"#).unwrap())
        .await
        .unwrap();

    let job = harness
        .wait_for_state("a", JobState::Completed, Duration::from_secs(5))
        .await;
    assert_eq!(job.exit_code, Some(0));
    assert_eq!(job.attempts, 1);
    assert_eq!(job.claimed_by, None);

    harness.stop().await;
}

#[tokio::test]
async fn output_lands_in_the_job_log() {
    let harness = Harness::start().await;
    harness
        .store
        .enqueue(JobSpec::new("logged", "echo from-the-job; echo warn 1>&2"))
        .await
        .unwrap();

    harness
        .wait_for_state("logged", JobState::Completed, Duration::from_secs(5))
        .await;

    let sink = FileLogSink::new(&harness.log_dir);
    let log = std::fs::read_to_string(sink.path_for("logged")).unwrap();
    assert!(log.contains("from-the-job"));
    assert!(log.contains("warn"));

    harness.stop().await;
}

#[tokio::test]
async fn failing_job_retries_then_goes_dead() {
    let harness = Harness::start().await;
    // max_retries 1 keeps this to one real 2s backoff wait.
    harness
        .store
        .enqueue(JobSpec::parse(r#"{"id":"b","command":"exit 2","max_retries":1}"#).unwrap())
        .await
        .unwrap();

    let job = harness
        .wait_for_state("b", JobState::Dead, Duration::from_secs(15))
        .await;
    assert_eq!(job.attempts, 2);
    assert_eq!(job.exit_code, Some(2));
    assert_eq!(job.last_error.as_deref(), Some("exit=2"));

    harness.stop().await;
}

#[tokio::test]
async fn timeout_is_reported_and_kills_the_job() {
    let harness = Harness::start().await;
    harness
        .store
        .enqueue(
            JobSpec::parse(
                r#"{"id":"d","command":"sleep 60","timeout_seconds":1,"max_retries":0}"#,
            )
            .unwrap(),
        )
        .await
        .unwrap();

    let job = harness
        .wait_for_state("d", JobState::Dead, Duration::from_secs(10))
        .await;
    assert_eq!(job.attempts, 1);
    assert!(job.last_error.unwrap().contains("timeout"));
    assert_eq!(job.exit_code, Some(-1));

    harness.stop().await;
}

#[tokio::test]
async fn higher_priority_completes_first() {
    let harness = Harness::start().await;
    // Eligible only once both rows exist, so the single worker sees the
    // full queue and has to pick by priority.
    let eligible_at = Utc::now() + chrono::Duration::seconds(1);
    harness
        .store
        .enqueue(
            JobSpec::new("lo", "echo lo")
                .with_priority(0)
                .with_run_at(eligible_at),
        )
        .await
        .unwrap();
    harness
        .store
        .enqueue(
            JobSpec::new("hi", "echo hi")
                .with_priority(5)
                .with_run_at(eligible_at),
        )
        .await
        .unwrap();

    let hi = harness
        .wait_for_state("hi", JobState::Completed, Duration::from_secs(5))
        .await;
    let lo = harness
        .wait_for_state("lo", JobState::Completed, Duration::from_secs(5))
        .await;
    assert!(hi.updated_at <= lo.updated_at);

    harness.stop().await;
}

#[tokio::test]
async fn dlq_retry_runs_the_job_again() {
    let harness = Harness::start().await;
    let admin = Admin::new(harness.store.clone());
    harness
        .store
        .enqueue(JobSpec::parse(r#"{"id":"s4","command":"exit 2","max_retries":0}"#).unwrap())
        .await
        .unwrap();

    harness
        .wait_for_state("s4", JobState::Dead, Duration::from_secs(10))
        .await;

    admin.dlq_retry("s4").await.unwrap();
    let job = harness.store.job("s4").await.unwrap().unwrap();
    assert!(
        job.state == JobState::Pending
            || job.state == JobState::Processing
            || job.state == JobState::Dead,
        "unexpected state {}",
        job.state
    );

    // Same command, same outcome: dead again.
    let job = harness
        .wait_for_state("s4", JobState::Dead, Duration::from_secs(10))
        .await;
    assert_eq!(job.attempts, 1);

    harness.stop().await;
}

#[tokio::test]
async fn idle_worker_stops_promptly_on_shutdown() {
    let harness = Harness::start().await;
    // Give the worker a moment to reach its idle sleep.
    tokio::time::sleep(Duration::from_millis(150)).await;

    let started = tokio::time::Instant::now();
    harness.stop().await;
    assert!(started.elapsed() < Duration::from_secs(2));
}
