//! Shared test specifications for JobStore implementations.
//!
//! These test functions can be called by any backend to ensure
//! consistent behavior across all implementations. Backends get the
//! whole suite expanded by [`generate_store_spec_tests!`].

/// Generate all store spec test wrappers for a backend.
///
/// # Usage
///
/// ```ignore
/// qctl::generate_store_spec_tests! {
///     backend = "sqlite",
///     test_attr = #[tokio::test],
///     setup = common::memory_store()
/// }
/// ```
///
/// `setup` is an expression evaluating to a future that resolves to a
/// fresh, empty store with seeded config defaults.
#[macro_export]
macro_rules! generate_store_spec_tests {
    (
        backend = $backend:literal,
        test_attr = #[$test_attr:meta],
        setup = $setup:expr
    ) => {
        paste::paste! {
            #[$test_attr]
            async fn [<enqueue_then_list_round_trip_ $backend>]() {
                $crate::store_spec::test_enqueue_then_list_round_trip($setup.await).await;
            }

            #[$test_attr]
            async fn [<enqueue_duplicate_id_ $backend>]() {
                $crate::store_spec::test_enqueue_duplicate_id($setup.await).await;
            }

            #[$test_attr]
            async fn [<enqueue_duplicate_id_concurrent_ $backend>]() {
                $crate::store_spec::test_enqueue_duplicate_id_concurrent($setup.await).await;
            }

            #[$test_attr]
            async fn [<enqueue_applies_config_defaults_ $backend>]() {
                $crate::store_spec::test_enqueue_applies_config_defaults($setup.await).await;
            }

            #[$test_attr]
            async fn [<enqueue_rejects_invalid_spec_ $backend>]() {
                $crate::store_spec::test_enqueue_rejects_invalid_spec($setup.await).await;
            }

            #[$test_attr]
            async fn [<claim_none_on_empty_store_ $backend>]() {
                $crate::store_spec::test_claim_none_on_empty_store($setup.await).await;
            }

            #[$test_attr]
            async fn [<claim_respects_run_at_ $backend>]() {
                $crate::store_spec::test_claim_respects_run_at($setup.await).await;
            }

            #[$test_attr]
            async fn [<claim_ordering_ $backend>]() {
                $crate::store_spec::test_claim_ordering($setup.await).await;
            }

            #[$test_attr]
            async fn [<claim_exactly_once_concurrent_ $backend>]() {
                $crate::store_spec::test_claim_exactly_once_concurrent($setup.await).await;
            }

            #[$test_attr]
            async fn [<claim_marks_processing_ $backend>]() {
                $crate::store_spec::test_claim_marks_processing($setup.await).await;
            }

            #[$test_attr]
            async fn [<finalize_success_completes_ $backend>]() {
                $crate::store_spec::test_finalize_success_completes($setup.await).await;
            }

            #[$test_attr]
            async fn [<finalize_failure_backoff_schedule_ $backend>]() {
                $crate::store_spec::test_finalize_failure_backoff_schedule($setup.await).await;
            }

            #[$test_attr]
            async fn [<zero_retry_budget_goes_straight_to_dead_ $backend>]() {
                $crate::store_spec::test_zero_retry_budget_goes_straight_to_dead($setup.await).await;
            }

            #[$test_attr]
            async fn [<requeue_dead_round_trip_ $backend>]() {
                $crate::store_spec::test_requeue_dead_round_trip($setup.await).await;
            }

            #[$test_attr]
            async fn [<requeue_rejects_non_dead_ $backend>]() {
                $crate::store_spec::test_requeue_rejects_non_dead($setup.await).await;
            }

            #[$test_attr]
            async fn [<reclaim_orphans_ $backend>]() {
                $crate::store_spec::test_reclaim_orphans($setup.await).await;
            }

            #[$test_attr]
            async fn [<reclaim_exhausted_orphan_goes_dead_ $backend>]() {
                $crate::store_spec::test_reclaim_exhausted_orphan_goes_dead($setup.await).await;
            }

            #[$test_attr]
            async fn [<list_filters_ $backend>]() {
                $crate::store_spec::test_list_filters($setup.await).await;
            }

            #[$test_attr]
            async fn [<purge_completed_exact_ $backend>]() {
                $crate::store_spec::test_purge_completed_exact($setup.await).await;
            }

            #[$test_attr]
            async fn [<counts_and_metrics_ $backend>]() {
                $crate::store_spec::test_counts_and_metrics($setup.await).await;
            }

            #[$test_attr]
            async fn [<config_round_trip_ $backend>]() {
                $crate::store_spec::test_config_round_trip($setup.await).await;
            }

            #[$test_attr]
            async fn [<config_defaults_seeded_ $backend>]() {
                $crate::store_spec::test_config_defaults_seeded($setup.await).await;
            }

            #[$test_attr]
            async fn [<supervisor_record_round_trip_ $backend>]() {
                $crate::store_spec::test_supervisor_record_round_trip($setup.await).await;
            }

            #[$test_attr]
            async fn [<updated_at_is_monotonic_ $backend>]() {
                $crate::store_spec::test_updated_at_is_monotonic($setup.await).await;
            }
        }
    };
}

use chrono::Duration;

use crate::core::config::ConfigKey;
use crate::core::job::{JobFilter, JobSpec, JobState, StateFilter};
use crate::core::store::{JobStore, StoreError, SupervisorRecord};
use crate::core::{DateTime, Utc};

fn spec(id: &str, command: &str) -> JobSpec {
    JobSpec::new(id, command)
}

/// Now, truncated to the store's millisecond granularity, so time
/// arithmetic against stored rows is exact.
fn now_ms() -> DateTime {
    DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).expect("in range")
}

async fn claim_one<S: JobStore>(store: &S, worker: &str, now: DateTime) -> crate::core::job::Job {
    store
        .claim(worker, now)
        .await
        .unwrap()
        .expect("expected an eligible job")
}

/// Enqueue → list returns the same fields.
pub async fn test_enqueue_then_list_round_trip<S: JobStore>(store: S) {
    let run_at = Utc::now() + Duration::minutes(5);
    let id = store
        .enqueue(
            spec("round-trip", "echo hi")
                .with_priority(7)
                .with_max_retries(2)
                .with_timeout(11)
                .with_run_at(run_at),
        )
        .await
        .unwrap();
    assert_eq!(id, "round-trip");

    let jobs = store.list(JobFilter::default()).await.unwrap();
    assert_eq!(jobs.len(), 1);
    let job = &jobs[0];
    assert_eq!(job.id, "round-trip");
    assert_eq!(job.command, "echo hi");
    assert_eq!(job.state, JobState::Pending);
    assert_eq!(job.priority, 7);
    assert_eq!(job.max_retries, 2);
    assert_eq!(job.timeout_seconds, 11);
    assert_eq!(job.attempts, 0);
    assert_eq!(job.claimed_by, None);
    assert_eq!(job.exit_code, None);
    // Millisecond storage granularity.
    assert!((job.run_at - run_at).num_milliseconds().abs() < 2);
}

/// Two enqueues with the same id: one success, one DuplicateId.
pub async fn test_enqueue_duplicate_id<S: JobStore>(store: S) {
    store.enqueue(spec("dup", "true")).await.unwrap();
    let err = store.enqueue(spec("dup", "false")).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateId(_)), "got {err:?}");
    assert!(err.to_string().contains("duplicate"));

    // The first row is untouched.
    let job = store.job("dup").await.unwrap().unwrap();
    assert_eq!(job.command, "true");
}

/// Concurrent enqueues with one id: exactly one row is created.
pub async fn test_enqueue_duplicate_id_concurrent<S: JobStore>(store: S) {
    let results = futures::future::join_all((0..6).map(|n| {
        let store = &store;
        async move {
            store
                .enqueue(spec("contested-id", &format!("echo {n}")))
                .await
        }
    }))
    .await;

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one enqueue must win");
    for result in results {
        if let Err(err) = result {
            assert!(matches!(err, StoreError::DuplicateId(_)), "got {err:?}");
        }
    }

    let jobs = store.list(JobFilter::default()).await.unwrap();
    assert_eq!(jobs.len(), 1);
}

/// Omitted spec fields fall back to configured defaults.
pub async fn test_enqueue_applies_config_defaults<S: JobStore>(store: S) {
    store.config_set("max_retries", "5").await.unwrap();
    store.config_set("default_timeout", "42").await.unwrap();

    store.enqueue(spec("defaults", "true")).await.unwrap();
    let job = store.job("defaults").await.unwrap().unwrap();
    assert_eq!(job.max_retries, 5);
    assert_eq!(job.timeout_seconds, 42);
    assert_eq!(job.priority, 0);
    // run_at defaults to creation time: immediately eligible.
    assert!(job.run_at <= Utc::now());
}

/// Validation failures surface as InvalidSpec before any row is written.
pub async fn test_enqueue_rejects_invalid_spec<S: JobStore>(store: S) {
    let err = store.enqueue(spec("", "true")).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidSpec(_)), "got {err:?}");

    let err = store.enqueue(spec("no-cmd", "")).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidSpec(_)), "got {err:?}");

    assert!(store.list(JobFilter::default()).await.unwrap().is_empty());
}

pub async fn test_claim_none_on_empty_store<S: JobStore>(store: S) {
    assert!(store.claim("w", Utc::now()).await.unwrap().is_none());
}

/// Jobs scheduled in the future are not eligible until `run_at`.
pub async fn test_claim_respects_run_at<S: JobStore>(store: S) {
    let now = Utc::now();
    store
        .enqueue(spec("later", "true").with_run_at(now + Duration::hours(1)))
        .await
        .unwrap();

    assert!(store.claim("w", now).await.unwrap().is_none());

    // A `now` past run_at makes it eligible; far-past run_at would be
    // immediately eligible the same way.
    let job = claim_one(&store, "w", now + Duration::hours(2)).await;
    assert_eq!(job.id, "later");
}

/// Claim order is (priority DESC, run_at ASC, created_at ASC).
pub async fn test_claim_ordering<S: JobStore>(store: S) {
    let base = Utc::now() - Duration::minutes(10);
    store
        .enqueue(spec("lo-late", "true").with_priority(0).with_run_at(base + Duration::seconds(2)))
        .await
        .unwrap();
    store
        .enqueue(spec("hi", "true").with_priority(5).with_run_at(base + Duration::seconds(3)))
        .await
        .unwrap();
    store
        .enqueue(spec("lo-early", "true").with_priority(0).with_run_at(base + Duration::seconds(1)))
        .await
        .unwrap();

    let now = Utc::now();
    assert_eq!(claim_one(&store, "w", now).await.id, "hi");
    assert_eq!(claim_one(&store, "w", now).await.id, "lo-early");
    assert_eq!(claim_one(&store, "w", now).await.id, "lo-late");
    assert!(store.claim("w", now).await.unwrap().is_none());
}

/// One eligible job, many concurrent claimants, exactly one winner.
pub async fn test_claim_exactly_once_concurrent<S: JobStore>(store: S) {
    store.enqueue(spec("contested", "true")).await.unwrap();

    let now = Utc::now();
    let claims = futures::future::join_all(
        (0..8).map(|n| {
            let store = &store;
            let worker = format!("qworker-{n}@1");
            async move { store.claim(&worker, now).await.unwrap() }
        }),
    )
    .await;

    let winners: Vec<_> = claims.into_iter().flatten().collect();
    assert_eq!(winners.len(), 1, "exactly one claimant must win");
    assert_eq!(winners[0].id, "contested");
}

/// Invariant: claimed_by is non-null iff state = processing.
pub async fn test_claim_marks_processing<S: JobStore>(store: S) {
    store.enqueue(spec("claimed", "true")).await.unwrap();
    let now = Utc::now();

    let job = claim_one(&store, "qworker-1@1", now).await;
    assert_eq!(job.state, JobState::Processing);
    assert_eq!(job.claimed_by.as_deref(), Some("qworker-1@1"));

    let reread = store.job("claimed").await.unwrap().unwrap();
    assert_eq!(reread.state, JobState::Processing);
    assert_eq!(reread.claimed_by.as_deref(), Some("qworker-1@1"));

    // Already-processing jobs are not claimable again.
    assert!(store.claim("qworker-2@1", now).await.unwrap().is_none());
}

pub async fn test_finalize_success_completes<S: JobStore>(store: S) {
    store.enqueue(spec("wins", "true")).await.unwrap();
    let now = Utc::now();
    claim_one(&store, "w", now).await;

    store.finalize_success("wins", 0, now).await.unwrap();

    let job = store.job("wins").await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.claimed_by, None);
    assert_eq!(job.exit_code, Some(0));
    assert_eq!(job.attempts, 1);
}

/// The k-th retry is scheduled backoff_base^k seconds out, the delays
/// grow monotonically, and the budget boundary moves the job to dead.
pub async fn test_finalize_failure_backoff_schedule<S: JobStore>(store: S) {
    // Seeded default backoff_base = 2.
    store
        .enqueue(spec("flaky", "exit 2").with_max_retries(2))
        .await
        .unwrap();

    let t0 = now_ms();
    claim_one(&store, "w", t0).await;
    let state = store.finalize_failure("flaky", 2, "exit=2", t0).await.unwrap();
    assert_eq!(state, JobState::Pending);

    let after_first = store.job("flaky").await.unwrap().unwrap();
    assert_eq!(after_first.attempts, 1);
    assert_eq!(after_first.claimed_by, None);
    assert_eq!(after_first.last_error.as_deref(), Some("exit=2"));
    assert_eq!(after_first.exit_code, Some(2));
    let delay_1 = after_first.run_at - t0;
    assert!(delay_1 >= Duration::seconds(2), "first retry delay {delay_1}");

    let t1 = after_first.run_at;
    claim_one(&store, "w", t1).await;
    store.finalize_failure("flaky", 2, "exit=2", t1).await.unwrap();

    let after_second = store.job("flaky").await.unwrap().unwrap();
    assert_eq!(after_second.attempts, 2);
    let delay_2 = after_second.run_at - t1;
    assert!(delay_2 >= Duration::seconds(4), "second retry delay {delay_2}");
    assert!(after_second.run_at >= after_first.run_at + Duration::seconds(4));

    // Third failure exhausts max_retries = 2.
    let t2 = after_second.run_at;
    claim_one(&store, "w", t2).await;
    let state = store.finalize_failure("flaky", 2, "exit=2", t2).await.unwrap();
    assert_eq!(state, JobState::Dead);

    let dead = store.job("flaky").await.unwrap().unwrap();
    assert_eq!(dead.state, JobState::Dead);
    assert_eq!(dead.attempts, 3);
    assert!(dead.attempts <= dead.max_retries + 1);
    assert_eq!(dead.claimed_by, None);
    assert_eq!(dead.exit_code, Some(2));
}

pub async fn test_zero_retry_budget_goes_straight_to_dead<S: JobStore>(store: S) {
    store
        .enqueue(spec("one-shot", "false").with_max_retries(0))
        .await
        .unwrap();
    let now = Utc::now();
    claim_one(&store, "w", now).await;

    let state = store
        .finalize_failure("one-shot", 1, "exit=1", now)
        .await
        .unwrap();
    assert_eq!(state, JobState::Dead);

    let job = store.job("one-shot").await.unwrap().unwrap();
    assert_eq!(job.attempts, 1);
    assert_eq!(job.state, JobState::Dead);
}

/// DLQ retry resets the job to a fresh pending state.
pub async fn test_requeue_dead_round_trip<S: JobStore>(store: S) {
    store
        .enqueue(spec("revived", "false").with_max_retries(0))
        .await
        .unwrap();
    let now = Utc::now();
    claim_one(&store, "w", now).await;
    store
        .finalize_failure("revived", 1, "exit=1", now)
        .await
        .unwrap();

    store.requeue_dead("revived", Utc::now()).await.unwrap();

    let job = store.job("revived").await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Pending);
    assert_eq!(job.attempts, 0);
    assert_eq!(job.last_error, None);
    assert_eq!(job.exit_code, None);
    assert!(job.run_at <= Utc::now());

    let pending = store
        .list(JobFilter::with_state(StateFilter::Pending))
        .await
        .unwrap();
    assert!(pending.iter().any(|j| j.id == "revived"));
}

pub async fn test_requeue_rejects_non_dead<S: JobStore>(store: S) {
    store.enqueue(spec("alive", "true")).await.unwrap();

    let err = store.requeue_dead("alive", Utc::now()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotDead(_)), "got {err:?}");

    let err = store.requeue_dead("ghost", Utc::now()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)), "got {err:?}");
}

/// Processing rows whose claimant is gone go back through the failure
/// path with error `worker-crashed`; live claimants are untouched.
pub async fn test_reclaim_orphans<S: JobStore>(store: S) {
    let base = Utc::now() - Duration::minutes(10);
    store
        .enqueue(spec("orphan", "sleep 60").with_run_at(base))
        .await
        .unwrap();
    store
        .enqueue(spec("owned", "sleep 60").with_run_at(base + Duration::seconds(1)))
        .await
        .unwrap();
    let now = Utc::now();
    assert_eq!(claim_one(&store, "qworker-1@11111", now).await.id, "orphan");
    assert_eq!(claim_one(&store, "qworker-1@22222", now).await.id, "owned");

    let reclaimed = store
        .reclaim_orphans(now, &|claimant| claimant.ends_with("@22222"))
        .await
        .unwrap();
    assert_eq!(reclaimed, 1);

    let orphan = store.job("orphan").await.unwrap().unwrap();
    assert_eq!(orphan.state, JobState::Pending);
    assert_eq!(orphan.attempts, 1);
    assert_eq!(orphan.claimed_by, None);
    assert_eq!(orphan.last_error.as_deref(), Some("worker-crashed"));

    let owned = store.job("owned").await.unwrap().unwrap();
    assert_eq!(owned.state, JobState::Processing);
    assert_eq!(owned.claimed_by.as_deref(), Some("qworker-1@22222"));
}

pub async fn test_reclaim_exhausted_orphan_goes_dead<S: JobStore>(store: S) {
    store
        .enqueue(spec("doomed", "sleep 60").with_max_retries(0))
        .await
        .unwrap();
    let now = Utc::now();
    claim_one(&store, "qworker-1@11111", now).await;

    let reclaimed = store.reclaim_orphans(now, &|_| false).await.unwrap();
    assert_eq!(reclaimed, 1);

    let job = store.job("doomed").await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Dead);
    assert_eq!(job.last_error.as_deref(), Some("worker-crashed"));
}

/// State and id-prefix filters, including the `failed` pseudo-state.
pub async fn test_list_filters<S: JobStore>(store: S) {
    // Explicit run_at offsets keep the claim order deterministic.
    let base = Utc::now() - Duration::minutes(10);
    store
        .enqueue(spec("app-one", "true").with_run_at(base))
        .await
        .unwrap();
    store
        .enqueue(
            spec("app-two", "false")
                .with_max_retries(3)
                .with_run_at(base + Duration::seconds(1)),
        )
        .await
        .unwrap();
    store
        .enqueue(spec("other", "true").with_run_at(base + Duration::seconds(2)))
        .await
        .unwrap();

    // Drive app-two through one failure so it becomes pending+attempts>0.
    let now = Utc::now();
    let job = claim_one(&store, "w", now).await;
    assert_eq!(job.id, "app-one");
    store.finalize_success("app-one", 0, now).await.unwrap();
    let job = claim_one(&store, "w", now).await;
    assert_eq!(job.id, "app-two");
    store.finalize_failure("app-two", 1, "exit=1", now).await.unwrap();

    let completed = store
        .list(JobFilter::with_state(StateFilter::Completed))
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, "app-one");

    let failed = store
        .list(JobFilter::with_state(StateFilter::Failed))
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, "app-two");

    // `failed` is pending with attempts; plain pending includes it too.
    let pending = store
        .list(JobFilter::with_state(StateFilter::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);

    let prefixed = store
        .list(JobFilter {
            state: None,
            id_prefix: Some("app-".into()),
        })
        .await
        .unwrap();
    assert_eq!(prefixed.len(), 2);
    assert!(prefixed.iter().all(|j| j.id.starts_with("app-")));
}

/// Purge removes exactly the completed rows and nothing else.
pub async fn test_purge_completed_exact<S: JobStore>(store: S) {
    let base = Utc::now() - Duration::minutes(10);
    store
        .enqueue(spec("done-1", "true").with_run_at(base))
        .await
        .unwrap();
    store
        .enqueue(spec("done-2", "true").with_run_at(base + Duration::seconds(1)))
        .await
        .unwrap();
    store
        .enqueue(spec("keep", "true").with_run_at(base + Duration::seconds(2)))
        .await
        .unwrap();
    let now = Utc::now();
    for id in ["done-1", "done-2"] {
        let job = claim_one(&store, "w", now).await;
        assert_eq!(job.id, id);
        store.finalize_success(id, 0, now).await.unwrap();
    }

    let purged = store.purge_completed().await.unwrap();
    assert_eq!(purged, 2);

    let rest = store.list(JobFilter::default()).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].id, "keep");

    // Purging again removes nothing.
    assert_eq!(store.purge_completed().await.unwrap(), 0);
}

pub async fn test_counts_and_metrics<S: JobStore>(store: S) {
    let base = Utc::now() - Duration::minutes(10);
    store
        .enqueue(spec("c", "true").with_run_at(base))
        .await
        .unwrap();
    store
        .enqueue(
            spec("d", "false")
                .with_max_retries(0)
                .with_run_at(base + Duration::seconds(1)),
        )
        .await
        .unwrap();
    store
        .enqueue(spec("p", "true").with_run_at(base + Duration::seconds(2)))
        .await
        .unwrap();
    let now = Utc::now();
    assert_eq!(claim_one(&store, "w", now).await.id, "c");
    store.finalize_success("c", 0, now).await.unwrap();
    assert_eq!(claim_one(&store, "w", now).await.id, "d");
    store.finalize_failure("d", 1, "exit=1", now).await.unwrap();

    let counts = store.counts().await.unwrap();
    assert_eq!(counts.pending, 1);
    assert_eq!(counts.processing, 0);
    assert_eq!(counts.completed, 1);
    assert_eq!(counts.dead, 1);
    assert_eq!(counts.total(), 3);

    let metrics = store.metrics().await.unwrap();
    assert_eq!(metrics.total, 3);
    assert_eq!(metrics.completed, 1);
    assert_eq!(metrics.dead, 1);
    assert_eq!(metrics.failed, 0);
    assert!(metrics.avg_duration_seconds.is_some());
}

pub async fn test_config_round_trip<S: JobStore>(store: S) {
    store.config_set("backoff_base", "3").await.unwrap();
    assert_eq!(
        store.config_get("backoff_base").await.unwrap().as_deref(),
        Some("3")
    );

    let err = store.config_set("nope", "1").await.unwrap_err();
    assert!(matches!(err, StoreError::UnknownConfig(_)), "got {err:?}");
    let err = store.config_get("nope").await.unwrap_err();
    assert!(matches!(err, StoreError::UnknownConfig(_)), "got {err:?}");

    let err = store.config_set("backoff_base", "1").await.unwrap_err();
    assert!(
        matches!(err, StoreError::InvalidConfig { .. }),
        "got {err:?}"
    );
    // The rejected write left the previous value in place.
    assert_eq!(
        store.config_get("backoff_base").await.unwrap().as_deref(),
        Some("3")
    );
}

pub async fn test_config_defaults_seeded<S: JobStore>(store: S) {
    for key in ConfigKey::ALL {
        let value = store.config_get(key.name()).await.unwrap();
        assert_eq!(value.as_deref(), Some(key.default_value()), "{}", key.name());
    }
}

pub async fn test_supervisor_record_round_trip<S: JobStore>(store: S) {
    assert!(store.supervisor_record().await.unwrap().is_none());

    let record = SupervisorRecord {
        pid: 4242,
        started_at: Utc::now(),
        worker_count: 4,
        shutdown_requested: false,
    };
    store.put_supervisor_record(&record).await.unwrap();

    let read = store.supervisor_record().await.unwrap().unwrap();
    assert_eq!(read.pid, 4242);
    assert_eq!(read.worker_count, 4);
    assert!(!read.shutdown_requested);

    store.request_supervisor_shutdown().await.unwrap();
    let read = store.supervisor_record().await.unwrap().unwrap();
    assert!(read.shutdown_requested);

    // Clearing with the wrong pid is a no-op.
    store.clear_supervisor_record(1).await.unwrap();
    assert!(store.supervisor_record().await.unwrap().is_some());

    store.clear_supervisor_record(4242).await.unwrap();
    assert!(store.supervisor_record().await.unwrap().is_none());
}

/// Invariant: updated_at never decreases, even when the caller's clock
/// runs behind the row's last update.
pub async fn test_updated_at_is_monotonic<S: JobStore>(store: S) {
    store.enqueue(spec("steady", "false")).await.unwrap();
    let created = store.job("steady").await.unwrap().unwrap().updated_at;

    let skewed = created - Duration::seconds(30);
    claim_one(&store, "w", created).await;
    store
        .finalize_failure("steady", 1, "exit=1", skewed)
        .await
        .unwrap();

    let job = store.job("steady").await.unwrap().unwrap();
    assert!(
        job.updated_at >= created,
        "updated_at went backwards: {} < {created}",
        job.updated_at
    );
}
