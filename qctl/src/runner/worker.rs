//! The claim/execute/finalize worker loop.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::core::job::JobState;
use crate::core::store::{JobStore, StoreError};
use crate::core::{CancellationToken, Utc};
use crate::runner::executor::CommandExecutor;

/// A single worker: claims one job at a time, runs it, records the
/// outcome, repeats.
///
/// Within one worker the finalize of a job happens-before the next
/// claim; across workers the store's claim atomicity is the only
/// ordering. Shutdown is cooperative: the `shutdown` token is honored
/// between jobs and during idle sleeps, while the `kill` token
/// escalates into the executor and terminates the running child.
pub struct Worker<S> {
    id: String,
    store: S,
    executor: CommandExecutor,
    poll_interval: Duration,
    shutdown: CancellationToken,
    kill: CancellationToken,
}

impl<S> Worker<S>
where
    S: JobStore,
{
    pub fn new(
        id: impl Into<String>,
        store: S,
        executor: CommandExecutor,
        poll_interval: Duration,
        shutdown: CancellationToken,
        kill: CancellationToken,
    ) -> Self {
        Self {
            id: id.into(),
            store,
            executor,
            poll_interval,
            shutdown,
            kill,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run until shutdown is requested or the store fails.
    ///
    /// A store error mid-loop is not recoverable from inside the worker:
    /// it logs and exits, leaving the supervisor to run below its target
    /// count. Job-level failures never end the loop.
    pub async fn run(self) {
        info!(worker_id = %self.id, "Worker started");
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let claimed = match self.store.claim(&self.id, Utc::now()).await {
                Ok(claimed) => claimed,
                Err(e) => {
                    error!(worker_id = %self.id, error = %e, "Store error while claiming, worker exiting");
                    break;
                }
            };

            let Some(job) = claimed else {
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    _ = self.shutdown.cancelled() => break,
                }
                continue;
            };

            info!(
                worker_id = %self.id,
                job_id = %job.id,
                attempts = job.attempts,
                command = %job.command,
                "Claimed job"
            );

            let outcome = self.executor.run(&job, &self.kill).await;
            let finalized = if outcome.is_success() {
                self.store
                    .finalize_success(&job.id, outcome.exit_code(), Utc::now())
                    .await
                    .map(|_| JobState::Completed)
            } else {
                let message = outcome
                    .failure_message()
                    .unwrap_or_else(|| "execution failed".to_string());
                self.store
                    .finalize_failure(&job.id, outcome.exit_code(), &message, Utc::now())
                    .await
            };

            match finalized {
                Ok(state) => {
                    debug!(worker_id = %self.id, job_id = %job.id, state = %state, "Finalized job");
                }
                Err(StoreError::NotFound(_)) => {
                    // Purged or reclaimed out from under us; not fatal.
                    warn!(worker_id = %self.id, job_id = %job.id, "Job vanished before finalize");
                }
                Err(e) => {
                    error!(worker_id = %self.id, job_id = %job.id, error = %e, "Store error while finalizing, worker exiting");
                    break;
                }
            }
        }
        info!(worker_id = %self.id, "Worker stopped");
    }
}
