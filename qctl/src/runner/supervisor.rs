//! The supervisor: owns the worker pool, the persisted supervisor
//! record, and signal-driven shutdown.
//!
//! Exactly one supervisor runs per host. Its identity lives in the
//! store rather than a pid file, so a restarted CLI can report or stop
//! a supervisor it did not start. Liveness is an OS-level check on the
//! recorded pid; a stale record for a dead process is ignored and
//! replaced.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use serde::Serialize;
use thiserror::Error;
use tokio::signal::unix::{signal as unix_signal, SignalKind};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::core::config::RuntimeConfig;
use crate::core::job::JobCounts;
use crate::core::store::{JobStore, StoreError, SupervisorRecord};
use crate::core::{CancellationToken, Utc};
use crate::runner::executor::CommandExecutor;
use crate::runner::log_sink::FileLogSink;
use crate::runner::worker::Worker;

/// Errors from supervisor lifecycle operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SupervisorError {
    #[error("a supervisor is already running (pid {pid})")]
    AlreadyRunning { pid: i32 },

    #[error("no supervisor is running")]
    NotRunning,

    #[error("supervisor (pid {pid}) did not shut down within the wait window")]
    ShutdownTimeout { pid: i32 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("signal delivery failed: {0}")]
    Signal(#[source] anyhow::Error),
}

/// Tunables for the supervisor.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SupervisorOptions {
    /// Directory for per-job log files (default: `logs`).
    pub log_dir: PathBuf,

    /// How long `stop()` waits for the record to clear (default: 30s).
    pub stop_wait: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            stop_wait: Duration::from_secs(30),
        }
    }
}

/// Snapshot returned by [`Supervisor::status`].
#[derive(Debug, Clone, Serialize)]
pub struct SupervisorStatus {
    pub running: bool,
    pub record: Option<SupervisorRecord>,
    pub counts: JobCounts,
}

pub struct Supervisor<S> {
    store: S,
    options: SupervisorOptions,
}

impl<S> Supervisor<S>
where
    S: JobStore + Clone + 'static,
{
    pub fn new(store: S, options: SupervisorOptions) -> Self {
        Self { store, options }
    }

    /// Run a pool of `count` workers in the foreground until shutdown.
    ///
    /// Startup order matters: the liveness guard first, then orphan
    /// reclamation (jobs left `processing` by a crashed supervisor go
    /// back through the failure path with error `worker-crashed`), then
    /// the record write, then the workers.
    ///
    /// The first SIGINT/SIGTERM lets workers finish their current job;
    /// each of those is bounded by its own timeout plus the kill grace,
    /// so the wait is bounded too. A second signal escalates and
    /// terminates the running process groups.
    pub async fn start(&self, count: u32) -> Result<(), SupervisorError> {
        let pid = std::process::id() as i32;

        if let Some(record) = self.store.supervisor_record().await? {
            if record.pid != pid && process_alive(record.pid) {
                return Err(SupervisorError::AlreadyRunning { pid: record.pid });
            }
            debug!(stale_pid = record.pid, "Ignoring stale supervisor record");
        }

        let now = Utc::now();
        let reclaimed = self
            .store
            .reclaim_orphans(now, &|claimant| {
                claimant_pid(claimant).is_some_and(process_alive)
            })
            .await?;
        if reclaimed > 0 {
            info!(reclaimed, "Reclaimed orphaned jobs from a previous run");
        }

        self.store
            .put_supervisor_record(&SupervisorRecord {
                pid,
                started_at: now,
                worker_count: count,
                shutdown_requested: false,
            })
            .await?;

        let config = RuntimeConfig::load(&self.store).await?;
        let executor = CommandExecutor::new(Arc::new(FileLogSink::new(&self.options.log_dir)));
        let shutdown = CancellationToken::new();
        let kill = CancellationToken::new();

        let mut workers = JoinSet::new();
        for n in 1..=count {
            let worker = Worker::new(
                worker_name(n, pid as u32),
                self.store.clone(),
                executor.clone(),
                config.poll_interval,
                shutdown.child_token(),
                kill.child_token(),
            );
            workers.spawn(worker.run());
        }
        info!(pid, worker_count = count, "Supervisor started");

        let mut sigint = unix_signal(SignalKind::interrupt())
            .map_err(|e| SupervisorError::Signal(anyhow::Error::from(e)))?;
        let mut sigterm = unix_signal(SignalKind::terminate())
            .map_err(|e| SupervisorError::Signal(anyhow::Error::from(e)))?;

        let mut signals_seen = 0u32;
        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    self.on_signal(&mut signals_seen, &shutdown, &kill).await;
                }
                _ = sigterm.recv() => {
                    self.on_signal(&mut signals_seen, &shutdown, &kill).await;
                }
                joined = workers.join_next() => match joined {
                    Some(Ok(())) => debug!("Worker task finished"),
                    Some(Err(e)) => warn!(error = %e, "Worker task aborted"),
                    None => break,
                }
            }
        }

        self.store.clear_supervisor_record(pid).await?;
        info!(pid, "Supervisor stopped");
        Ok(())
    }

    async fn on_signal(
        &self,
        signals_seen: &mut u32,
        shutdown: &CancellationToken,
        kill: &CancellationToken,
    ) {
        *signals_seen += 1;
        if *signals_seen == 1 {
            info!("Shutdown requested, workers will finish their current job");
            if let Err(e) = self.store.request_supervisor_shutdown().await {
                warn!(error = %e, "Could not persist shutdown flag");
            }
            shutdown.cancel();
        } else {
            warn!("Second shutdown signal, terminating running jobs");
            kill.cancel();
        }
    }

    /// Ask the recorded supervisor to shut down and wait for it to go.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        let Some(record) = self.store.supervisor_record().await? else {
            return Err(SupervisorError::NotRunning);
        };
        if !process_alive(record.pid) {
            // Dead supervisor left its record behind; clean up and report.
            self.store.clear_supervisor_record(record.pid).await?;
            return Err(SupervisorError::NotRunning);
        }

        self.store.request_supervisor_shutdown().await?;
        signal::kill(Pid::from_raw(record.pid), Signal::SIGTERM).map_err(|e| {
            SupervisorError::Signal(anyhow::anyhow!(
                "sending SIGTERM to pid {}: {e}",
                record.pid
            ))
        })?;
        info!(pid = record.pid, "Sent SIGTERM to supervisor");

        let deadline = Instant::now() + self.options.stop_wait;
        loop {
            match self.store.supervisor_record().await? {
                Some(current) if current.pid == record.pid => {}
                _ => return Ok(()),
            }
            if Instant::now() >= deadline {
                return Err(SupervisorError::ShutdownTimeout { pid: record.pid });
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    /// Current record, liveness and per-state job counts.
    pub async fn status(&self) -> Result<SupervisorStatus, SupervisorError> {
        let record = self.store.supervisor_record().await?;
        let counts = self.store.counts().await?;
        let running = record.as_ref().is_some_and(|r| process_alive(r.pid));
        Ok(SupervisorStatus {
            running,
            record,
            counts,
        })
    }
}

/// Worker identity: `qworker-<n>@<pid>`. The pid suffix lets orphan
/// reclamation recover the owning supervisor from `claimed_by` alone.
pub fn worker_name(index: u32, pid: u32) -> String {
    format!("qworker-{index}@{pid}")
}

/// Extract the supervisor pid from a worker identity.
pub fn claimant_pid(worker_id: &str) -> Option<i32> {
    worker_id.rsplit_once('@')?.1.parse().ok()
}

/// Does a process with this pid exist on this host?
pub fn process_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    // Signal 0 probes without delivering; EPERM still means "exists".
    match signal::kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_names_carry_the_pid() {
        let name = worker_name(3, 4242);
        assert_eq!(name, "qworker-3@4242");
        assert_eq!(claimant_pid(&name), Some(4242));
    }

    #[test]
    fn claimant_pid_rejects_garbage() {
        assert_eq!(claimant_pid("qworker-1"), None);
        assert_eq!(claimant_pid("qworker-1@not-a-pid"), None);
        assert_eq!(claimant_pid(""), None);
    }

    #[test]
    fn own_process_is_alive() {
        assert!(process_alive(std::process::id() as i32));
    }

    #[test]
    fn nonsense_pids_are_dead() {
        assert!(!process_alive(0));
        assert!(!process_alive(-1));
        // Max pid on Linux is far below this.
        assert!(!process_alive(i32::MAX));
    }
}
