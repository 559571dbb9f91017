//! Child-process execution for claimed jobs.
//!
//! Runs one job's command through a shell with a strict timeout,
//! capturing interleaved stdout/stderr into the job's log sink. The
//! executor never touches the store; the worker maps its outcome to a
//! finalize call.

use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::core::job::Job;
use crate::core::CancellationToken;
use crate::runner::log_sink::LogSink;

/// How long a terminated process group gets before SIGKILL.
const TERM_GRACE: Duration = Duration::from_secs(2);

/// Result of a single execution attempt.
///
/// Only `Completed { exit_code: 0 }` counts as success; everything else
/// is a failure the worker feeds into the retry machinery. A command the
/// shell cannot find exits 127 and therefore surfaces as `Completed`;
/// `SpawnFailed` means the shell itself could not be started (or the
/// log sink refused to open).
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    Completed { exit_code: i32, duration: Duration },
    TimedOut { duration: Duration },
    Terminated { duration: Duration },
    SpawnFailed { error: String },
}

impl ExecOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecOutcome::Completed { exit_code: 0, .. })
    }

    /// Exit code to record on the job row; non-exit outcomes map to -1.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExecOutcome::Completed { exit_code, .. } => *exit_code,
            _ => -1,
        }
    }

    /// Short failure description for `last_error`, `None` on success.
    pub fn failure_message(&self) -> Option<String> {
        match self {
            ExecOutcome::Completed { exit_code: 0, .. } => None,
            ExecOutcome::Completed { exit_code, .. } => Some(format!("exit={exit_code}")),
            ExecOutcome::TimedOut { duration } => {
                Some(format!("timeout after {:.1}s", duration.as_secs_f64()))
            }
            ExecOutcome::Terminated { .. } => Some("terminated during shutdown".to_string()),
            ExecOutcome::SpawnFailed { error } => Some(format!("spawn failed: {error}")),
        }
    }
}

/// Runs job commands as children in their own process group.
#[derive(Clone)]
pub struct CommandExecutor {
    sink: Arc<dyn LogSink>,
}

impl CommandExecutor {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    /// Execute `job`'s command, bounded by `job.timeout_seconds` on a
    /// monotonic clock.
    ///
    /// Cancelling `kill` terminates the child's process group early;
    /// the worker uses it to escalate a second shutdown signal.
    pub async fn run(&self, job: &Job, kill: &CancellationToken) -> ExecOutcome {
        let started = Instant::now();

        let stdout = match self.sink.open_append(&job.id) {
            Ok(file) => file,
            Err(e) => {
                return ExecOutcome::SpawnFailed {
                    error: format!("log sink: {e}"),
                }
            }
        };
        let stderr = match stdout.try_clone() {
            Ok(file) => file,
            Err(e) => {
                return ExecOutcome::SpawnFailed {
                    error: format!("log sink: {e}"),
                }
            }
        };
        let _ = self
            .sink
            .append_line(&job.id, &format!("executing: {}", job.command));

        // Through a shell so quoting behaves the way users expect, and
        // in a fresh process group so a timeout can take down the whole
        // pipeline, not just the leader.
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&job.command)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .process_group(0)
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let _ = self.sink.append_line(&job.id, &format!("spawn failed: {e}"));
                return ExecOutcome::SpawnFailed {
                    error: e.to_string(),
                };
            }
        };

        let timeout = Duration::from_secs(u64::from(job.timeout_seconds));
        let outcome = tokio::select! {
            status = child.wait() => match status {
                Ok(status) => ExecOutcome::Completed {
                    // A signal-terminated child has no exit code.
                    exit_code: status.code().unwrap_or(-1),
                    duration: started.elapsed(),
                },
                Err(e) => ExecOutcome::SpawnFailed {
                    error: format!("wait: {e}"),
                },
            },
            _ = tokio::time::sleep(timeout) => {
                warn!(job_id = %job.id, timeout_seconds = job.timeout_seconds, "Job timed out, terminating process group");
                self.terminate_group(&mut child).await;
                ExecOutcome::TimedOut { duration: started.elapsed() }
            }
            _ = kill.cancelled() => {
                warn!(job_id = %job.id, "Shutdown escalation, terminating process group");
                self.terminate_group(&mut child).await;
                ExecOutcome::Terminated { duration: started.elapsed() }
            }
        };

        let footer = match outcome.failure_message() {
            None => format!("SUCCESS exit=0 ({:.1}s)", started.elapsed().as_secs_f64()),
            Some(msg) => format!("FAIL {msg}"),
        };
        let _ = self.sink.append_line(&job.id, &footer);
        debug!(job_id = %job.id, outcome = ?outcome, "Execution finished");
        outcome
    }

    /// SIGTERM the child's process group, then SIGKILL after the grace
    /// window.
    async fn terminate_group(&self, child: &mut Child) {
        let Some(pid) = child.id() else {
            // Already reaped.
            return;
        };
        let pgid = Pid::from_raw(pid as i32);
        let _ = signal::killpg(pgid, Signal::SIGTERM);
        if tokio::time::timeout(TERM_GRACE, child.wait()).await.is_err() {
            let _ = signal::killpg(pgid, Signal::SIGKILL);
            let _ = child.wait().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job::JobState;
    use crate::core::Utc;
    use crate::runner::log_sink::FileLogSink;

    fn job(id: &str, command: &str, timeout_seconds: u32) -> Job {
        Job {
            id: id.into(),
            command: command.into(),
            state: JobState::Processing,
            priority: 0,
            attempts: 0,
            max_retries: 0,
            timeout_seconds,
            run_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            claimed_by: Some("qworker-test".into()),
            last_error: None,
            exit_code: None,
        }
    }

    fn make_executor(dir: &std::path::Path) -> (CommandExecutor, FileLogSink) {
        let sink = FileLogSink::new(dir);
        (CommandExecutor::new(Arc::new(sink.clone())), sink)
    }

    #[tokio::test]
    async fn successful_command() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, sink) = make_executor(dir.path());

        let outcome = executor
            .run(&job("ok", "echo hello", 10), &CancellationToken::new())
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(outcome.failure_message(), None);

        let log = std::fs::read_to_string(sink.path_for("ok")).unwrap();
        assert!(log.contains("executing: echo hello"));
        assert!(log.contains("hello"));
        assert!(log.contains("SUCCESS exit=0"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, _) = make_executor(dir.path());

        let outcome = executor
            .run(&job("fail", "exit 3", 10), &CancellationToken::new())
            .await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.exit_code(), 3);
        assert_eq!(outcome.failure_message().unwrap(), "exit=3");
    }

    #[tokio::test]
    async fn stdout_and_stderr_share_the_sink() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, sink) = make_executor(dir.path());

        let outcome = executor
            .run(
                &job("both", "echo out; echo err 1>&2", 10),
                &CancellationToken::new(),
            )
            .await;

        assert!(outcome.is_success());
        let log = std::fs::read_to_string(sink.path_for("both")).unwrap();
        assert!(log.contains("out"));
        assert!(log.contains("err"));
    }

    #[tokio::test]
    async fn shell_quoting_applies() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, sink) = make_executor(dir.path());

        let outcome = executor
            .run(
                &job("quote", "echo 'a b'  \"$HOME\" | wc -l", 10),
                &CancellationToken::new(),
            )
            .await;

        assert!(outcome.is_success());
        let log = std::fs::read_to_string(sink.path_for("quote")).unwrap();
        assert!(log.contains('1'));
    }

    #[tokio::test]
    async fn timeout_kills_the_child_within_grace() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, sink) = make_executor(dir.path());

        let started = Instant::now();
        let outcome = executor
            .run(&job("slow", "sleep 60", 1), &CancellationToken::new())
            .await;
        let elapsed = started.elapsed();

        assert!(matches!(outcome, ExecOutcome::TimedOut { .. }));
        assert_eq!(outcome.exit_code(), -1);
        assert!(outcome.failure_message().unwrap().contains("timeout"));
        // 1s budget + 2s grace, with headroom for a slow machine.
        assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");

        let log = std::fs::read_to_string(sink.path_for("slow")).unwrap();
        assert!(log.contains("FAIL timeout"));
    }

    #[tokio::test]
    async fn missing_binary_surfaces_as_shell_exit() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, _) = make_executor(dir.path());

        let outcome = executor
            .run(
                &job("gone", "definitely-not-a-binary-qctl", 10),
                &CancellationToken::new(),
            )
            .await;

        // The shell spawns fine and reports 127 itself.
        assert_eq!(outcome.exit_code(), 127);
        assert!(outcome.failure_message().unwrap().contains("127"));
    }

    #[tokio::test]
    async fn kill_token_terminates_early() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, _) = make_executor(dir.path());

        let kill = CancellationToken::new();
        let killer = {
            let kill = kill.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                kill.cancel();
            })
        };

        let started = Instant::now();
        let outcome = executor.run(&job("killed", "sleep 60", 30), &kill).await;
        killer.await.unwrap();

        assert!(matches!(outcome, ExecOutcome::Terminated { .. }));
        assert!(outcome.failure_message().unwrap().contains("terminated"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
