#![doc = include_str!("../README.md")]

pub mod core;

/// Thin façade over a [`core::store::JobStore`] for front-ends (CLI, dashboard).
pub mod admin;

/// Shared test specifications for store implementations.
///
/// These test functions ensure consistent behavior across all JobStore
/// implementations. Backend tests should call these functions with their
/// store instance.
#[doc(hidden)]
pub mod store_spec;

/// Worker runtime: command executor, worker loop and supervisor.
#[cfg(feature = "runner")]
pub mod runner {
    pub mod executor;
    pub mod log_sink;
    pub mod supervisor;
    pub mod worker;
}

/// Re-exports to simplify importing this crate types.
pub mod prelude {
    pub use super::admin::Admin;
    pub use super::core::{
        config::{ConfigKey, RuntimeConfig},
        job::{Job, JobCounts, JobFilter, JobSpec, JobState, QueueMetrics, StateFilter},
        store::{JobStore, StoreError, SupervisorRecord},
        CancellationToken, DateTime, Duration, Utc,
    };
    #[cfg(feature = "runner")]
    pub use super::runner::{
        executor::{CommandExecutor, ExecOutcome},
        log_sink::{FileLogSink, LogSink},
        supervisor::{Supervisor, SupervisorError, SupervisorOptions, SupervisorStatus},
        worker::Worker,
    };
    pub use serde::{Deserialize, Serialize};
}
