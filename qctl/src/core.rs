//! Implementation agnostic job/store model and re-exports of 3rd party types/crates used in public interface.

/// An alias for `chrono::DateTime<chrono::Utc>`
pub type DateTime = chrono::DateTime<chrono::Utc>;
pub use chrono::{Duration, Utc};
pub use serde_json;
pub use tokio_util::sync::CancellationToken;

pub mod config;
pub mod job;
pub mod store;
