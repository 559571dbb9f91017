//! SQLite implementation of the qctl [`JobStore`](qctl::core::store::JobStore).
//!
//! One database file holds the jobs table, the config table and the
//! supervisor record. All state transitions are single statements or
//! transactions, so the claim contract holds across any number of
//! workers sharing the file.

mod store;
mod types;

pub use store::SqliteStore;

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use qctl::core::store::StoreError;

/// Open (creating if missing) the database at `path`, bootstrap the
/// schema and seed config defaults.
pub async fn connect(path: impl AsRef<Path>) -> Result<SqliteStore, StoreError> {
    let options = SqliteConnectOptions::new()
        .filename(path.as_ref())
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .context("Failed to open the job database")?;

    let store = SqliteStore::with_pool(pool);
    store.bootstrap().await?;
    Ok(store)
}
