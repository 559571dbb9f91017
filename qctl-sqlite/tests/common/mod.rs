use sqlx::sqlite::SqlitePoolOptions;

use qctl_sqlite::SqliteStore;

/// Fresh in-memory store with seeded config defaults.
///
/// A single-connection pool, because every new SQLite connection to
/// `:memory:` would otherwise get its own database.
pub async fn memory_store() -> SqliteStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    let store = SqliteStore::with_pool(pool);
    store.bootstrap().await.expect("bootstrap");
    store
}
