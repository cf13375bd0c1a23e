//! Persistence collaborators for the recap job pipeline.
//!
//! The pipeline only talks to storage through the contracts in [`store`]:
//!
//! - [`RecordStore`]: summary records and their status field.
//! - [`QuotaLedger`]: per-user rolling job counters.
//! - [`JobBackend`]: the durable job queue table.
//!
//! Each contract has a Postgres implementation in [`repositories`] and an
//! in-process implementation in [`memory`] for single-node runs and tests.

use sqlx::postgres::PgPoolOptions;

pub mod error;
pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;

pub use error::StoreError;
pub use store::{JobBackend, QuotaLedger, RecordStore};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Run a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
