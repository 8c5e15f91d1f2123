//! SQLite adapter for catalogue storage.

pub mod connection;
pub mod measure_repository;
pub mod migrations;

pub use connection::{create_pool, create_test_pool, ConnectionError, PoolConfig};
pub use measure_repository::SqliteMeasureRepository;
pub use migrations::{catalogue_migrations, Migration, MigrationError, Migrator};

use sqlx::SqlitePool;

/// Open the catalogue database at `database_url` and bring its schema up to
/// date.
pub async fn initialize_database(database_url: &str) -> anyhow::Result<SqlitePool> {
    let pool = create_pool(database_url, None).await?;
    let applied = Migrator::new(pool.clone()).run(catalogue_migrations()).await?;
    if applied > 0 {
        tracing::info!(applied, "applied catalogue schema migrations");
    }
    Ok(pool)
}
