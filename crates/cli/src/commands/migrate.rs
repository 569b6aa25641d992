//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! nova-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `NOVATECH_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Migrations live in `crates/api/migrations/` and are embedded in the
//! binary at compile time:
//! ```text
//! migrations/
//! ├── 20260301000001_create_users.sql
//! ├── 20260301000002_create_products.sql
//! ├── 20260301000003_create_carts.sql
//! └── ...
//! ```

use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Apply every pending migration.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let database_url =
        super::database_url().ok_or(MigrationError::MissingEnvVar("NOVATECH_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    let migrator = sqlx::migrate!("../api/migrations");
    tracing::info!(
        available = migrator.iter().count(),
        "Running migrations..."
    );
    migrator.run(&pool).await?;

    tracing::info!("Migrations complete");
    Ok(())
}
