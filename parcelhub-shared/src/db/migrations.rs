/// Database migration runner
///
/// Migrations live in `migrations/` at the workspace root, one SQL file per
/// table, and are embedded at compile time by `sqlx::migrate!`.
///
/// # Example
///
/// ```no_run
/// use parcelhub_shared::db::pool::{create_pool, DatabaseConfig};
/// use parcelhub_shared::db::migrations::run_migrations;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// })
/// .await?;
/// run_migrations(&pool).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::{migrate::MigrateDatabase, postgres::PgPool, Postgres};
use tracing::{debug, info, warn};

/// Runs all pending migrations
///
/// Each migration runs in its own transaction; a failing migration is
/// rolled back and reported.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Starting database migrations");

    match sqlx::migrate!("../migrations").run(pool).await {
        Ok(()) => {
            info!("All database migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Migration failed");
            Err(e)
        }
    }
}

/// Creates the database if it doesn't exist
///
/// Used by the database-backed test suites before connecting. Safe to call
/// from several processes at once: losing the creation race is not an error.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if Postgres::database_exists(database_url).await? {
        debug!("Database already exists");
        return Ok(());
    }

    info!("Database does not exist, creating it");
    if let Err(e) = Postgres::create_database(database_url).await {
        if !Postgres::database_exists(database_url).await? {
            return Err(e);
        }
        debug!("Database was created concurrently");
    }

    Ok(())
}
