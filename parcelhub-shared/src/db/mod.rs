/// Database layer for ParcelHub
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool management with health checks
/// - `migrations`: Database migration runner
/// - `resilience`: Timeouts for store calls and bounded retries for reads
///
/// Models live in the `models` module at crate root level.
///
/// # Example
///
/// ```no_run
/// use parcelhub_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     };
///
///     let pool = create_pool(config).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
pub mod resilience;

pub use resilience::{retry_read, with_timeout, RetryPolicy, StoreError, StoreTimeout};
