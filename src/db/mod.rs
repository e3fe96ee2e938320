//! Postgres pool setup for the profile backend.
//!
//! Migrations under `src/db/migrations` create the `profiles` table and run
//! on every pool init.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Connect and bring the schema up to date.
///
/// # Errors
///
/// Returns an error if the connection or migrations fail.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new().max_connections(max_connections).connect(database_url).await?;
    sqlx::migrate!("src/db/migrations").run(&pool).await?;
    Ok(pool)
}
