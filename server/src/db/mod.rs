//! Connection pool setup and embedded migrations.
//!
//! The pool is built once at startup and migrations run before the
//! listener binds, so request handlers only ever see the current schema.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

fn max_connections() -> u32 {
    std::env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5)
}

/// Connect to Postgres and bring the schema up to date.
///
/// # Errors
///
/// Returns an error when the connection cannot be established or a
/// migration fails to apply.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections())
        .connect(database_url)
        .await?;
    sqlx::migrate!("src/db/migrations").run(&pool).await?;
    Ok(pool)
}
