use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::error::Result;

pub type DbPool = SqlitePool;

const MAX_CONNECTIONS: u32 = 5;

/// Initialize the database connection pool and run migrations
///
/// In-memory databases get a single connection, since every pooled
/// connection would otherwise open its own empty database.
pub async fn initialize_db(database_url: &str) -> Result<DbPool> {
  tracing::info!(database_url, "Initializing database");

  let max_connections = if database_url.contains(":memory:") { 1 } else { MAX_CONNECTIONS };

  // Create connection pool
  let pool = SqlitePoolOptions::new()
    .max_connections(max_connections)
    .connect(database_url)
    .await?;

  // Run migrations
  sqlx::migrate!("./migrations").run(&pool).await?;

  tracing::info!("Database initialized successfully");

  Ok(pool)
}
