use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::TransferResult;

/// Build the connection pool the Postgres store provider draws sessions from
pub async fn create_pool(config: &DatabaseConfig) -> TransferResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .connect(&config.url)
        .await?;

    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "💾 Database pool connected"
    );

    Ok(pool)
}

/// Round-trip a trivial query through the pool
pub async fn health_check(pool: &PgPool) -> TransferResult<bool> {
    let health: i32 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;
    Ok(health == 1)
}
