//! Postgres pool construction and schema bootstrap.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::error::StoreError;

const RETRY_INTERVAL: Duration = Duration::from_secs(2);

const SCHEMA: &str = include_str!("../migrations/0001_schema.sql");

/// Open a pool, retrying every two seconds until `connect_timeout` elapses.
///
/// The database container usually starts alongside the service, so the first
/// attempts are expected to fail.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, StoreError> {
    let url = config.connection_url();
    let deadline = Instant::now() + config.connect_timeout;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let result = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(RETRY_INTERVAL)
            .connect(&url)
            .await;

        match result {
            Ok(pool) => {
                info!(attempt, host = %config.host, database = %config.name, "connected to postgres");
                return Ok(pool);
            }
            Err(err) if Instant::now() + RETRY_INTERVAL < deadline => {
                warn!(attempt, error = %err, "postgres not ready, retrying");
                sleep(RETRY_INTERVAL).await;
            }
            Err(err) => {
                return Err(StoreError::Backend(format!(
                    "could not connect to postgres after {attempt} attempts: {err}"
                )));
            }
        }
    }
}

/// Create tables and indexes if they do not exist yet.
pub async fn apply_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| StoreError::Backend(format!("failed to apply schema: {e}")))?;
    info!("database schema ready");
    Ok(())
}
