use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// Bundled schema script executed by the admin table-reset operation.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Opens the connection pool and verifies it with a ping.
///
/// # Errors
/// Returns an error if the database cannot be reached; callers treat this as
/// fatal at startup.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .context("failed to open database pool")?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("database ping failed")?;

    tracing::info!("database connected");
    Ok(pool)
}

/// Executes a statement, retrying up to three times with linear backoff
/// (100/200/300 ms) when the error text reports a deadlock. Scoped to the
/// differential recomputation path only; adapter upserts never retry.
///
/// # Errors
/// Returns the last database error once the attempts are exhausted, or
/// immediately for non-deadlock errors.
pub async fn execute_with_deadlock_retry(pool: &PgPool, sql: &str) -> Result<()> {
    const MAX_ATTEMPTS: u32 = 3;

    for attempt in 1..=MAX_ATTEMPTS {
        match sqlx::query(sql).execute(pool).await {
            Ok(_) => return Ok(()),
            Err(e) if e.to_string().contains("deadlock") && attempt < MAX_ATTEMPTS => {
                tracing::warn!("deadlock detected (attempt {attempt}), retrying");
                tokio::time::sleep(Duration::from_millis(u64::from(attempt) * 100)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Drops and re-creates the snapshot and differential tables from the
/// bundled schema script.
///
/// # Errors
/// Returns an error if any statement in the script fails.
pub async fn recreate_tables(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await
        .context("failed to execute schema script")?;
    tracing::info!("snapshot and differential tables recreated");
    Ok(())
}
