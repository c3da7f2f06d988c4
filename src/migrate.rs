use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// `squid init`: create the catalog file and its schema.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    ensure_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the catalog tables and indexes. Idempotent.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS known_databases (
            id INTEGER PRIMARY KEY,
            program_family TEXT,
            program_name TEXT NOT NULL,
            program_versions TEXT NOT NULL,
            db_name TEXT NOT NULL,
            schema_json TEXT NOT NULL,
            fingerprint TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One record per (fingerprint, program_name); the learner relies on it.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_known_databases_key \
         ON known_databases(fingerprint, program_name)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_known_databases_fingerprint \
         ON known_databases(fingerprint)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
