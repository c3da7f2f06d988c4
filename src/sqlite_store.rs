//! SQLite-backed [`CatalogStore`] implementation.
//!
//! Records live in the `known_databases` table. Rows are decoded through
//! [`StoredRow`], which validates every field and reports
//! [`SquidError::MalformedRecord`] instead of handing back a half-built
//! record.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tokio::sync::{Mutex, MutexGuard};

use squid_core::models::{CatalogRecord, SchemaDescription};
use squid_core::store::CatalogStore;
use squid_core::SquidError;

const SELECT_COLUMNS: &str = "SELECT id, program_family, program_name, program_versions, \
                              db_name, schema_json, fingerprint FROM known_databases";

/// SQLite implementation of the [`CatalogStore`] trait.
pub struct SqliteCatalogStore {
    pool: SqlitePool,
    writes: Mutex<()>,
}

impl SqliteCatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            writes: Mutex::new(()),
        }
    }

    /// Held across a learner's fingerprint lookup and the write that
    /// follows it, so check-then-act sequences never interleave.
    pub async fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// A `known_databases` row exactly as stored.
#[derive(Debug, Clone)]
pub struct StoredRow {
    pub id: i64,
    pub program_family: Option<String>,
    pub program_name: Option<String>,
    pub program_versions: Option<String>,
    pub db_name: Option<String>,
    pub schema_json: Option<String>,
    pub fingerprint: Option<String>,
}

impl StoredRow {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            program_family: row.try_get("program_family")?,
            program_name: row.try_get("program_name")?,
            program_versions: row.try_get("program_versions")?,
            db_name: row.try_get("db_name")?,
            schema_json: row.try_get("schema_json")?,
            fingerprint: row.try_get("fingerprint")?,
        })
    }
}

impl TryFrom<StoredRow> for CatalogRecord {
    type Error = SquidError;

    fn try_from(row: StoredRow) -> Result<Self, SquidError> {
        let id = row.id;
        let malformed = |field: &'static str, reason: String| SquidError::MalformedRecord {
            id,
            field,
            reason,
        };
        let required = |field: &'static str, value: Option<String>| {
            value
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| malformed(field, "is missing".to_string()))
        };

        let program_name = required("program_name", row.program_name)?;
        let db_name = required("db_name", row.db_name)?;
        let fingerprint = required("fingerprint", row.fingerprint)?;

        let versions_json = required("program_versions", row.program_versions)?;
        let program_versions = decode_versions(&versions_json)
            .map_err(|reason| malformed("program_versions", reason))?;

        let schema_json = required("schema_json", row.schema_json)?;
        let schema = SchemaDescription::from_json(&schema_json)
            .map_err(|e| malformed("schema_json", format!("is not a valid schema: {}", e)))?;
        if schema.is_empty() {
            return Err(malformed("schema_json", "has no tables".to_string()));
        }

        Ok(CatalogRecord {
            id: Some(id),
            db_name,
            program_family: row.program_family,
            program_name,
            program_versions,
            schema,
            fingerprint,
        })
    }
}

/// Versions are stored as a non-empty JSON list of strings.
fn decode_versions(json: &str) -> Result<Vec<String>, String> {
    let versions: Vec<String> = serde_json::from_str(json)
        .map_err(|e| format!("is not a JSON list of strings: {}", e))?;
    if versions.is_empty() {
        return Err("is an empty list".to_string());
    }
    Ok(versions)
}

fn encode_versions(versions: &[String]) -> Result<String> {
    Ok(serde_json::to_string(versions)?)
}

fn decode_rows(rows: &[SqliteRow]) -> Result<Vec<CatalogRecord>> {
    rows.iter()
        .map(|row| -> Result<CatalogRecord> {
            let stored = StoredRow::from_row(row)?;
            Ok(CatalogRecord::try_from(stored)?)
        })
        .collect()
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn all_records(&self) -> Result<Vec<CatalogRecord>> {
        let rows = sqlx::query(&format!("{} ORDER BY id", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        decode_rows(&rows)
    }

    async fn records_by_fingerprint(&self, fingerprint: &str) -> Result<Vec<CatalogRecord>> {
        let rows = sqlx::query(&format!("{} WHERE fingerprint = ? ORDER BY id", SELECT_COLUMNS))
            .bind(fingerprint)
            .fetch_all(&self.pool)
            .await?;
        decode_rows(&rows)
    }

    async fn insert_record(&self, record: &CatalogRecord) -> Result<i64> {
        let schema_json = record.schema.to_json()?;
        let versions_json = encode_versions(&record.program_versions)?;

        let mut tx = self.pool.begin().await?;

        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM known_databases WHERE fingerprint = ? AND program_name = ?",
        )
        .bind(&record.fingerprint)
        .bind(&record.program_name)
        .fetch_one(&mut *tx)
        .await?;
        if existing > 0 {
            return Err(SquidError::conflict(
                &record.fingerprint,
                &record.program_name,
                "a record with this key already exists",
            )
            .into());
        }

        let result = sqlx::query(
            r#"
            INSERT INTO known_databases (program_family, program_name, program_versions,
                                         db_name, schema_json, fingerprint)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.program_family)
        .bind(&record.program_name)
        .bind(&versions_json)
        .bind(&record.db_name)
        .bind(&schema_json)
        .bind(&record.fingerprint)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.last_insert_rowid())
    }

    async fn update_versions(
        &self,
        fingerprint: &str,
        program_name: &str,
        expected: &[String],
        versions: &[String],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let current: Vec<(i64, Option<String>)> = sqlx::query_as(
            "SELECT id, program_versions FROM known_databases \
             WHERE fingerprint = ? AND program_name = ?",
        )
        .bind(fingerprint)
        .bind(program_name)
        .fetch_all(&mut *tx)
        .await?;

        let (id, stored) = match current.as_slice() {
            [(id, stored)] => (*id, stored.clone().unwrap_or_default()),
            [] => return Err(SquidError::conflict(fingerprint, program_name, "record not found").into()),
            _ => {
                return Err(
                    SquidError::conflict(fingerprint, program_name, "duplicate records").into(),
                )
            }
        };

        let stored_versions = decode_versions(&stored).map_err(|reason| SquidError::MalformedRecord {
            id,
            field: "program_versions",
            reason,
        })?;
        if stored_versions != expected {
            return Err(SquidError::conflict(
                fingerprint,
                program_name,
                "versions changed since they were read",
            )
            .into());
        }

        sqlx::query("UPDATE known_databases SET program_versions = ? WHERE id = ?")
            .bind(encode_versions(versions)?)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM known_databases")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
