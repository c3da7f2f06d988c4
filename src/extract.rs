//! Schema extraction from SQLite files.
//!
//! Reads `sqlite_master` and `PRAGMA table_info` from a candidate file and
//! produces a [`SchemaDescription`]. The file is opened read-only and is
//! never created. Extraction never fails: anything that prevents reading
//! the metadata (not a database, locked, corrupt, too slow) yields an empty
//! description, which callers treat as unreadable.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, Row};
use tracing::{debug, warn};

use squid_core::models::{ColumnAttributes, ColumnSet, SchemaDescription};
use squid_core::SquidError;

/// Read the schema of the SQLite file at `path`, giving up after `timeout`.
pub async fn extract_schema(path: &Path, timeout: Duration) -> SchemaDescription {
    match tokio::time::timeout(timeout, read_schema(path, timeout)).await {
        Ok(Ok(schema)) => {
            if schema.is_empty() {
                debug!(path = %path.display(), "no tables found");
            }
            schema
        }
        Ok(Err(e)) => {
            let err = SquidError::UnreadableSource {
                path: path.to_path_buf(),
                reason: format!("{:#}", e),
            };
            debug!("{}", err);
            SchemaDescription::default()
        }
        Err(_) => {
            warn!(
                path = %path.display(),
                timeout_secs = timeout.as_secs(),
                "timed out reading schema"
            );
            SchemaDescription::default()
        }
    }
}

async fn read_schema(path: &Path, busy_timeout: Duration) -> Result<SchemaDescription> {
    let mut conn = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .create_if_missing(false)
        .busy_timeout(busy_timeout)
        .disable_statement_logging()
        .connect()
        .await?;

    let result = read_tables(&mut conn).await;
    if let Err(e) = conn.close().await {
        debug!(path = %path.display(), "closing candidate failed: {}", e);
    }
    result
}

async fn read_tables(conn: &mut SqliteConnection) -> Result<SchemaDescription> {
    let names: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(&mut *conn)
            .await?;

    let mut tables = BTreeMap::new();
    for name in names {
        match read_columns(conn, &name).await {
            Ok(columns) => {
                tables.insert(name, columns);
            }
            Err(e) => warn!(table = %name, "skipping table: {:#}", e),
        }
    }

    Ok(SchemaDescription::from_tables(tables))
}

async fn read_columns(conn: &mut SqliteConnection, table: &str) -> Result<ColumnSet> {
    let pragma = format!("PRAGMA table_info({})", quote_identifier(table));
    let rows = sqlx::query(&pragma).fetch_all(&mut *conn).await?;

    let mut columns = ColumnSet::new();
    for row in rows {
        // PRAGMA results carry no declared types; decode by value.
        let name: String = row.try_get_unchecked("name")?;
        let declared_type: String = row.try_get_unchecked("type")?;
        let not_null: i64 = row.try_get_unchecked("notnull")?;
        let default_value: Option<String> = row.try_get_unchecked("dflt_value")?;

        columns.insert(
            name,
            ColumnAttributes {
                declared_type,
                not_null: not_null != 0,
                default_value,
            },
        );
    }
    Ok(columns)
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
