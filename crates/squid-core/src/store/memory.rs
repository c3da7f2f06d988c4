//! In-memory [`CatalogStore`] implementation for testing.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`; each write takes the
//! lock for its whole check-and-mutate sequence.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::error::SquidError;
use crate::models::CatalogRecord;

use super::CatalogStore;

/// In-memory catalog.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<Vec<CatalogRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store directly, bypassing the key check.
    pub fn with_records(records: Vec<CatalogRecord>) -> Self {
        let records = records
            .into_iter()
            .enumerate()
            .map(|(i, mut r)| {
                r.id = Some(i as i64 + 1);
                r
            })
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }
}

fn poisoned() -> anyhow::Error {
    anyhow!("in-memory catalog lock poisoned")
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn all_records(&self) -> Result<Vec<CatalogRecord>> {
        Ok(self.records.read().map_err(|_| poisoned())?.clone())
    }

    async fn records_by_fingerprint(&self, fingerprint: &str) -> Result<Vec<CatalogRecord>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records
            .iter()
            .filter(|r| r.fingerprint == fingerprint)
            .cloned()
            .collect())
    }

    async fn insert_record(&self, record: &CatalogRecord) -> Result<i64> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        if records.iter().any(|r| {
            r.fingerprint == record.fingerprint && r.program_name == record.program_name
        }) {
            return Err(SquidError::conflict(
                &record.fingerprint,
                &record.program_name,
                "a record with this key already exists",
            )
            .into());
        }

        let id = records.iter().filter_map(|r| r.id).max().unwrap_or(0) + 1;
        let mut stored = record.clone();
        stored.id = Some(id);
        records.push(stored);
        Ok(id)
    }

    async fn update_versions(
        &self,
        fingerprint: &str,
        program_name: &str,
        expected: &[String],
        versions: &[String],
    ) -> Result<()> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let mut matching = records
            .iter_mut()
            .filter(|r| r.fingerprint == fingerprint && r.program_name == program_name);

        let target = match (matching.next(), matching.next()) {
            (Some(target), None) => target,
            (None, _) => {
                return Err(SquidError::conflict(fingerprint, program_name, "record not found").into())
            }
            (Some(_), Some(_)) => {
                return Err(
                    SquidError::conflict(fingerprint, program_name, "duplicate records").into(),
                )
            }
        };

        if target.program_versions != expected {
            return Err(SquidError::conflict(
                fingerprint,
                program_name,
                "versions changed since they were read",
            )
            .into());
        }
        target.program_versions = versions.to_vec();
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.records.read().map_err(|_| poisoned())?.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnAttributes, ColumnSet, ProgramIdentity, SchemaDescription};

    fn record(program: &str) -> CatalogRecord {
        let columns: ColumnSet =
            std::iter::once(("id".to_string(), ColumnAttributes::new("INTEGER", true, None)))
                .collect();
        let schema: SchemaDescription = std::iter::once(("t".to_string(), columns)).collect();
        let identity = ProgramIdentity {
            program_family: None,
            program_name: program.to_string(),
            program_version: "1".to_string(),
        };
        CatalogRecord::new("db", &identity, schema)
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_key() {
        let store = InMemoryStore::new();
        assert_eq!(store.insert_record(&record("a")).await.unwrap(), 1);
        assert_eq!(store.insert_record(&record("b")).await.unwrap(), 2);

        let err = store.insert_record(&record("a")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SquidError>(),
            Some(SquidError::CatalogWriteConflict { .. })
        ));
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn update_checks_expected_versions() {
        let store = InMemoryStore::new();
        let r = record("a");
        store.insert_record(&r).await.unwrap();

        let stale = vec!["0".to_string()];
        let next = vec!["1".to_string(), "2".to_string()];
        assert!(store
            .update_versions(&r.fingerprint, "a", &stale, &next)
            .await
            .is_err());

        store
            .update_versions(&r.fingerprint, "a", &r.program_versions, &next)
            .await
            .unwrap();
        let stored = store.records_by_fingerprint(&r.fingerprint).await.unwrap();
        assert_eq!(stored[0].program_versions, next);
    }
}
