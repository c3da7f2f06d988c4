//! Storage abstraction for the SQUID catalog.
//!
//! The [`CatalogStore`] trait is everything the matcher and learner need
//! from persistence. Implementations must uphold the catalog key: at most
//! one record per `(fingerprint, program_name)`.
//!
//! Writes are check-then-act safe on their own: [`insert_record`] refuses
//! to duplicate a key and [`update_versions`] only applies when the stored
//! version list still equals the one the caller read. Either way a lost
//! race surfaces as [`SquidError::CatalogWriteConflict`] instead of a
//! silent overwrite.
//!
//! [`insert_record`]: CatalogStore::insert_record
//! [`update_versions`]: CatalogStore::update_versions
//! [`SquidError::CatalogWriteConflict`]: crate::error::SquidError::CatalogWriteConflict

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::CatalogRecord;

/// Abstract storage backend for the catalog of known schemas.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`all_records`](CatalogStore::all_records) | Full scan, in insertion order |
/// | [`records_by_fingerprint`](CatalogStore::records_by_fingerprint) | Exact-duplicate lookup |
/// | [`insert_record`](CatalogStore::insert_record) | Add a new record |
/// | [`update_versions`](CatalogStore::update_versions) | Replace a record's version list |
/// | [`count`](CatalogStore::count) | Number of records |
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Every record, ordered by id.
    async fn all_records(&self) -> Result<Vec<CatalogRecord>>;

    /// Records sharing `fingerprint`, ordered by id.
    async fn records_by_fingerprint(&self, fingerprint: &str) -> Result<Vec<CatalogRecord>>;

    /// Insert `record` atomically and return its new id.
    async fn insert_record(&self, record: &CatalogRecord) -> Result<i64>;

    /// Replace the versions of the record keyed by `(fingerprint,
    /// program_name)`, provided they still equal `expected`.
    async fn update_versions(
        &self,
        fingerprint: &str,
        program_name: &str,
        expected: &[String],
        versions: &[String],
    ) -> Result<()>;

    async fn count(&self) -> Result<i64>;
}
