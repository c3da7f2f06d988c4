//! Core data models used throughout SQUID.
//!
//! A [`SchemaDescription`] is the normalized structure of one SQLite file:
//! table name → column name → [`ColumnAttributes`]. Catalog entries
//! ([`CatalogRecord`]) pair a learned schema with the identity of the
//! program that produced it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fingerprint::fingerprint;

/// The three column attributes that take part in scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnAttributes {
    /// Declared type exactly as written in the `CREATE TABLE` (may be empty).
    #[serde(rename = "type")]
    pub declared_type: String,
    pub not_null: bool,
    /// Default value expression as SQLite reports it, if any.
    pub default_value: Option<String>,
}

impl ColumnAttributes {
    pub fn new(declared_type: &str, not_null: bool, default_value: Option<&str>) -> Self {
        Self {
            declared_type: declared_type.to_string(),
            not_null,
            default_value: default_value.map(str::to_string),
        }
    }
}

/// Columns of one table, keyed by column name.
pub type ColumnSet = BTreeMap<String, ColumnAttributes>;

/// Normalized structure of one database file.
///
/// Names are case-sensitive and kept exactly as reported by the source.
/// An empty description means the source could not be read; it is never
/// written to the catalog nor compared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaDescription {
    tables: BTreeMap<String, ColumnSet>,
}

impl SchemaDescription {
    pub fn from_tables(tables: BTreeMap<String, ColumnSet>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &BTreeMap<String, ColumnSet> {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&ColumnSet> {
        self.tables.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Serialize to the JSON form kept in the catalog.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl FromIterator<(String, ColumnSet)> for SchemaDescription {
    fn from_iter<I: IntoIterator<Item = (String, ColumnSet)>>(iter: I) -> Self {
        Self {
            tables: iter.into_iter().collect(),
        }
    }
}

/// Who produced a learned database, as supplied by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramIdentity {
    /// Broad category, e.g. "Web Browser" or "Chat".
    pub program_family: Option<String>,
    pub program_name: String,
    pub program_version: String,
}

/// One entry in the catalog of known schemas.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRecord {
    /// Store row id; `None` until persisted.
    pub id: Option<i64>,
    pub db_name: String,
    pub program_family: Option<String>,
    pub program_name: String,
    /// Every known version sharing this schema, kept sorted.
    pub program_versions: Vec<String>,
    pub schema: SchemaDescription,
    pub fingerprint: String,
}

impl CatalogRecord {
    /// A fresh, unpersisted record for the first observation of `schema`.
    pub fn new(db_name: &str, identity: &ProgramIdentity, schema: SchemaDescription) -> Self {
        let fingerprint = fingerprint(&schema);
        Self {
            id: None,
            db_name: db_name.to_string(),
            program_family: identity.program_family.clone(),
            program_name: identity.program_name.clone(),
            program_versions: vec![identity.program_version.clone()],
            schema,
            fingerprint,
        }
    }

    pub fn has_version(&self, version: &str) -> bool {
        self.program_versions.iter().any(|v| v == version)
    }

    /// Compact version label: `"first - last"` for ranges, the single
    /// version otherwise.
    pub fn version_label(&self) -> String {
        match self.program_versions.as_slice() {
            [] => String::new(),
            [only] => only.clone(),
            [first, .., last] => format!("{} - {}", first, last),
        }
    }
}

/// Result of comparing one candidate against one catalog record.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Percentage in `[0, 100]`, rounded to one decimal place.
    pub score: f64,
    pub candidate_points: u32,
    pub known_points: u32,
    pub record: CatalogRecord,
}
