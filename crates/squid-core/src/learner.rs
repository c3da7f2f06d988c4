//! Catalog write path: add a newly observed schema to the catalog.
//!
//! # State Machine
//!
//! Keyed by the schema fingerprint, the lookup lands in one of three states:
//!
//! | Existing records | Action |
//! |------------------|--------|
//! | none | insert a new record with `[version]` |
//! | one | already known, or ask the [`MergeDecider`]: merge, create new, skip |
//! | several | already known everywhere, or ask which single record to merge into |
//!
//! Only the record the decider selects is ever mutated. Integrity problems
//! (duplicate keys, races) are returned as [`SquidError`] values and abort
//! this one learn operation.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use tracing::{debug, info};

use crate::error::SquidError;
use crate::fingerprint::fingerprint;
use crate::models::{CatalogRecord, ProgramIdentity, SchemaDescription};
use crate::store::CatalogStore;
use crate::versions::with_version;

/// Answer when exactly one catalog record shares the fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleDecision {
    /// Add the version to the existing record.
    Merge,
    /// Catalog the schema again as a separate record.
    CreateNew,
    Skip,
}

/// Answer when several catalog records share the fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiDecision {
    /// Merge into the record at this index of the offered list.
    MergeInto(usize),
    Skip,
    /// No single target could be chosen.
    Ambiguous,
}

/// Strategy consulted by the [`Learner`] whenever a schema is already in
/// the catalog. Implementations may prompt an operator or apply a policy.
pub trait MergeDecider: Send + Sync {
    fn decide_single(&self, existing: &CatalogRecord, identity: &ProgramIdentity)
        -> SingleDecision;

    fn decide_multi(&self, existing: &[CatalogRecord], identity: &ProgramIdentity)
        -> MultiDecision;
}

/// Non-interactive decision policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedPolicy {
    Merge,
    CreateNew,
    Skip,
}

impl MergeDecider for FixedPolicy {
    /// `Merge` only adds to a record of the same program; a schema shared
    /// with another program is catalogued under its own identity instead.
    fn decide_single(&self, existing: &CatalogRecord, identity: &ProgramIdentity) -> SingleDecision {
        match self {
            FixedPolicy::Merge if existing.program_name == identity.program_name => {
                SingleDecision::Merge
            }
            FixedPolicy::Merge => SingleDecision::CreateNew,
            FixedPolicy::CreateNew => SingleDecision::CreateNew,
            FixedPolicy::Skip => SingleDecision::Skip,
        }
    }

    /// `Merge` targets the one record with the same program name; with zero
    /// or several such records there is no unambiguous target. `CreateNew`
    /// is not offered for shared fingerprints and behaves like `Skip`.
    fn decide_multi(&self, existing: &[CatalogRecord], identity: &ProgramIdentity) -> MultiDecision {
        match self {
            FixedPolicy::Merge => {
                let mut same_program = existing
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| r.program_name == identity.program_name);
                match (same_program.next(), same_program.next()) {
                    (Some((index, _)), None) => MultiDecision::MergeInto(index),
                    _ => MultiDecision::Ambiguous,
                }
            }
            FixedPolicy::CreateNew | FixedPolicy::Skip => MultiDecision::Skip,
        }
    }
}

impl FromStr for FixedPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "merge" => Ok(FixedPolicy::Merge),
            "new" => Ok(FixedPolicy::CreateNew),
            "skip" => Ok(FixedPolicy::Skip),
            other => anyhow::bail!("Unknown merge policy: '{}'. Use merge, new, or skip.", other),
        }
    }
}

/// Why nothing was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The source yielded no tables.
    EmptySchema,
    /// The decider chose not to change the catalog.
    Declined,
}

/// What a learn operation did to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LearnOutcome {
    Inserted { id: i64, fingerprint: String },
    Merged {
        fingerprint: String,
        program_name: String,
        versions: Vec<String>,
    },
    /// The version was already recorded for this schema.
    AlreadyKnown { program_name: String },
    Skipped(SkipReason),
}

impl fmt::Display for LearnOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LearnOutcome::Inserted { id, .. } => write!(f, "learned as catalog entry {}", id),
            LearnOutcome::Merged {
                program_name,
                versions,
                ..
            } => write!(f, "added to {} (versions {})", program_name, versions.join(", ")),
            LearnOutcome::AlreadyKnown { program_name } => {
                write!(f, "already catalogued for {}", program_name)
            }
            LearnOutcome::Skipped(SkipReason::EmptySchema) => write!(f, "skipped (no tables)"),
            LearnOutcome::Skipped(SkipReason::Declined) => write!(f, "skipped"),
        }
    }
}

/// Runs the catalog write path against a [`CatalogStore`].
pub struct Learner<'a> {
    store: &'a dyn CatalogStore,
}

impl<'a> Learner<'a> {
    pub fn new(store: &'a dyn CatalogStore) -> Self {
        Self { store }
    }

    /// Learn `schema` (read from a file called `db_name`) as a database of
    /// `identity`.
    pub async fn learn(
        &self,
        db_name: &str,
        schema: SchemaDescription,
        identity: &ProgramIdentity,
        decider: &dyn MergeDecider,
    ) -> Result<LearnOutcome> {
        if schema.is_empty() {
            return Ok(LearnOutcome::Skipped(SkipReason::EmptySchema));
        }

        let fingerprint = fingerprint(&schema);
        let matches = self.store.records_by_fingerprint(&fingerprint).await?;
        check_unique_keys(&fingerprint, &matches)?;
        debug!(
            fingerprint = %fingerprint,
            existing = matches.len(),
            "looked up schema fingerprint"
        );

        match matches.as_slice() {
            [] => self.insert(db_name, schema, identity).await,
            [existing] => {
                if existing.has_version(&identity.program_version) {
                    return Ok(already_known(existing));
                }
                match decider.decide_single(existing, identity) {
                    SingleDecision::Merge => self.merge(existing, identity).await,
                    SingleDecision::CreateNew => {
                        if existing.program_name == identity.program_name {
                            return Err(SquidError::conflict(
                                &fingerprint,
                                &identity.program_name,
                                "a record for this program already holds this schema; merge instead",
                            )
                            .into());
                        }
                        self.insert(db_name, schema, identity).await
                    }
                    SingleDecision::Skip => Ok(LearnOutcome::Skipped(SkipReason::Declined)),
                }
            }
            several => {
                if several.iter().all(|r| r.has_version(&identity.program_version)) {
                    return Ok(already_known(&several[0]));
                }
                match decider.decide_multi(several, identity) {
                    MultiDecision::MergeInto(index) => match several.get(index) {
                        Some(target) if target.has_version(&identity.program_version) => {
                            Ok(already_known(target))
                        }
                        Some(target) => self.merge(target, identity).await,
                        None => Err(ambiguous(&fingerprint, several).into()),
                    },
                    MultiDecision::Skip => Ok(LearnOutcome::Skipped(SkipReason::Declined)),
                    MultiDecision::Ambiguous => Err(ambiguous(&fingerprint, several).into()),
                }
            }
        }
    }

    async fn insert(
        &self,
        db_name: &str,
        schema: SchemaDescription,
        identity: &ProgramIdentity,
    ) -> Result<LearnOutcome> {
        let record = CatalogRecord::new(db_name, identity, schema);
        let id = self.store.insert_record(&record).await?;
        info!(
            id,
            db_name,
            program = %identity.program_name,
            version = %identity.program_version,
            "inserted catalog record"
        );
        Ok(LearnOutcome::Inserted {
            id,
            fingerprint: record.fingerprint,
        })
    }

    async fn merge(
        &self,
        target: &CatalogRecord,
        identity: &ProgramIdentity,
    ) -> Result<LearnOutcome> {
        let versions = match with_version(&target.program_versions, &identity.program_version) {
            Some(versions) => versions,
            None => return Ok(already_known(target)),
        };
        self.store
            .update_versions(
                &target.fingerprint,
                &target.program_name,
                &target.program_versions,
                &versions,
            )
            .await?;
        info!(
            program = %target.program_name,
            version = %identity.program_version,
            "merged version into catalog record"
        );
        Ok(LearnOutcome::Merged {
            fingerprint: target.fingerprint.clone(),
            program_name: target.program_name.clone(),
            versions,
        })
    }
}

fn already_known(record: &CatalogRecord) -> LearnOutcome {
    LearnOutcome::AlreadyKnown {
        program_name: record.program_name.clone(),
    }
}

fn ambiguous(fingerprint: &str, records: &[CatalogRecord]) -> SquidError {
    SquidError::AmbiguousMerge {
        fingerprint: fingerprint.to_string(),
        candidates: records.iter().map(|r| r.program_name.clone()).collect(),
    }
}

/// Two records under one `(fingerprint, program_name)` key is corruption;
/// report it instead of choosing one.
fn check_unique_keys(fingerprint: &str, records: &[CatalogRecord]) -> Result<(), SquidError> {
    for (i, record) in records.iter().enumerate() {
        if records[i + 1..]
            .iter()
            .any(|other| other.program_name == record.program_name)
        {
            return Err(SquidError::conflict(
                fingerprint,
                &record.program_name,
                "duplicate records share this key",
            ));
        }
    }
    Ok(())
}
