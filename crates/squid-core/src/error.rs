//! Error taxonomy for SQUID.
//!
//! Storage and application plumbing use `anyhow`; these variants are the
//! conditions a caller may want to act on, recovered with
//! `anyhow::Error::downcast_ref::<SquidError>()`.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SquidError {
    /// The candidate file is not an openable SQLite database, is locked, or
    /// yielded no tables.
    #[error("unreadable source {}: {reason}", path.display())]
    UnreadableSource { path: PathBuf, reason: String },

    /// There are no catalog records to compare against.
    #[error("the catalog is empty; learn at least one database before comparing")]
    EmptyCatalog,

    /// The `(fingerprint, program_name)` key is ambiguous or changed under us.
    #[error("catalog write conflict for {program_name} ({fingerprint}): {detail}")]
    CatalogWriteConflict {
        fingerprint: String,
        program_name: String,
        detail: String,
    },

    /// Several records share a fingerprint and no single target was chosen.
    #[error("{} catalog records share fingerprint {fingerprint}; no merge target selected ({})", candidates.len(), candidates.join(", "))]
    AmbiguousMerge {
        fingerprint: String,
        candidates: Vec<String>,
    },

    /// A stored catalog row could not be decoded into a record.
    #[error("malformed catalog record {id}: field `{field}` {reason}")]
    MalformedRecord {
        id: i64,
        field: &'static str,
        reason: String,
    },
}

impl SquidError {
    pub fn conflict(
        fingerprint: impl Into<String>,
        program_name: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        SquidError::CatalogWriteConflict {
            fingerprint: fingerprint.into(),
            program_name: program_name.into(),
            detail: detail.into(),
        }
    }
}
