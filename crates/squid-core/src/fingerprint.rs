//! Deterministic content hash of a [`SchemaDescription`].
//!
//! The hash covers table names, column names and the three scored
//! attributes, visited in sorted order. Every string is length-prefixed so
//! that no two distinct schemas share a byte stream.

use sha2::{Digest, Sha256};

use crate::models::{ColumnAttributes, SchemaDescription};

/// SHA-256 of the canonical form of `schema`, as lowercase hex.
pub fn fingerprint(schema: &SchemaDescription) -> String {
    let mut hasher = Sha256::new();
    hasher.update((schema.table_count() as u64).to_le_bytes());

    // BTreeMap iteration is ordered by key, which is the canonical order.
    for (table, columns) in schema.tables() {
        update_str(&mut hasher, table);
        hasher.update((columns.len() as u64).to_le_bytes());
        for (column, attributes) in columns {
            update_str(&mut hasher, column);
            update_attributes(&mut hasher, attributes);
        }
    }

    format!("{:x}", hasher.finalize())
}

fn update_attributes(hasher: &mut Sha256, attributes: &ColumnAttributes) {
    update_str(hasher, &attributes.declared_type);
    hasher.update([attributes.not_null as u8]);
    match &attributes.default_value {
        Some(value) => {
            hasher.update([1u8]);
            update_str(hasher, value);
        }
        None => hasher.update([0u8]),
    }
}

fn update_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}
