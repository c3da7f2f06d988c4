//! Weighted schema similarity, measured against a known schema.
//!
//! # Scoring Algorithm
//!
//! Points are awarded to two accumulators while walking the *candidate*
//! schema:
//!
//! 1. Candidate table present in the known schema: `+TABLE_WEIGHT` to the
//!    candidate. For each of its columns present in the known table:
//!    `+COLUMN_WEIGHT` to the candidate, then for each tracked attribute
//!    `+ATTRIBUTE_WEIGHT` to the candidate on equality and
//!    `+ATTRIBUTE_WEIGHT` to the known side regardless. Columns missing
//!    from the known table cost `+COLUMN_WEIGHT` on the known side.
//! 2. Candidate table absent from the known schema: `+TABLE_WEIGHT` plus
//!    `+COLUMN_WEIGHT` per column, all to the known side.
//! 3. Finally every known table and column is added to the known side.
//!
//! `percentage = 100 × candidate / known`. The known schema is the
//! catalog side by convention. Every penalty in steps 1 and 2 mirrors a
//! column or table that step 3 counts for the other schema, so the totals
//! come out the same when the arguments are swapped; callers must still
//! pass the catalog record as `known`.

use crate::models::{ColumnAttributes, SchemaDescription};

pub const TABLE_WEIGHT: u32 = 12;
pub const COLUMN_WEIGHT: u32 = 6;
pub const ATTRIBUTE_WEIGHT: u32 = 1;

/// Outcome of one candidate/known comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub candidate_points: u32,
    pub known_points: u32,
    /// `100 × candidate / known`, rounded to one decimal place.
    pub percentage: f64,
}

/// A percentage rendered with exactly one decimal place.
pub fn display_percentage(percentage: f64) -> String {
    format!("{:.1}", percentage)
}

/// Score how much of `known`'s structure is present in `candidate`.
pub fn score(candidate: &SchemaDescription, known: &SchemaDescription) -> Score {
    let mut candidate_points = 0u32;
    let mut known_points = 0u32;

    for (table, candidate_columns) in candidate.tables() {
        match known.table(table) {
            Some(known_columns) => {
                candidate_points += TABLE_WEIGHT;
                for (column, candidate_attrs) in candidate_columns {
                    match known_columns.get(column) {
                        Some(known_attrs) => {
                            candidate_points += COLUMN_WEIGHT;
                            let matched = matching_attributes(candidate_attrs, known_attrs);
                            candidate_points += matched * ATTRIBUTE_WEIGHT;
                            known_points += TRACKED_ATTRIBUTES * ATTRIBUTE_WEIGHT;
                        }
                        None => known_points += COLUMN_WEIGHT,
                    }
                }
            }
            None => {
                known_points += TABLE_WEIGHT;
                known_points += COLUMN_WEIGHT * candidate_columns.len() as u32;
            }
        }
    }

    for known_columns in known.tables().values() {
        known_points += TABLE_WEIGHT;
        known_points += COLUMN_WEIGHT * known_columns.len() as u32;
    }

    Score {
        candidate_points,
        known_points,
        percentage: percentage(candidate_points, known_points),
    }
}

const TRACKED_ATTRIBUTES: u32 = 3;

fn matching_attributes(candidate: &ColumnAttributes, known: &ColumnAttributes) -> u32 {
    (candidate.declared_type == known.declared_type) as u32
        + (candidate.default_value == known.default_value) as u32
        + (candidate.not_null == known.not_null) as u32
}

fn percentage(candidate_points: u32, known_points: u32) -> f64 {
    if known_points == 0 {
        return 0.0;
    }
    let raw = 100.0 * f64::from(candidate_points) / f64::from(known_points);
    // Decimal formatting rounds exact halves to even (56.25 -> 56.2); the
    // score must agree with the rendered value.
    display_percentage(raw).parse().unwrap_or(raw)
}
