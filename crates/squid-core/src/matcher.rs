//! Top-k selection of catalog records for one candidate schema.
//!
//! Scoring is spread across the rayon pool; the scores are then folded
//! into a bounded [`TopMatches`] in catalog order, so ties always resolve
//! to the record that appears first in the catalog.

use std::cmp::Ordering;
use std::path::PathBuf;

use rayon::prelude::*;

use crate::error::SquidError;
use crate::models::{CatalogRecord, MatchResult, SchemaDescription};
use crate::score::{score, Score};

/// Number of ranked matches kept per candidate.
pub const TOP_K: usize = 3;

/// Bounded, descending selection of the best [`MatchResult`]s.
#[derive(Debug, Default)]
pub struct TopMatches {
    entries: Vec<MatchResult>,
}

impl TopMatches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer one scored record. Returns true if it was kept.
    ///
    /// Once full, a record only displaces the current last place when its
    /// score is strictly greater.
    pub fn offer(&mut self, score: Score, record: &CatalogRecord) -> bool {
        if self.entries.len() >= TOP_K {
            let beats_last = self
                .entries
                .last()
                .is_some_and(|last| score.percentage > last.score);
            if !beats_last {
                return false;
            }
            self.entries.pop();
        }

        self.entries.push(MatchResult {
            score: score.percentage,
            candidate_points: score.candidate_points,
            known_points: score.known_points,
            record: record.clone(),
        });
        // Stable: equal scores keep insertion order.
        self.entries
            .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        true
    }

    pub fn into_vec(self) -> Vec<MatchResult> {
        self.entries
    }
}

/// Score `candidate` against every record and keep the best [`TOP_K`].
///
/// Fails with [`SquidError::EmptyCatalog`] when there is nothing to rank
/// against, and with [`SquidError::UnreadableSource`] for an empty
/// candidate.
pub fn find_top_matches(
    candidate: &SchemaDescription,
    catalog: &[CatalogRecord],
) -> Result<Vec<MatchResult>, SquidError> {
    if catalog.is_empty() {
        return Err(SquidError::EmptyCatalog);
    }
    if candidate.is_empty() {
        return Err(SquidError::UnreadableSource {
            path: PathBuf::new(),
            reason: "candidate schema has no tables".to_string(),
        });
    }

    let scores: Vec<Score> = catalog
        .par_iter()
        .map(|record| score(candidate, &record.schema))
        .collect();

    let mut top = TopMatches::new();
    for (score, record) in scores.into_iter().zip(catalog) {
        top.offer(score, record);
    }
    Ok(top.into_vec())
}
