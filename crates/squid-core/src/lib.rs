//! # SQUID Core
//!
//! Shared logic for SQUID (SQLite Unknown Identifier): the schema model,
//! schema fingerprinting, the weighted similarity scorer, top-k catalog
//! matching, and the learner that merges newly observed schemas into the
//! catalog.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Storage is
//! reached through the [`store::CatalogStore`] trait and operator
//! interaction through the [`learner::MergeDecider`] trait.

pub mod error;
pub mod fingerprint;
pub mod learner;
pub mod matcher;
pub mod models;
pub mod score;
pub mod store;
pub mod versions;

pub use error::SquidError;
