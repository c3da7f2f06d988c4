//! # SQUID
//!
//! SQLite Unknown Identifier: figures out which program produced a SQLite
//! database by scoring its schema against a catalog of learned schemas.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌────────────┐   ┌──────────┐
//! │ discover │──▶│  extract  │──▶│  matcher   │──▶│ compare  │──▶ JSON report
//! │ walk+glob│   │ PRAGMA    │   │ score/top3 │   └──────────┘
//! └──────────┘   └─────┬─────┘   └────────────┘
//!                      │         ┌────────────┐   ┌──────────┐
//!                      └────────▶│  learner   │──▶│ catalog  │
//!                                │ merge/new  │   │ (SQLite) │
//!                                └────────────┘   └──────────┘
//! ```
//!
//! Scoring, fingerprinting and the learner live in `squid-core`; this crate
//! supplies the SQLite I/O, configuration and CLI commands.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Catalog connection |
//! | [`migrate`] | Catalog schema creation |
//! | [`extract`] | Schema extraction from candidate files |
//! | [`sqlite_store`] | SQLite `CatalogStore` |
//! | [`discover`] | Candidate file discovery |
//! | [`compare`] | `squid compare` |
//! | [`learn`] | `squid learn` |
//! | [`prompt`] | Interactive merge decisions |
//! | [`stats`] | `squid stats` |

pub mod compare;
pub mod config;
pub mod db;
pub mod discover;
pub mod extract;
pub mod learn;
pub mod migrate;
pub mod prompt;
pub mod sqlite_store;
pub mod stats;
