//! `squid learn`: add databases of a known program version to the catalog.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use squid_core::learner::{LearnOutcome, Learner, MergeDecider};
use squid_core::models::ProgramIdentity;

use crate::config::Config;
use crate::db;
use crate::discover::{discover, Depth};
use crate::extract::extract_schema;
use crate::migrate;
use crate::prompt;
use crate::sqlite_store::SqliteCatalogStore;

/// Counts of what a learn run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LearnSummary {
    pub inserted: usize,
    pub merged: usize,
    pub already_known: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl LearnSummary {
    fn count(&mut self, outcome: &LearnOutcome) {
        match outcome {
            LearnOutcome::Inserted { .. } => self.inserted += 1,
            LearnOutcome::Merged { .. } => self.merged += 1,
            LearnOutcome::AlreadyKnown { .. } => self.already_known += 1,
            LearnOutcome::Skipped(_) => self.skipped += 1,
        }
    }
}

/// Run the learn command over a file or the top level of a directory.
///
/// `name` replaces the file name recorded as `db_name` when `path` is a
/// single file; `on_match` overrides `learn.on_match` from the config.
pub async fn run_learn(
    config: &Config,
    path: &Path,
    identity: &ProgramIdentity,
    name: Option<&str>,
    on_match: Option<&str>,
) -> Result<LearnSummary> {
    let files = discover(path, Depth::TopLevel, &config.extract)?;
    let name = if path.is_file() {
        name
    } else {
        if name.is_some() {
            warn!("--name applies to single files only; using file names");
        }
        None
    };
    let decider = prompt::decider_for(on_match.unwrap_or(&config.learn.on_match))?;

    let pool = db::connect(config).await?;
    migrate::ensure_schema(&pool).await?;
    let store = SqliteCatalogStore::new(pool);

    let timeout = Duration::from_secs(config.extract.timeout_secs);
    let summary = learn_paths(&store, &files, identity, name, decider.as_ref(), timeout).await;

    println!(
        "Learned {} file(s): {} new, {} merged, {} already known, {} skipped, {} failed.",
        files.len(),
        summary.inserted,
        summary.merged,
        summary.already_known,
        summary.skipped,
        summary.failed
    );

    store.pool().close().await;
    Ok(summary)
}

/// Learn each file in turn. A failure on one file is logged and counted;
/// the rest of the batch still runs.
pub async fn learn_paths(
    store: &SqliteCatalogStore,
    files: &[PathBuf],
    identity: &ProgramIdentity,
    name: Option<&str>,
    decider: &dyn MergeDecider,
    timeout: Duration,
) -> LearnSummary {
    let learner = Learner::new(store);
    let mut summary = LearnSummary::default();

    for path in files {
        let db_name = name.map(str::to_string).unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string())
        });
        let schema = extract_schema(path, timeout).await;

        let result = {
            let _writes = store.lock_writes().await;
            learner.learn(&db_name, schema, identity, decider).await
        };

        match result {
            Ok(outcome) => {
                info!(path = %path.display(), "{}", outcome);
                println!("{}: {}", path.display(), outcome);
                summary.count(&outcome);
            }
            Err(e) => {
                warn!(path = %path.display(), "learn failed: {:#}", e);
                summary.failed += 1;
            }
        }
    }

    summary
}
