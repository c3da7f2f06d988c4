//! `squid compare`: rank unknown databases against the catalog.
//!
//! Every candidate under the given path is extracted, scored against the
//! full catalog, and its top three matches are collected into a
//! [`ComparisonReport`]. High-confidence matches are echoed to stdout and
//! the report is written as pretty JSON.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use squid_core::matcher::find_top_matches;
use squid_core::models::{CatalogRecord, MatchResult};
use squid_core::score::display_percentage;
use squid_core::store::CatalogStore;
use squid_core::SquidError;

use crate::config::Config;
use crate::db;
use crate::discover::{discover, Depth};
use crate::extract::extract_schema;
use crate::migrate;
use crate::sqlite_store::SqliteCatalogStore;

/// Top matches for one candidate file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub file_name: String,
    pub file_path: PathBuf,
    pub top_three: Vec<MatchResult>,
}

/// Results accumulated over one compare run.
#[derive(Debug, Clone, Default)]
pub struct ComparisonReport {
    pub files: Vec<FileReport>,
    /// Candidates that were not readable databases.
    pub skipped: Vec<PathBuf>,
}

impl ComparisonReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, file: FileReport) {
        self.files.push(file);
    }

    pub fn skip(&mut self, path: &Path) {
        self.skipped.push(path.to_path_buf());
    }

    /// Each file's best match, when it scores strictly above `threshold`.
    pub fn high_confidence(&self, threshold: f64) -> impl Iterator<Item = (&FileReport, &MatchResult)> {
        self.files.iter().filter_map(move |file| {
            file.top_three
                .first()
                .filter(|m| m.score > threshold)
                .map(|m| (file, m))
        })
    }

    pub fn to_json(&self) -> Result<String> {
        let entries: Vec<ReportEntry<'_>> = self.files.iter().map(ReportEntry::from).collect();
        Ok(serde_json::to_string_pretty(&entries)?)
    }
}

#[derive(Serialize)]
struct ReportEntry<'a> {
    file_name: &'a str,
    file_path: String,
    top_three: Vec<ReportMatch<'a>>,
}

#[derive(Serialize)]
struct ReportMatch<'a> {
    score: f64,
    candidate_points: u32,
    known_points: u32,
    program_family: Option<&'a str>,
    program_name: &'a str,
    program_versions: &'a [String],
    version_label: String,
    db_name: &'a str,
    fingerprint: &'a str,
}

impl<'a> From<&'a FileReport> for ReportEntry<'a> {
    fn from(file: &'a FileReport) -> Self {
        Self {
            file_name: &file.file_name,
            file_path: file.file_path.display().to_string(),
            top_three: file.top_three.iter().map(ReportMatch::from).collect(),
        }
    }
}

impl<'a> From<&'a MatchResult> for ReportMatch<'a> {
    fn from(m: &'a MatchResult) -> Self {
        let record = &m.record;
        Self {
            score: m.score,
            candidate_points: m.candidate_points,
            known_points: m.known_points,
            program_family: record.program_family.as_deref(),
            program_name: &record.program_name,
            program_versions: &record.program_versions,
            version_label: record.version_label(),
            db_name: &record.db_name,
            fingerprint: &record.fingerprint,
        }
    }
}

/// Run the compare command.
///
/// A single file only produces a report file when `output` is given; a
/// directory always does.
pub async fn run_compare(
    config: &Config,
    path: &Path,
    name: Option<&str>,
    output: Option<&str>,
) -> Result<()> {
    let files = discover(path, Depth::Recursive, &config.extract)?;

    let pool = db::connect(config).await?;
    migrate::ensure_schema(&pool).await?;
    let store = SqliteCatalogStore::new(pool);
    let catalog = store
        .all_records()
        .await
        .context("Failed to read the catalog")?;
    store.pool().close().await;
    if catalog.is_empty() {
        return Err(SquidError::EmptyCatalog.into());
    }
    info!(records = catalog.len(), candidates = files.len(), "comparing");

    let display_name = if path.is_file() { name } else { None };
    let timeout = Duration::from_secs(config.extract.timeout_secs);
    let report = compare_paths(&files, &catalog, display_name, timeout).await;

    for (file, m) in report.high_confidence(config.compare.high_confidence) {
        println!("{}", format_match_line(&file.file_name, m));
    }

    println!(
        "Compared {} file(s), {} skipped as unreadable.",
        report.files.len(),
        report.skipped.len()
    );

    if path.is_dir() || output.is_some() {
        let target = report_path(config.compare.output_dir.as_deref(), output);
        std::fs::write(&target, report.to_json()?)
            .with_context(|| format!("Failed to write report: {}", target.display()))?;
        println!("Report written to {}", target.display());
    }

    Ok(())
}

/// Score each candidate in `files` against `catalog`. Files that do not
/// yield a schema are recorded as skipped and do not stop the batch.
pub async fn compare_paths(
    files: &[PathBuf],
    catalog: &[CatalogRecord],
    name: Option<&str>,
    timeout: Duration,
) -> ComparisonReport {
    let mut report = ComparisonReport::new();

    for path in files {
        let schema = extract_schema(path, timeout).await;
        if schema.is_empty() {
            debug!(path = %path.display(), "not a readable database; skipping");
            report.skip(path);
            continue;
        }

        match find_top_matches(&schema, catalog) {
            Ok(top_three) => {
                let file_name = name.map(str::to_string).unwrap_or_else(|| file_name_of(path));
                report.record(FileReport {
                    file_name,
                    file_path: path.clone(),
                    top_three,
                });
            }
            Err(e) => {
                warn!(path = %path.display(), "matching failed: {}", e);
                report.skip(path);
            }
        }
    }

    report
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn format_match_line(file_name: &str, m: &MatchResult) -> String {
    format!(
        "{:>25}  {:>5}%  {:<25} {:<18}",
        truncate(file_name, 25),
        display_percentage(m.score),
        truncate(&m.record.program_name, 25),
        truncate(&m.record.version_label(), 18),
    )
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

/// `<dir>/<output>.json`, with a timestamped default name.
fn report_path(output_dir: Option<&Path>, output: Option<&str>) -> PathBuf {
    let stem = match output {
        Some(name) => name.strip_suffix(".json").unwrap_or(name).to_string(),
        None => default_report_name(),
    };
    let file = format!("{}.json", stem);
    match output_dir {
        Some(dir) => dir.join(file),
        None => PathBuf::from(file),
    }
}

fn default_report_name() -> String {
    format!(
        "SQUID Matches ({})",
        chrono::Local::now().format("%Y-%m-%dT%H-%M-%S")
    )
}
