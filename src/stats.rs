//! Catalog overview.
//!
//! Summarizes what the catalog knows: record counts, file size, and a
//! per-program breakdown grouped by family. Used by `squid stats`.

use anyhow::Result;
use std::collections::BTreeMap;

use squid_core::models::CatalogRecord;
use squid_core::store::CatalogStore;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteCatalogStore;

/// Per-program rollup of catalog records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramStats {
    pub family: String,
    pub program: String,
    pub records: usize,
    pub versions: usize,
}

/// Run the stats command: read the catalog and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::ensure_schema(&pool).await?;
    let store = SqliteCatalogStore::new(pool);

    let records = store.all_records().await?;
    let db_size = std::fs::metadata(&config.catalog.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("SQUID Catalog Stats");
    println!("===================");
    println!();
    println!("  Catalog:     {}", config.catalog.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Records:     {}", records.len());

    let programs = summarize(&records);
    if !programs.is_empty() {
        println!();
        println!("  By program:");
        println!(
            "  {:<20} {:<28} {:>8} {:>9}",
            "FAMILY", "PROGRAM", "RECORDS", "VERSIONS"
        );
        println!("  {}", "-".repeat(68));

        for p in &programs {
            println!(
                "  {:<20} {:<28} {:>8} {:>9}",
                p.family, p.program, p.records, p.versions
            );
        }
    }

    println!();

    store.pool().close().await;
    Ok(())
}

/// Group records by family and program. `versions` counts distinct
/// version strings across the program's records.
pub fn summarize(records: &[CatalogRecord]) -> Vec<ProgramStats> {
    let mut groups: BTreeMap<(String, String), (usize, Vec<&str>)> = BTreeMap::new();
    for record in records {
        let family = record
            .program_family
            .clone()
            .unwrap_or_else(|| "-".to_string());
        let entry = groups
            .entry((family, record.program_name.clone()))
            .or_default();
        entry.0 += 1;
        entry
            .1
            .extend(record.program_versions.iter().map(String::as_str));
    }

    groups
        .into_iter()
        .map(|((family, program), (records, mut versions))| {
            versions.sort_unstable();
            versions.dedup();
            ProgramStats {
                family,
                program,
                records,
                versions: versions.len(),
            }
        })
        .collect()
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
