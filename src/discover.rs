//! Candidate file discovery.
//!
//! Resolves a user-supplied path into the list of files to examine. A file
//! path yields just that file. A directory is walked (recursively for
//! `compare`, one level for `learn`), filtered through the configured
//! include/exclude globs, and returned in sorted order.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::config::ExtractConfig;

/// How far below a directory argument to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Recursive,
    TopLevel,
}

pub fn discover(root: &Path, depth: Depth, config: &ExtractConfig) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        bail!("Path does not exist: {}", root.display());
    }
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let include_set = if config.include_globs.is_empty() {
        None
    } else {
        Some(build_globset(&config.include_globs)?)
    };
    let exclude_set = build_globset(&config.exclude_globs)?;

    let mut walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(config.follow_symlinks);
    if depth == Depth::TopLevel {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);

        if exclude_set.is_match(relative) {
            continue;
        }
        if let Some(include) = &include_set {
            if !include.is_match(relative) {
                continue;
            }
        }

        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
