//! Repository crawler: walks a checkout and yields the source files worth
//! indexing.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use rootcause_core::language::should_index_file;

use crate::config::IndexConfig;

/// A file selected for indexing, with its path relative to the
/// repository root (always `/`-separated).
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

pub fn scan_repository(root: &Path, index: &IndexConfig) -> Result<Vec<SourceFile>> {
    if !root.is_dir() {
        bail!("Repository root does not exist: {}", root.display());
    }

    let exclude_set = build_globset(&index.exclude_globs)?;
    let mut files = Vec::new();

    let walker = WalkDir::new(root).follow_links(index.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !should_index_file(&rel_str) {
            continue;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => files.push(SourceFile {
                path: rel_str,
                content,
            }),
            Err(e) => debug!(path = %rel_str, error = %e, "skipping unreadable file"),
        }
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
