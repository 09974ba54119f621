//! Filesystem document source.
//!
//! Walks `source.root`, applies the include and exclude globs to paths
//! relative to the root, and reads each match into a [`RawDocument`].
//! `.git`, `target` and `node_modules` are always excluded. Files that are
//! not valid UTF-8 are skipped with a warning.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use lore_core::models::RawDocument;

use crate::config::SourceConfig;

pub fn scan_source(config: &SourceConfig) -> Result<Vec<RawDocument>> {
    let root = &config.root;
    if !root.exists() {
        bail!("Source root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut docs = Vec::new();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        // Forward slashes so stored paths are stable across platforms.
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        match read_document(path, &rel_str) {
            Ok(Some(doc)) => docs.push(doc),
            Ok(None) => warn!(path = %rel_str, "skipping file that is not valid UTF-8"),
            Err(e) => return Err(e),
        }
    }

    docs.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(root = %root.display(), count = docs.len(), "source scanned");
    Ok(docs)
}

fn read_document(path: &Path, relative_path: &str) -> Result<Option<RawDocument>> {
    let metadata =
        std::fs::metadata(path).with_context(|| format!("Failed to stat {}", path.display()))?;
    let modified_at: DateTime<Utc> = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_default();

    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let Ok(content) = String::from_utf8(bytes) else {
        return Ok(None);
    };

    Ok(Some(RawDocument {
        path: relative_path.to_string(),
        content,
        modified_at,
    }))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
