//! `lore index`: scan the source directory and bring the store in line
//! with it.
//!
//! Scanning, change detection, segmentation and embedding are delegated to
//! [`source_fs`](crate::source_fs) and
//! [`IncrementalIndexer`](lore_core::index::IncrementalIndexer). This module
//! wires them to the SQLite store and prints the report.

use anyhow::Result;
use std::collections::HashSet;

use lore_core::index::{checksum, Action, IncrementalIndexer, IndexReport};
use lore_core::segment::segment;
use lore_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::source_fs;
use crate::sqlite_store::SqliteStore;

pub async fn run_index(config: &Config, dry_run: bool) -> Result<()> {
    let docs = source_fs::scan_source(&config.source)?;
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let embedder = embedding::create_provider(&config.embedding)?;
    let indexer = IncrementalIndexer::new(&store, embedder.as_ref(), config.index_options());

    println!("index {}", config.source.root.display());
    println!("  scanned: {} documents", docs.len());

    if dry_run {
        let mut inserts = 0usize;
        let mut replaces = 0usize;
        let mut unchanged = 0usize;
        let mut sections = 0usize;
        for doc in &docs {
            match indexer.decide(&doc.path, &checksum(&doc.content)).await? {
                Action::Skip => unchanged += 1,
                action => {
                    if action == Action::Replace {
                        replaces += 1;
                    } else {
                        inserts += 1;
                    }
                    sections += segment(&doc.content).len();
                }
            }
        }
        let present: HashSet<&str> = docs.iter().map(|d| d.path.as_str()).collect();
        let stale = store_paths_missing(&store, &present).await?;

        println!("  (dry-run)");
        println!("  would insert: {}", inserts);
        println!("  would replace: {}", replaces);
        println!("  unchanged: {}", unchanged);
        println!("  would remove: {}", stale);
        println!("  estimated sections: {}", sections);
        pool.close().await;
        return Ok(());
    }

    let report = indexer.sync(docs).await?;
    print_report(&report);

    pool.close().await;
    Ok(())
}

async fn store_paths_missing(store: &SqliteStore, present: &HashSet<&str>) -> Result<usize> {
    Ok(store
        .document_paths()
        .await?
        .iter()
        .filter(|p| !present.contains(p.as_str()))
        .count())
}

fn print_report(report: &IndexReport) {
    println!("  unchanged: {}", report.unchanged_count);
    println!("  changed: {}", report.changed_count);
    for path in &report.modified {
        println!("    {}", path);
    }
    println!("  removed: {}", report.removed.len());
    for path in &report.removed {
        println!("    {}", path);
    }
    println!("  failed: {}", report.failed.len());
    for failure in &report.failed {
        println!("    {}: {}", failure.path, failure.reason);
    }
    println!("ok");
}
